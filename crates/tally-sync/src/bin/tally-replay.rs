//! # tally-replay
//!
//! Replays a dataset directory through a session and prints the result.
//!
//! ```text
//! tally-replay [ROUND_NUMBER] [CONFIG_PATH]
//!
//!   ROUND_NUMBER   defaults to the highest number in rounds.json
//!   CONFIG_PATH    defaults to the platform config dir (tally.toml)
//! ```
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show token issue/discard messages
//! - Default: `tally=info`

use std::path::PathBuf;

use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tally_core::Warehouse;
use tally_sync::{InventorySession, TallyConfig};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tally=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let requested_number = args.next();
    let config_path = args.next().map(PathBuf::from);

    let config = TallyConfig::load(config_path)?;
    info!(dataset_dir = ?config.service.dataset_dir, "Starting replay");
    let session = InventorySession::from_config(config);

    if let Err(e) = session.refresh_catalog().await {
        warn!(error = %e, "Continuing without a catalog");
    }
    if let Err(e) = session.list_available_rounds().await {
        warn!(error = %e, "Continuing without the round list");
    }

    let number = match requested_number {
        Some(n) => n,
        None => session
            .available_rounds()
            .await
            .iter()
            .filter_map(|r| r.number.parse::<u64>().ok())
            .max()
            .map(|n| n.to_string())
            .ok_or("no round number given and rounds.json lists none")?,
    };

    for warehouse in Warehouse::ALL {
        if let Err(e) = session.hydrate_round(warehouse, &number).await {
            warn!(%warehouse, error = %e, "No remote counts; warehouse left out");
        }
    }

    let refresh = session.refresh_all_snapshots(&number).await?;

    let mut reconciliations = Vec::new();
    for warehouse in Warehouse::ALL {
        if session.round(warehouse, &number).await.is_some() {
            let result = session.reconcile(warehouse, &number).await?;
            reconciliations.push(json!({
                "warehouse": warehouse,
                "summary": result.summary(),
                "rows": result.rows,
            }));
        }
    }

    let output = json!({
        "roundNumber": number,
        "reconciliations": reconciliations,
        "consolidated": refresh.report.lines(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
