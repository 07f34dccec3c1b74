//! # Dataset Directory
//!
//! A [`CountingService`] backed by uploaded JSON files.
//!
//! ## Layout
//! ```text
//! <dataset_dir>/
//! ├── catalog.json                 fetch_catalog
//! ├── snapshot_A_3.json            fetch_system_snapshot(A, "3")
//! ├── snapshot_A.json                 └─ fallback when no per-round file
//! ├── counts_A_3.json              fetch_physical_counts(A, "3")
//! ├── rounds.json                  list_available_round_numbers
//! └── submitted_A_3.json           written by submit_round
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use tally_core::{CountEntry, Round, Warehouse};

use crate::error::{LoadTarget, SyncError, SyncResult};
use crate::service::{CountingService, SubmitReceipt};

/// Reads datasets from a directory and records submissions next to them.
#[derive(Debug, Clone)]
pub struct DatasetDirectory {
    root: PathBuf,
}

/// What `submit_round` writes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Submission<'a> {
    accepted_id: &'a str,
    warehouse: Warehouse,
    number: &'a str,
    round_id: &'a str,
    registered_by: &'a str,
    store_id: Option<&'a str>,
    started_at: chrono::DateTime<chrono::Utc>,
    entries: &'a [CountEntry],
}

impl DatasetDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DatasetDirectory { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_file(warehouse: Warehouse, number: &str) -> String {
        format!("snapshot_{}_{}.json", warehouse.code(), number)
    }

    pub fn counts_file(warehouse: Warehouse, number: &str) -> String {
        format!("counts_{}_{}.json", warehouse.code(), number)
    }

    pub fn submitted_file(warehouse: Warehouse, number: &str) -> String {
        format!("submitted_{}_{}.json", warehouse.code(), number)
    }

    /// Reads the first existing file among `names`.
    async fn read_first(&self, target: LoadTarget, names: &[String]) -> SyncResult<Value> {
        for name in names {
            let path = self.root.join(name);
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    debug!(?path, %target, "Read dataset file");
                    return serde_json::from_slice(&bytes).map_err(|e| SyncError::Load {
                        target,
                        reason: format!("{} is not valid JSON: {}", name, e),
                    });
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(SyncError::Load {
                        target,
                        reason: format!("{}: {}", name, e),
                    })
                }
            }
        }
        Err(SyncError::Load {
            target,
            reason: format!("no dataset file found (tried {})", names.join(", ")),
        })
    }
}

#[async_trait]
impl CountingService for DatasetDirectory {
    async fn fetch_catalog(&self) -> SyncResult<Value> {
        self.read_first(LoadTarget::Catalog, &["catalog.json".to_string()])
            .await
    }

    async fn fetch_system_snapshot(&self, warehouse: Warehouse, number: &str) -> SyncResult<Value> {
        self.read_first(
            LoadTarget::Snapshot(warehouse),
            &[
                Self::snapshot_file(warehouse, number),
                format!("snapshot_{}.json", warehouse.code()),
            ],
        )
        .await
    }

    async fn fetch_physical_counts(&self, warehouse: Warehouse, number: &str) -> SyncResult<Value> {
        self.read_first(
            LoadTarget::Counts(warehouse),
            &[Self::counts_file(warehouse, number)],
        )
        .await
    }

    async fn submit_round(
        &self,
        warehouse: Warehouse,
        round: &Round,
        entries: &[CountEntry],
    ) -> SyncResult<SubmitReceipt> {
        let accepted_id = Uuid::new_v4().to_string();
        let submission = Submission {
            accepted_id: &accepted_id,
            warehouse,
            number: &round.number,
            round_id: &round.id,
            registered_by: &round.registered_by,
            store_id: round.store_id.as_deref(),
            started_at: round.started_at,
            entries,
        };
        let body = serde_json::to_vec_pretty(&submission)?;

        let path = self
            .root
            .join(Self::submitted_file(warehouse, &round.number));
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SyncError::Remote(format!("cannot create {:?}: {}", self.root, e)))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| SyncError::Remote(format!("cannot write {:?}: {}", path, e)))?;

        info!(?path, %warehouse, number = %round.number, entries = entries.len(), "Round submitted");
        Ok(SubmitReceipt { accepted_id })
    }

    async fn list_available_round_numbers(&self) -> SyncResult<Value> {
        self.read_first(LoadTarget::Rounds, &["rounds.json".to_string()])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tally_core::Quantity;

    async fn temp_dataset() -> DatasetDirectory {
        let dir = std::env::temp_dir().join(format!("tally-dataset-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        DatasetDirectory::new(dir)
    }

    async fn write(dataset: &DatasetDirectory, name: &str, value: Value) {
        tokio::fs::write(dataset.root().join(name), value.to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_prefers_round_file() {
        let dataset = temp_dataset().await;
        write(&dataset, "snapshot_A.json", json!([{ "code": "X", "qty": 1 }])).await;
        write(&dataset, "snapshot_A_2.json", json!([{ "code": "Y", "qty": 2 }])).await;

        let round_two = dataset.fetch_system_snapshot(Warehouse::A, "2").await.unwrap();
        assert_eq!(round_two[0]["code"], "Y");

        let fallback = dataset.fetch_system_snapshot(Warehouse::A, "9").await.unwrap();
        assert_eq!(fallback[0]["code"], "X");

        tokio::fs::remove_dir_all(dataset.root()).await.ok();
    }

    #[tokio::test]
    async fn test_missing_and_invalid_files_are_load_errors() {
        let dataset = temp_dataset().await;
        let missing = dataset.fetch_catalog().await.unwrap_err();
        assert!(missing.is_warning());

        tokio::fs::write(dataset.root().join("rounds.json"), "{not json")
            .await
            .unwrap();
        let invalid = dataset.list_available_round_numbers().await.unwrap_err();
        assert!(matches!(invalid, SyncError::Load { target: LoadTarget::Rounds, .. }));

        tokio::fs::remove_dir_all(dataset.root()).await.ok();
    }

    #[tokio::test]
    async fn test_submit_writes_file() {
        let dataset = temp_dataset().await;
        let entries = vec![CountEntry {
            product_code: "A".into(),
            quantity: Quantity::from_units(4),
            unit_of_measure: "UND".into(),
        }];
        let round = Round {
            id: "r-1".into(),
            number: "3".into(),
            warehouse: Warehouse::B,
            registered_by: "ana".into(),
            started_at: Utc::now(),
            closed_at: None,
            store_id: Some("store-001".into()),
            entries: entries.clone(),
        };

        let receipt = dataset
            .submit_round(Warehouse::B, &round, &entries)
            .await
            .unwrap();
        let written = tokio::fs::read(dataset.root().join("submitted_B_3.json"))
            .await
            .unwrap();
        let written: Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(written["acceptedId"], receipt.accepted_id.as_str());
        assert_eq!(written["entries"].as_array().unwrap().len(), 1);

        tokio::fs::remove_dir_all(dataset.root()).await.ok();
    }
}
