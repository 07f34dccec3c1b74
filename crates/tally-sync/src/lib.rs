//! # tally-sync: Async Session Layer for Tally
//!
//! Connects the pure stores in `tally-core` to a remote counting service,
//! adding the concerns the core leaves out: timeouts, stale-response
//! handling, degraded loads, configuration and logging.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Session Architecture                            │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  InventorySession (orchestrator)                 │  │
//! │  │                                                                  │  │
//! │  │  RwLock<InventoryState>   RequestTracker   SessionEventEmitter  │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ Arc<dyn CountingService>                │
//! │                               ▼                                         │
//! │  ┌────────────────────────────────────────────────────────────────┐    │
//! │  │  DatasetDirectory (uploaded JSON)   or any other implementation │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  EVERY FETCH: timeout → token check → ingest → replace or keep old     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`session`] - `InventorySession` and its outcome types
//! - [`service`] - `CountingService` contract
//! - [`dataset`] - `DatasetDirectory` implementation of the contract
//! - [`tokens`] - Latest-request-wins bookkeeping
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Session error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_core::Warehouse;
//! use tally_sync::{InventorySession, TallyConfig};
//!
//! let session = InventorySession::from_config(TallyConfig::load_or_default(None));
//! session.refresh_catalog().await?;
//! let refresh = session.refresh_all_snapshots("3").await?;
//! for line in refresh.report.lines() {
//!     println!("{:?}", line);
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod dataset;
pub mod error;
pub mod service;
pub mod session;
pub mod tokens;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::TallyConfig;
pub use dataset::DatasetDirectory;
pub use error::{LoadTarget, SyncError, SyncResult};
pub use service::{CountingService, SubmitReceipt};
pub use session::{
    InventorySession, LoadOutcome, NoOpEmitter, SessionEventEmitter, SnapshotRefresh,
    SubmitOutcome, SubmitPreview,
};
pub use tokens::{Operation, RequestToken, RequestTracker, Scope};
