//! # Counting Service Contract
//!
//! The remote operations a session depends on. Fetches return raw JSON so
//! the service may use whatever key names it likes; `tally_core::ingest`
//! maps them onto the domain types.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  fetch_catalog()                          → [ Product-ish rows ]        │
//! │  fetch_system_snapshot(W, number)         → [ {code, qty} rows ]        │
//! │  fetch_physical_counts(W, number)         → [ {code, qty} rows ]        │
//! │  list_available_round_numbers()           → [ {number, id} rows ]       │
//! │  submit_round(W, round, entries)          → SubmitReceipt               │
//! │                                                                         │
//! │  No automatic retries: the caller decides whether to try again.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tally_core::{CountEntry, Round, Warehouse};

use crate::error::SyncResult;

/// Acknowledgement that the service finalized a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub accepted_id: String,
}

/// Remote counting-data service.
///
/// Implementations convert their own failures into [`crate::SyncError`];
/// timeouts are applied by the session, not here.
#[async_trait]
pub trait CountingService: Send + Sync {
    async fn fetch_catalog(&self) -> SyncResult<Value>;

    async fn fetch_system_snapshot(&self, warehouse: Warehouse, number: &str) -> SyncResult<Value>;

    /// Entries already recorded remotely for a round.
    async fn fetch_physical_counts(&self, warehouse: Warehouse, number: &str) -> SyncResult<Value>;

    /// Marks a round as finalized remotely.
    async fn submit_round(
        &self,
        warehouse: Warehouse,
        round: &Round,
        entries: &[CountEntry],
    ) -> SyncResult<SubmitReceipt>;

    async fn list_available_round_numbers(&self) -> SyncResult<Value>;
}
