//! # tally-core: Pure Counting Logic for Tally
//!
//! This crate holds the round lifecycle and the reconciliation and
//! consolidation engines. It performs no I/O: payloads come in as
//! `serde_json::Value`, results go out as plain data.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Presentation (external, consumes ts-rs types)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tally-sync (async session layer)                │   │
//! │  │    timeouts, latest-request-wins, remote service contract      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │ catalog  │ │ snapshot │ │  ledger  │ │ reconcile        │  │   │
//! │  │   │ Products │ │ system   │ │ Rounds   │ │ consolidate      │  │   │
//! │  │   │ by code  │ │ stock    │ │ + gate   │ │ pagination       │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO CLOCK READS EXCEPT ROUND CREATION    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Round, ReconciliationRow, etc.)
//! - [`quantity`] - Fixed-point quantities (no floating point in diffs)
//! - [`ingest`] - Maps loosely-shaped payloads onto the domain types
//! - [`catalog`], [`snapshot`], [`ledger`] - The three input stores
//! - [`reconcile`], [`consolidate`] - Derived views, always fully rebuilt
//! - [`pagination`] - Page windows for any list
//! - [`state`] - The container tying the stores together
//!
//! ## Example Usage
//!
//! ```rust
//! use serde_json::json;
//! use tally_core::{InventoryState, Quantity, RoundMetadata, Warehouse};
//!
//! let mut state = InventoryState::new();
//! state.load_catalog(&json!([{ "codigo": "A", "nombre": "Arroz" }])).unwrap();
//! state
//!     .load_snapshot(Warehouse::A, &json!([{ "code": "A", "saldo": 10 }]))
//!     .unwrap();
//!
//! let metadata = RoundMetadata {
//!     registered_by: "ana".into(),
//!     store_id: None,
//!     started_at: None,
//! };
//! state.open_or_join_round(Warehouse::A, "1", metadata).unwrap();
//! state
//!     .record_count(Warehouse::A, "1", "A", Quantity::from_units(7))
//!     .unwrap();
//!
//! let result = state.reconcile(Warehouse::A, "1").unwrap();
//! assert_eq!(result.row("A").unwrap().diff, Quantity::from_units(-3));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod consolidate;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod pagination;
pub mod quantity;
pub mod reconcile;
pub mod snapshot;
pub mod state;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use catalog::CatalogStore;
pub use consolidate::{ConsolidatedReport, ConsolidationAggregator, WarehouseInput};
pub use error::{CoreError, CoreResult, ValidationError};
pub use ingest::IngestReport;
pub use ledger::{CountLedger, CountOutcome, CountPreview, CountWarning, RoundGate};
pub use pagination::{paginate, Page, PaginationCursor};
pub use quantity::Quantity;
pub use reconcile::{Reconciliation, ReconciliationEngine, ReconciliationSummary};
pub use snapshot::SystemSnapshotStore;
pub use state::InventoryState;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default rows per page for presentation layers.
pub const DEFAULT_PAGE_SIZE: usize = 50;
