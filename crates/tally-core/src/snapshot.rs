//! # System Snapshot Store
//!
//! Per-warehouse map of product code → system-declared quantity.
//!
//! ## Replace, Never Merge
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  upload #1:  { A: 10, B: 5, C: 1 }                                     │
//! │  upload #2:  { A: 12, B: 5 }                                           │
//! │                                                                         │
//! │  merge   → { A: 12, B: 5, C: 1 }   ❌ C is a stale leftover             │
//! │  replace → { A: 12, B: 5 }         ✅                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A warehouse with no snapshot yet reads as an empty map, not an error.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ValidationError;
use crate::ingest::{self, IngestReport};
use crate::quantity::Quantity;
use crate::types::{SystemStockRecord, Warehouse};

/// Snapshot of one warehouse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarehouseSnapshot {
    quantities: HashMap<String, Quantity>,
}

impl WarehouseSnapshot {
    pub fn quantity(&self, code: &str) -> Option<Quantity> {
        self.quantities.get(code).copied()
    }

    pub fn quantities(&self) -> &HashMap<String, Quantity> {
        &self.quantities
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }
}

/// All warehouse snapshots.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshotStore {
    snapshots: HashMap<Warehouse, WarehouseSnapshot>,
}

impl SystemSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the warehouse snapshot with `records`.
    ///
    /// Records with an empty code are dropped; for repeated codes the last
    /// record wins. The returned report counts both.
    pub fn replace_snapshot(
        &mut self,
        warehouse: Warehouse,
        records: Vec<SystemStockRecord>,
    ) -> IngestReport {
        let mut report = IngestReport::default();
        let mut quantities = HashMap::with_capacity(records.len());

        for record in records {
            let code = record.product_code.trim();
            if code.is_empty() {
                report.dropped += 1;
                continue;
            }
            if quantities.insert(code.to_string(), record.quantity).is_some() {
                report.duplicates += 1;
            }
        }

        report.accepted = quantities.len();
        self.snapshots
            .insert(warehouse, WarehouseSnapshot { quantities });
        report
    }

    /// Ingests a raw payload and replaces the warehouse snapshot.
    ///
    /// A payload that is not a list leaves the previous snapshot intact.
    pub fn load(
        &mut self,
        warehouse: Warehouse,
        payload: &Value,
    ) -> Result<IngestReport, ValidationError> {
        let ingested = ingest::stock_records(payload)?;
        let mut report = self.replace_snapshot(warehouse, ingested.records);
        report.dropped += ingested.report.dropped;
        report.duplicates += ingested.report.duplicates;
        Ok(report)
    }

    /// Returns the code → quantity map (empty if never loaded).
    pub fn get_snapshot(&self, warehouse: Warehouse) -> HashMap<String, Quantity> {
        self.snapshots
            .get(&warehouse)
            .map(|s| s.quantities.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, warehouse: Warehouse) -> Option<&WarehouseSnapshot> {
        self.snapshots.get(&warehouse)
    }

    pub fn has_snapshot(&self, warehouse: Warehouse) -> bool {
        self.snapshots.contains_key(&warehouse)
    }

    /// Forgets the warehouse snapshot.
    pub fn clear(&mut self, warehouse: Warehouse) {
        self.snapshots.remove(&warehouse);
    }
}
