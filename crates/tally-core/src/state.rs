//! # Inventory State
//!
//! The single container owning every store. Nothing in this crate is global:
//! callers construct an `InventoryState` and pass it (or a handle to it)
//! where it is needed.
//!
//! ## Initialization Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CatalogStore            (join key: product code)                   │
//! │  2. SystemSnapshotStore     CountLedger + RoundGate                    │
//! │  3. ReconciliationEngine    ConsolidationAggregator                    │
//! │                                                                         │
//! │  Engines only read stores; stores never call engines.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::catalog::CatalogStore;
use crate::consolidate::{ConsolidatedReport, ConsolidationAggregator, WarehouseInput};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::ingest::IngestReport;
use crate::ledger::{CountLedger, CountOutcome, CountPreview, RoundGate};
use crate::quantity::Quantity;
use crate::reconcile::{snapshot_rows, Reconciliation, ReconciliationEngine};
use crate::snapshot::SystemSnapshotStore;
use crate::types::{
    CountEntry, ReconciliationRow, Round, RoundMetadata, SystemStockRecord, Warehouse,
};
use crate::validation::validate_round_number;

/// Every store and engine of one inventory session.
#[derive(Debug, Clone, Default)]
pub struct InventoryState {
    catalog: CatalogStore,
    snapshots: SystemSnapshotStore,
    ledger: CountLedger,
    gate: RoundGate,
    engine: ReconciliationEngine,
    aggregator: ConsolidationAggregator,
    /// Latest reconciliation per warehouse.
    reconciliations: HashMap<Warehouse, Reconciliation>,
}

impl InventoryState {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Stores
    // =========================================================================

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn snapshots(&self) -> &SystemSnapshotStore {
        &self.snapshots
    }

    pub fn ledger(&self) -> &CountLedger {
        &self.ledger
    }

    pub fn gate(&self) -> &RoundGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut RoundGate {
        &mut self.gate
    }

    /// Replaces the catalog from a raw payload (all or nothing).
    pub fn load_catalog(&mut self, payload: &Value) -> CoreResult<IngestReport> {
        self.catalog.load(payload)
    }

    /// Replaces a warehouse snapshot from a raw payload (all or nothing).
    pub fn load_snapshot(
        &mut self,
        warehouse: Warehouse,
        payload: &Value,
    ) -> Result<IngestReport, ValidationError> {
        self.snapshots.load(warehouse, payload)
    }

    pub fn replace_snapshot(
        &mut self,
        warehouse: Warehouse,
        records: Vec<SystemStockRecord>,
    ) -> IngestReport {
        self.snapshots.replace_snapshot(warehouse, records)
    }

    // =========================================================================
    // Rounds and Counts
    // =========================================================================

    pub fn open_or_join_round(
        &mut self,
        warehouse: Warehouse,
        number: &str,
        metadata: RoundMetadata,
    ) -> CoreResult<Round> {
        self.ledger
            .open_or_join_round(&mut self.gate, warehouse, number, metadata)
            .cloned()
    }

    pub fn preview_count(
        &self,
        warehouse: Warehouse,
        round_ref: &str,
        product_code: &str,
        quantity: Quantity,
    ) -> CoreResult<CountPreview> {
        self.ledger
            .preview_count(&self.catalog, warehouse, round_ref, product_code, quantity)
    }

    pub fn record_count(
        &mut self,
        warehouse: Warehouse,
        round_ref: &str,
        product_code: &str,
        quantity: Quantity,
    ) -> CoreResult<CountOutcome> {
        self.ledger
            .record_count(&self.catalog, warehouse, round_ref, product_code, quantity)
    }

    /// Replaces a round's entries with the ones held remotely.
    pub fn hydrate_round(
        &mut self,
        warehouse: Warehouse,
        round_ref: &str,
        entries: Vec<CountEntry>,
    ) -> CoreResult<usize> {
        self.ledger.replace_entries(warehouse, round_ref, entries)
    }

    pub fn close_round(
        &mut self,
        warehouse: Warehouse,
        round_ref: &str,
        closed_at: DateTime<Utc>,
    ) -> CoreResult<Round> {
        self.ledger
            .close_round(&mut self.gate, warehouse, round_ref, closed_at)
            .cloned()
    }

    /// Next round number after every number this session knows about.
    pub fn assign_round_number<'a>(
        &mut self,
        remote_numbers: impl IntoIterator<Item = &'a str>,
    ) -> CoreResult<String> {
        let known: Vec<String> = self
            .ledger
            .known_numbers()
            .into_iter()
            .chain(remote_numbers.into_iter().map(str::to_string))
            .collect();
        self.gate
            .assign_next_number(known.iter().map(String::as_str))
    }

    pub fn round(&self, warehouse: Warehouse, round_ref: &str) -> Option<&Round> {
        self.ledger.round(warehouse, round_ref)
    }

    // =========================================================================
    // Derived Views
    // =========================================================================

    /// Recomputes the reconciliation of one round and remembers it.
    pub fn reconcile(
        &mut self,
        warehouse: Warehouse,
        round_ref: &str,
    ) -> CoreResult<&Reconciliation> {
        let round = self
            .ledger
            .round(warehouse, round_ref)
            .ok_or_else(|| CoreError::RoundNotFound {
                warehouse,
                round: round_ref.to_string(),
            })?;
        let system = self.snapshots.get_snapshot(warehouse);
        let result = self.engine.reconcile(&self.catalog, &system, round);

        self.reconciliations.insert(warehouse, result);
        Ok(&self.reconciliations[&warehouse])
    }

    /// Latest reconciliation computed for a warehouse.
    pub fn reconciliation(&self, warehouse: Warehouse) -> Option<&Reconciliation> {
        self.reconciliations.get(&warehouse)
    }

    /// Rebuilds the cross-warehouse view for round `number`.
    ///
    /// Every warehouse that has a round with that number is reconciled
    /// afresh. A warehouse with a snapshot but no such round contributes its
    /// snapshot with nothing counted; one with neither contributes nothing.
    pub fn consolidate(&mut self, number: &str) -> CoreResult<ConsolidatedReport> {
        let number = validate_round_number(number)?;

        let mut per_warehouse: Vec<(Warehouse, Option<Vec<ReconciliationRow>>)> = Vec::new();
        for warehouse in Warehouse::ALL {
            let round_id = self
                .ledger
                .rounds(warehouse)
                .iter()
                .find(|r| r.number == number)
                .map(|r| r.id.clone());
            let rows = match round_id {
                Some(round_id) => Some(self.reconcile(warehouse, &round_id)?.rows.clone()),
                None if self.snapshots.has_snapshot(warehouse) => Some(snapshot_rows(
                    &self.catalog,
                    &self.snapshots.get_snapshot(warehouse),
                )),
                None => None,
            };
            per_warehouse.push((warehouse, rows));
        }

        let inputs: Vec<WarehouseInput<'_>> = per_warehouse
            .iter()
            .map(|(w, rows)| WarehouseInput::new(*w, rows.as_deref()))
            .collect();
        Ok(self.aggregator.consolidate(&number, &inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiscrepancyStatus;
    use serde_json::json;

    fn metadata() -> RoundMetadata {
        RoundMetadata {
            registered_by: "ana".into(),
            store_id: None,
            started_at: None,
        }
    }

    fn seeded() -> InventoryState {
        let mut state = InventoryState::new();
        state
            .load_catalog(&json!([
                { "code": "A", "name": "Arroz" },
                { "code": "B", "name": "Frijol" },
                { "code": "C", "name": "Azucar" }
            ]))
            .unwrap();
        state
            .load_snapshot(Warehouse::A, &json!([{ "code": "A", "qty": 10 }, { "code": "B", "qty": 5 }]))
            .unwrap();
        state
            .load_snapshot(Warehouse::B, &json!([{ "code": "A", "qty": 3 }]))
            .unwrap();
        state
    }

    #[test]
    fn test_reconcile_and_consolidate() {
        let mut state = seeded();
        state.open_or_join_round(Warehouse::A, "1", metadata()).unwrap();
        state.open_or_join_round(Warehouse::B, "1", metadata()).unwrap();
        state
            .record_count(Warehouse::A, "1", "B", Quantity::from_units(5))
            .unwrap();
        state
            .record_count(Warehouse::A, "1", "C", Quantity::from_units(2))
            .unwrap();

        let a = state.reconcile(Warehouse::A, "1").unwrap();
        assert_eq!(a.row("A").unwrap().status, DiscrepancyStatus::Faltante);
        assert_eq!(a.row("C").unwrap().status, DiscrepancyStatus::Sobrante);

        let report = state.consolidate("1").unwrap();
        assert_eq!(
            report.row("A").unwrap().diff_total,
            Quantity::from_units(-13)
        );
        assert!(state.reconciliation(Warehouse::B).is_some());
    }

    #[test]
    fn test_consolidate_without_rounds_or_snapshots_is_just_total() {
        let mut state = InventoryState::new();
        let report = state.consolidate("4").unwrap();
        assert!(report.rows.is_empty());
        assert_eq!(report.lines().len(), 1);
    }

    #[test]
    fn test_consolidate_keeps_snapshot_of_warehouse_without_round() {
        let mut state = seeded();
        state.open_or_join_round(Warehouse::A, "1", metadata()).unwrap();
        state
            .record_count(Warehouse::A, "1", "B", Quantity::from_units(5))
            .unwrap();
        state
            .record_count(Warehouse::A, "1", "C", Quantity::from_units(2))
            .unwrap();

        let report = state.consolidate("1").unwrap();
        let a = report.row("A").unwrap();
        assert_eq!(a.diff_total, Quantity::from_units(-13));
        assert_eq!(a.system_qty_total, Quantity::from_units(13));
        assert_eq!(a.per_warehouse.len(), 2);
        assert_eq!(report.total.diff_total, Quantity::from_units(-11));
        assert!(state.reconciliation(Warehouse::B).is_none());
    }

    #[test]
    fn test_consolidate_snapshots_only() {
        let mut state = seeded();
        let report = state.consolidate("4").unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.row("A").unwrap().diff_total, Quantity::from_units(-13));
        assert_eq!(report.row("B").unwrap().status, DiscrepancyStatus::Faltante);
        assert_eq!(report.total.physical_qty_total, Quantity::zero());
    }

    #[test]
    fn test_reconcile_unknown_round() {
        let mut state = seeded();
        assert!(matches!(
            state.reconcile(Warehouse::A, "9"),
            Err(CoreError::RoundNotFound { .. })
        ));
    }

    #[test]
    fn test_closed_round_rejects_counts_and_hydration() {
        let mut state = seeded();
        state.open_or_join_round(Warehouse::A, "1", metadata()).unwrap();
        state
            .record_count(Warehouse::A, "1", "A", Quantity::from_units(1))
            .unwrap();
        state.close_round(Warehouse::A, "1", Utc::now()).unwrap();

        assert!(matches!(
            state.record_count(Warehouse::A, "1", "A", Quantity::from_units(2)),
            Err(CoreError::RoundClosed { .. })
        ));
        assert!(state.hydrate_round(Warehouse::A, "1", Vec::new()).is_err());
        assert_eq!(
            state.round(Warehouse::A, "1").unwrap().entries[0].quantity,
            Quantity::from_units(1)
        );
    }

    #[test]
    fn test_assign_round_number_uses_local_and_remote() {
        let mut state = seeded();
        state.open_or_join_round(Warehouse::A, "4", metadata()).unwrap();
        state.close_round(Warehouse::A, "4", Utc::now()).unwrap();
        assert_eq!(state.assign_round_number(["2", "7"]).unwrap(), "8");
        assert_eq!(state.gate().active_number(), Some("8"));

        state.gate_mut().release();
        assert_eq!(state.assign_round_number(Vec::<&str>::new()).unwrap(), "5");
    }
}
