//! # Reconciliation Engine
//!
//! Compares one round's physical counts with the warehouse system snapshot.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  physical = round.entries by code          system = snapshot(W)        │
//! │                                                                         │
//! │  codes = system.keys ∪ physical.keys                                   │
//! │                                                                         │
//! │  for code in codes:                                                    │
//! │      sys  = system[code]   or 0     (counted but unlisted)             │
//! │      phys = physical[code] or 0     (listed but not counted)           │
//! │      diff = phys - sys                                                 │
//! │      status = CONFORME (0) | SOBRANTE (>0) | FALTANTE (<0)             │
//! │                                                                         │
//! │  ORDER: codes seen by the previous run keep their positions;           │
//! │         new codes are appended sorted by code.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A warehouse without a snapshot reconciles against an empty map, so every
//! counted code surfaces as SOBRANTE instead of failing.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogStore;
use crate::quantity::Quantity;
use crate::types::{
    DiscrepancyStatus, ReconciliationRow, Round, Warehouse, DEFAULT_UNIT_OF_MEASURE,
};

// =============================================================================
// Reconciliation Result
// =============================================================================

/// Rows for one warehouse/round pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub warehouse: Warehouse,
    pub round_id: String,
    pub round_number: String,
    pub rows: Vec<ReconciliationRow>,
}

/// Count of rows per status plus quantity sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSummary {
    pub system_qty: Quantity,
    pub physical_qty: Quantity,
    pub diff: Quantity,
    pub conforme: usize,
    pub sobrante: usize,
    pub faltante: usize,
}

impl Reconciliation {
    pub fn row(&self, code: &str) -> Option<&ReconciliationRow> {
        self.rows.iter().find(|r| r.product_code == code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.product_code.as_str())
    }

    /// Rows with the given status, in display order.
    pub fn with_status(&self, status: DiscrepancyStatus) -> Vec<&ReconciliationRow> {
        self.rows.iter().filter(|r| r.status == status).collect()
    }

    pub fn summary(&self) -> ReconciliationSummary {
        let mut summary = ReconciliationSummary::default();
        for row in &self.rows {
            summary.system_qty += row.system_qty;
            summary.physical_qty += row.physical_qty;
            summary.diff += row.diff;
            match row.status {
                DiscrepancyStatus::Conforme => summary.conforme += 1,
                DiscrepancyStatus::Sobrante => summary.sobrante += 1,
                DiscrepancyStatus::Faltante => summary.faltante += 1,
            }
        }
        summary
    }
}

// =============================================================================
// Pure Row Computation
// =============================================================================

/// Computes rows for `round` against `system`, ordered by `prior_order`.
pub fn reconcile_rows(
    catalog: &CatalogStore,
    system: &HashMap<String, Quantity>,
    round: &Round,
    prior_order: Option<&[String]>,
) -> Vec<ReconciliationRow> {
    // Entries are unique by code, so this is a direct index.
    let physical: HashMap<&str, (Quantity, &str)> = round
        .entries
        .iter()
        .map(|e| {
            (
                e.product_code.as_str(),
                (e.quantity, e.unit_of_measure.as_str()),
            )
        })
        .collect();

    let mut remaining: BTreeSet<&str> = system
        .keys()
        .map(String::as_str)
        .chain(physical.keys().copied())
        .collect();

    let mut ordered: Vec<&str> = Vec::with_capacity(remaining.len());
    if let Some(prior) = prior_order {
        for code in prior {
            if remaining.remove(code.as_str()) {
                ordered.push(code.as_str());
            }
        }
    }
    ordered.extend(remaining);

    ordered
        .into_iter()
        .map(|code| {
            let system_qty = system.get(code).copied().unwrap_or_default();
            let (physical_qty, entry_unit) = physical
                .get(code)
                .copied()
                .unwrap_or((Quantity::zero(), DEFAULT_UNIT_OF_MEASURE));
            let product = catalog.find_by_code(code);
            let diff = physical_qty - system_qty;

            ReconciliationRow {
                product_code: code.to_string(),
                product_name: product.map(|p| p.name.clone()),
                unit_of_measure: product
                    .map(|p| p.unit_of_measure.clone())
                    .unwrap_or_else(|| entry_unit.to_string()),
                system_qty,
                physical_qty,
                diff,
                status: DiscrepancyStatus::from_diff(diff),
            }
        })
        .collect()
}

/// Rows for a warehouse that has a snapshot but no round: nothing counted.
pub fn snapshot_rows(
    catalog: &CatalogStore,
    system: &HashMap<String, Quantity>,
) -> Vec<ReconciliationRow> {
    let codes: BTreeSet<&str> = system.keys().map(String::as_str).collect();
    codes
        .into_iter()
        .map(|code| {
            let system_qty = system.get(code).copied().unwrap_or_default();
            let product = catalog.find_by_code(code);
            let diff = Quantity::zero() - system_qty;

            ReconciliationRow {
                product_code: code.to_string(),
                product_name: product.map(|p| p.name.clone()),
                unit_of_measure: product
                    .map(|p| p.unit_of_measure.clone())
                    .unwrap_or_else(|| DEFAULT_UNIT_OF_MEASURE.to_string()),
                system_qty,
                physical_qty: Quantity::zero(),
                diff,
                status: DiscrepancyStatus::from_diff(diff),
            }
        })
        .collect()
}

// =============================================================================
// Engine (keeps display order between runs)
// =============================================================================

/// Recomputes reconciliations on demand, remembering row order per round.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    previous_order: HashMap<(Warehouse, String), Vec<String>>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciles `round` against the warehouse snapshot `system`.
    ///
    /// Always a full recomputation; only the row order carries over.
    pub fn reconcile(
        &mut self,
        catalog: &CatalogStore,
        system: &HashMap<String, Quantity>,
        round: &Round,
    ) -> Reconciliation {
        let key = (round.warehouse, round.id.clone());
        let rows = reconcile_rows(
            catalog,
            system,
            round,
            self.previous_order.get(&key).map(Vec::as_slice),
        );
        self.previous_order
            .insert(key, rows.iter().map(|r| r.product_code.clone()).collect());

        Reconciliation {
            warehouse: round.warehouse,
            round_id: round.id.clone(),
            round_number: round.number.clone(),
            rows,
        }
    }

    /// Drops the remembered order for a round (next run sorts by code).
    pub fn forget(&mut self, warehouse: Warehouse, round_id: &str) {
        self.previous_order
            .remove(&(warehouse, round_id.to_string()));
    }

    /// Drops remembered orders for rounds no longer present.
    pub fn retain_rounds(&mut self, live: &HashSet<(Warehouse, String)>) {
        self.previous_order.retain(|key, _| live.contains(key));
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
