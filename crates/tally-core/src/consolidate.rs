//! # Consolidation Aggregator
//!
//! Sums per-warehouse reconciliations into one cross-warehouse view.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   Warehouse A rows ──┐                                                  │
//! │                      ├──► per code: Σ system, Σ physical, Σ diff        │
//! │   Warehouse B rows ──┘        (sorted by code)                          │
//! │                                                                         │
//! │   lines():  [ Product(A) , Product(B) , ... , Total ]                   │
//! │                                                   ▲                     │
//! │                                    always last, exactly once            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no incremental path: every call rebuilds from the inputs. A
//! warehouse whose reconciliation has not run contributes zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::quantity::Quantity;
use crate::types::{
    ConsolidatedLine, ConsolidatedRow, ConsolidatedTotals, DiscrepancyStatus, ReconciliationRow,
    Warehouse, WarehouseQuantities,
};

/// One warehouse's contribution. `rows: None` means "not reconciled yet".
#[derive(Debug, Clone, Copy)]
pub struct WarehouseInput<'a> {
    pub warehouse: Warehouse,
    pub rows: Option<&'a [ReconciliationRow]>,
}

impl<'a> WarehouseInput<'a> {
    pub fn new(warehouse: Warehouse, rows: Option<&'a [ReconciliationRow]>) -> Self {
        Self { warehouse, rows }
    }
}

/// Consolidated rows plus the grand total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedReport {
    pub round_number: String,
    pub rows: Vec<ConsolidatedRow>,
    pub total: ConsolidatedTotals,
}

impl ConsolidatedReport {
    /// Product lines in code order, then the total line.
    pub fn lines(&self) -> Vec<ConsolidatedLine> {
        self.rows
            .iter()
            .cloned()
            .map(ConsolidatedLine::Product)
            .chain(std::iter::once(ConsolidatedLine::Total(self.total.clone())))
            .collect()
    }

    pub fn row(&self, code: &str) -> Option<&ConsolidatedRow> {
        self.rows.iter().find(|r| r.product_code == code)
    }
}

/// Stateless aggregator over per-warehouse reconciliations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolidationAggregator;

impl ConsolidationAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Rebuilds the consolidated view for `round_number` from `inputs`.
    pub fn consolidate(&self, round_number: &str, inputs: &[WarehouseInput<'_>]) -> ConsolidatedReport {
        let mut by_code: BTreeMap<&str, ConsolidatedRow> = BTreeMap::new();

        for input in inputs {
            let Some(rows) = input.rows else {
                continue;
            };
            for row in rows {
                let entry = by_code
                    .entry(row.product_code.as_str())
                    .or_insert_with(|| ConsolidatedRow {
                        product_code: row.product_code.clone(),
                        product_name: None,
                        unit_of_measure: row.unit_of_measure.clone(),
                        system_qty_total: Quantity::zero(),
                        physical_qty_total: Quantity::zero(),
                        diff_total: Quantity::zero(),
                        status: DiscrepancyStatus::Conforme,
                        per_warehouse: Vec::new(),
                    });

                // First warehouse that knows the product names it.
                if entry.product_name.is_none() && row.product_name.is_some() {
                    entry.product_name = row.product_name.clone();
                    entry.unit_of_measure = row.unit_of_measure.clone();
                }

                entry.system_qty_total += row.system_qty;
                entry.physical_qty_total += row.physical_qty;
                entry.diff_total += row.diff;
                entry.per_warehouse.push(WarehouseQuantities {
                    warehouse: input.warehouse,
                    system_qty: row.system_qty,
                    physical_qty: row.physical_qty,
                    diff: row.diff,
                });
            }
        }

        let mut total = ConsolidatedTotals::default();
        let rows: Vec<ConsolidatedRow> = by_code
            .into_values()
            .map(|mut row| {
                row.status = DiscrepancyStatus::from_diff(row.diff_total);
                total.system_qty_total += row.system_qty_total;
                total.physical_qty_total += row.physical_qty_total;
                total.diff_total += row.diff_total;
                total.products += 1;
                match row.status {
                    DiscrepancyStatus::Conforme => total.conforme += 1,
                    DiscrepancyStatus::Sobrante => total.sobrante += 1,
                    DiscrepancyStatus::Faltante => total.faltante += 1,
                }
                row
            })
            .collect();

        ConsolidatedReport {
            round_number: round_number.to_string(),
            rows,
            total,
        }
    }
}
