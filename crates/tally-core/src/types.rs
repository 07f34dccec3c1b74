//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Round      │   │   CountEntry    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  code (join key)│   │  id (UUID)      │   │  product_code   │       │
//! │  │  name           │   │  number         │   │  quantity       │       │
//! │  │  unit_of_measure│   │  warehouse      │   │  unit_of_measure│       │
//! │  └─────────────────┘   │  closed_at      │   └─────────────────┘       │
//! │                        │  entries[]      │                              │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌─────────────────────┐  ┌──────────────────┐   │
//! │  │SystemStockRecord │  │ ReconciliationRow   │  │ ConsolidatedRow  │   │
//! │  │  product_code    │  │  (derived)          │  │  (derived)       │   │
//! │  │  quantity        │  │  diff = phys - sys  │  │  totals over W   │   │
//! │  └──────────────────┘  └─────────────────────┘  └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Rounds have:
//! - `id`: UUID v4 - immutable, local identity
//! - `number`: business round number, shared by every warehouse counting it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::quantity::Quantity;

/// Unit of measure used when neither the catalog nor the payload provides one.
pub const DEFAULT_UNIT_OF_MEASURE: &str = "UND";

// =============================================================================
// Warehouse
// =============================================================================

/// A counted location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Warehouse {
    A,
    B,
}

impl Warehouse {
    /// Every warehouse, in display order.
    pub const ALL: [Warehouse; 2] = [Warehouse::A, Warehouse::B];

    /// Short code used in dataset file names and logs.
    pub const fn code(&self) -> &'static str {
        match self {
            Warehouse::A => "A",
            Warehouse::B => "B",
        }
    }
}

impl std::fmt::Display for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Warehouse {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let tail = lowered
            .strip_prefix("almacen")
            .or_else(|| lowered.strip_prefix("warehouse"))
            .unwrap_or(&lowered)
            .trim_start_matches(['_', '-', ' ']);
        match tail {
            "a" => Ok(Warehouse::A),
            "b" => Ok(Warehouse::B),
            _ => Err(ValidationError::InvalidFormat {
                field: "warehouse".to_string(),
                reason: format!("unknown warehouse '{}', expected A or B", s.trim()),
            }),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the reference catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Universal join key across catalog, snapshots and counts.
    pub code: String,
    pub name: String,
    pub unit_of_measure: String,
}

// =============================================================================
// Count Entry
// =============================================================================

/// One counted quantity inside a round. Unique by `product_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CountEntry {
    pub product_code: String,
    pub quantity: Quantity,
    pub unit_of_measure: String,
}

// =============================================================================
// Round
// =============================================================================

/// Lifecycle state of a round. The only transition is `Open → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Open,
    Closed,
}

/// Who opened a round and for which store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RoundMetadata {
    pub registered_by: String,
    pub store_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub started_at: Option<DateTime<Utc>>,
}

/// One numbered counting session for a warehouse.
///
/// ## Invariants
/// - `entries` are unique by `product_code` (re-entering a code overwrites)
/// - once `closed_at` is set the round never changes again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: String,
    pub number: String,
    pub warehouse: Warehouse,
    pub registered_by: String,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub store_id: Option<String>,
    pub entries: Vec<CountEntry>,
}

impl Round {
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    pub fn status(&self) -> RoundStatus {
        if self.is_closed() {
            RoundStatus::Closed
        } else {
            RoundStatus::Open
        }
    }

    /// Finds the entry for a product code.
    pub fn entry(&self, code: &str) -> Option<&CountEntry> {
        self.entries.iter().find(|e| e.product_code == code)
    }
}

// =============================================================================
// System Stock Record
// =============================================================================

/// System-of-record quantity for one product in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SystemStockRecord {
    pub product_code: String,
    pub quantity: Quantity,
}

// =============================================================================
// Discrepancy Status
// =============================================================================

/// Classification of a diff (physical minus system).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyStatus {
    /// diff = 0
    Conforme,
    /// diff > 0
    Sobrante,
    /// diff < 0
    Faltante,
}

impl DiscrepancyStatus {
    /// Classifies a diff by its sign.
    pub fn from_diff(diff: Quantity) -> Self {
        if diff.is_zero() {
            DiscrepancyStatus::Conforme
        } else if diff.is_positive() {
            DiscrepancyStatus::Sobrante
        } else {
            DiscrepancyStatus::Faltante
        }
    }
}

impl std::fmt::Display for DiscrepancyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscrepancyStatus::Conforme => write!(f, "CONFORME"),
            DiscrepancyStatus::Sobrante => write!(f, "SOBRANTE"),
            DiscrepancyStatus::Faltante => write!(f, "FALTANTE"),
        }
    }
}

// =============================================================================
// Derived Rows
// =============================================================================

/// Per-product comparison for one warehouse/round. Never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRow {
    pub product_code: String,
    /// `None` when the code is not in the catalog (counted by mistake).
    pub product_name: Option<String>,
    pub unit_of_measure: String,
    pub system_qty: Quantity,
    pub physical_qty: Quantity,
    pub diff: Quantity,
    pub status: DiscrepancyStatus,
}

/// Quantities contributed by one warehouse to a consolidated row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseQuantities {
    pub warehouse: Warehouse,
    pub system_qty: Quantity,
    pub physical_qty: Quantity,
    pub diff: Quantity,
}

/// Cross-warehouse totals for one product code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedRow {
    pub product_code: String,
    pub product_name: Option<String>,
    pub unit_of_measure: String,
    pub system_qty_total: Quantity,
    pub physical_qty_total: Quantity,
    pub diff_total: Quantity,
    pub status: DiscrepancyStatus,
    pub per_warehouse: Vec<WarehouseQuantities>,
}

/// Grand total over every consolidated row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedTotals {
    pub system_qty_total: Quantity,
    pub physical_qty_total: Quantity,
    pub diff_total: Quantity,
    pub products: usize,
    pub conforme: usize,
    pub sobrante: usize,
    pub faltante: usize,
}

/// A row of the consolidated view: product lines first, the total last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsolidatedLine {
    Product(ConsolidatedRow),
    Total(ConsolidatedTotals),
}

/// Round number offered by the remote service for the join flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AvailableRound {
    pub number: String,
    pub id: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_diff() {
        assert_eq!(
            DiscrepancyStatus::from_diff(Quantity::zero()),
            DiscrepancyStatus::Conforme
        );
        assert_eq!(
            DiscrepancyStatus::from_diff(Quantity::from_units(2)),
            DiscrepancyStatus::Sobrante
        );
        assert_eq!(
            DiscrepancyStatus::from_diff(Quantity::from_milli(-1)),
            DiscrepancyStatus::Faltante
        );
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&DiscrepancyStatus::Faltante).unwrap();
        assert_eq!(json, "\"FALTANTE\"");
        assert_eq!(DiscrepancyStatus::Sobrante.to_string(), "SOBRANTE");
    }

    #[test]
    fn test_warehouse_parsing() {
        assert_eq!("A".parse::<Warehouse>().unwrap(), Warehouse::A);
        assert_eq!("b".parse::<Warehouse>().unwrap(), Warehouse::B);
        assert_eq!("almacen_a".parse::<Warehouse>().unwrap(), Warehouse::A);
        assert_eq!("Warehouse B".parse::<Warehouse>().unwrap(), Warehouse::B);
        assert!("C".parse::<Warehouse>().is_err());
    }

    #[test]
    fn test_round_status() {
        let mut round = Round {
            id: "r1".into(),
            number: "1".into(),
            warehouse: Warehouse::A,
            registered_by: "ana".into(),
            started_at: Utc::now(),
            closed_at: None,
            store_id: None,
            entries: vec![],
        };
        assert_eq!(round.status(), RoundStatus::Open);
        round.closed_at = Some(Utc::now());
        assert_eq!(round.status(), RoundStatus::Closed);
    }
}
