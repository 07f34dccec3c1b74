//! # Count Ledger
//!
//! Per-warehouse ordered rounds, each holding its own count entries, plus the
//! global [`RoundGate`] that decides which round number may be opened.
//!
//! ## Round State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   open_or_join_round()          close_round()                           │
//! │   ───────────────────► ┌──────┐ ──────────────► ┌────────┐              │
//! │                        │ OPEN │                 │ CLOSED │ (terminal)   │
//! │   record_count() ────► └──────┘                 └────────┘              │
//! │   (upsert by code)                  record_count() → RoundClosed        │
//! │                                     close_round()  → AlreadyClosed      │
//! │                                                                         │
//! │  ORTHOGONAL: RoundGate.accepting_new gates creation of NEW numbers      │
//! │  only. Existing open rounds keep accepting entries either way.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rounds are looked up by a "round ref": the round id, or failing that the
//! round number within the warehouse.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::CatalogStore;
use crate::error::{CoreError, CoreResult};
use crate::quantity::Quantity;
use crate::types::{CountEntry, Round, RoundMetadata, Warehouse, DEFAULT_UNIT_OF_MEASURE};
use crate::validation::{
    validate_code, validate_count_quantity, validate_registered_by, validate_round_number,
};

// =============================================================================
// Round Gate
// =============================================================================

/// System-wide round numbering state.
///
/// At most one round number is active at a time. Joining the active number
/// from another warehouse is always allowed; opening a different one is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundGate {
    accepting_new: bool,
    active_number: Option<String>,
}

impl Default for RoundGate {
    fn default() -> Self {
        RoundGate {
            accepting_new: true,
            active_number: None,
        }
    }
}

impl RoundGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_accepting_new(&self) -> bool {
        self.accepting_new
    }

    pub fn set_accepting_new(&mut self, accepting: bool) {
        self.accepting_new = accepting;
    }

    pub fn active_number(&self) -> Option<&str> {
        self.active_number.as_deref()
    }

    /// Allocates `max(known) + 1` and makes it the active number.
    pub fn assign_next_number<'a>(
        &mut self,
        known: impl IntoIterator<Item = &'a str>,
    ) -> CoreResult<String> {
        let next = known
            .into_iter()
            .filter_map(|n| n.trim().parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let next = next.to_string();
        self.admit(&next, false)?;
        self.active_number = Some(next.clone());
        Ok(next)
    }

    /// Makes an existing round number the active one.
    pub fn join(&mut self, number: &str) -> CoreResult<String> {
        let number = validate_round_number(number)?;
        self.admit(&number, true)?;
        self.active_number = Some(number.clone());
        Ok(number)
    }

    /// Checks whether `number` may be opened in some warehouse.
    ///
    /// `known` is true when the number already exists (locally or remotely),
    /// which makes this a join rather than a new number.
    pub fn admit(&self, number: &str, known: bool) -> CoreResult<()> {
        match self.active_number.as_deref() {
            Some(active) if active == number => Ok(()),
            Some(active) => Err(CoreError::InvalidRoundState {
                number: number.to_string(),
                reason: format!("round {} is still active", active),
            }),
            None if known || self.accepting_new => Ok(()),
            None => Err(CoreError::InvalidRoundState {
                number: number.to_string(),
                reason: "new round numbers are disabled".to_string(),
            }),
        }
    }

    /// Clears the active number, returning it.
    pub fn release(&mut self) -> Option<String> {
        self.active_number.take()
    }
}

// =============================================================================
// Previews
// =============================================================================

/// Something the operator should confirm before a count is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CountWarning {
    /// The code is not in the catalog (it will still be reconciled).
    UnknownProduct { code: String },
    /// The code was already counted in this round and will be overwritten.
    OverwritesExisting { previous: Quantity },
}

/// Result of validating a count without applying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountPreview {
    pub product_code: String,
    pub quantity: Quantity,
    pub unit_of_measure: String,
    pub warnings: Vec<CountWarning>,
}

impl CountPreview {
    pub fn needs_confirmation(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// What a committed count replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountOutcome {
    pub previous: Option<Quantity>,
}

// =============================================================================
// Count Ledger
// =============================================================================

/// Rounds per warehouse, in insertion (chronological) order.
#[derive(Debug, Clone, Default)]
pub struct CountLedger {
    rounds: HashMap<Warehouse, Vec<Round>>,
}

impl CountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the round with `number` in `warehouse`, creating it if needed.
    ///
    /// Joining is idempotent: the same round (same id, same entries) comes
    /// back for the same warehouse + number. Creating a round goes through the
    /// gate and makes its number the active one.
    pub fn open_or_join_round(
        &mut self,
        gate: &mut RoundGate,
        warehouse: Warehouse,
        number: &str,
        metadata: RoundMetadata,
    ) -> CoreResult<&Round> {
        let number = validate_round_number(number)?;

        if let Some(pos) = self.position_by_number(warehouse, &number) {
            return Ok(&self.rounds[&warehouse][pos]);
        }

        let known = self.known_numbers().contains(&number);
        gate.admit(&number, known)?;
        let registered_by = validate_registered_by(&metadata.registered_by)?;

        let round = Round {
            id: Uuid::new_v4().to_string(),
            number: number.clone(),
            warehouse,
            registered_by,
            started_at: metadata.started_at.unwrap_or_else(Utc::now),
            closed_at: None,
            store_id: metadata.store_id,
            entries: Vec::new(),
        };

        gate.active_number = Some(number);
        let rounds = self.rounds.entry(warehouse).or_default();
        rounds.push(round);
        Ok(&rounds[rounds.len() - 1])
    }

    /// Validates a count and reports what committing it would do.
    pub fn preview_count(
        &self,
        catalog: &CatalogStore,
        warehouse: Warehouse,
        round_ref: &str,
        product_code: &str,
        quantity: Quantity,
    ) -> CoreResult<CountPreview> {
        let round = self.require(warehouse, round_ref)?;
        if round.is_closed() {
            return Err(CoreError::RoundClosed {
                warehouse,
                number: round.number.clone(),
            });
        }

        let code = validate_code(product_code)?;
        validate_count_quantity(quantity)?;

        let mut warnings = Vec::new();
        let unit_of_measure = match catalog.find_by_code(&code) {
            Some(product) => product.unit_of_measure.clone(),
            None => {
                warnings.push(CountWarning::UnknownProduct { code: code.clone() });
                round
                    .entry(&code)
                    .map(|e| e.unit_of_measure.clone())
                    .unwrap_or_else(|| DEFAULT_UNIT_OF_MEASURE.to_string())
            }
        };
        if let Some(existing) = round.entry(&code) {
            warnings.push(CountWarning::OverwritesExisting {
                previous: existing.quantity,
            });
        }

        Ok(CountPreview {
            product_code: code,
            quantity,
            unit_of_measure,
            warnings,
        })
    }

    /// Upserts the count for `product_code` (last write wins, no history).
    ///
    /// ## Errors
    /// - [`CoreError::RoundClosed`] if the round is closed; entries are untouched
    /// - [`CoreError::Validation`] for an empty code or negative quantity
    pub fn record_count(
        &mut self,
        catalog: &CatalogStore,
        warehouse: Warehouse,
        round_ref: &str,
        product_code: &str,
        quantity: Quantity,
    ) -> CoreResult<CountOutcome> {
        let preview = self.preview_count(catalog, warehouse, round_ref, product_code, quantity)?;
        let round = self.require_mut(warehouse, round_ref)?;

        let previous = match round
            .entries
            .iter_mut()
            .find(|e| e.product_code == preview.product_code)
        {
            Some(entry) => {
                let previous = entry.quantity;
                entry.quantity = preview.quantity;
                entry.unit_of_measure = preview.unit_of_measure;
                Some(previous)
            }
            None => {
                round.entries.push(CountEntry {
                    product_code: preview.product_code,
                    quantity: preview.quantity,
                    unit_of_measure: preview.unit_of_measure,
                });
                None
            }
        };

        Ok(CountOutcome { previous })
    }

    /// Replaces every entry of an open round (hydration from the service).
    ///
    /// Entries repeating a code collapse to the last one.
    pub fn replace_entries(
        &mut self,
        warehouse: Warehouse,
        round_ref: &str,
        entries: Vec<CountEntry>,
    ) -> CoreResult<usize> {
        let round = self.require_mut(warehouse, round_ref)?;
        if round.is_closed() {
            return Err(CoreError::RoundClosed {
                warehouse,
                number: round.number.clone(),
            });
        }

        let mut collapsed: Vec<CountEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match collapsed
                .iter_mut()
                .find(|e| e.product_code == entry.product_code)
            {
                Some(existing) => *existing = entry,
                None => collapsed.push(entry),
            }
        }
        round.entries = collapsed;
        Ok(round.entries.len())
    }

    /// Closes a round. One-way; there is no reopen.
    ///
    /// When no open round with the same number remains in any warehouse, the
    /// gate's active number is released.
    pub fn close_round(
        &mut self,
        gate: &mut RoundGate,
        warehouse: Warehouse,
        round_ref: &str,
        closed_at: DateTime<Utc>,
    ) -> CoreResult<&Round> {
        let number = {
            let round = self.require_mut(warehouse, round_ref)?;
            if round.is_closed() {
                return Err(CoreError::AlreadyClosed {
                    warehouse,
                    number: round.number.clone(),
                });
            }
            round.closed_at = Some(closed_at);
            round.number.clone()
        };

        let still_open = self
            .rounds
            .values()
            .flatten()
            .any(|r| r.number == number && !r.is_closed());
        if !still_open && gate.active_number() == Some(number.as_str()) {
            gate.release();
        }

        self.require(warehouse, round_ref)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Rounds of a warehouse in chronological order.
    pub fn rounds(&self, warehouse: Warehouse) -> &[Round] {
        self.rounds
            .get(&warehouse)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Finds a round by id, then by number.
    pub fn round(&self, warehouse: Warehouse, round_ref: &str) -> Option<&Round> {
        let rounds = self.rounds.get(&warehouse)?;
        let round_ref = round_ref.trim();
        rounds
            .iter()
            .find(|r| r.id == round_ref)
            .or_else(|| {
                let number = validate_round_number(round_ref).ok()?;
                rounds.iter().find(|r| r.number == number)
            })
    }

    /// Most recently opened round of a warehouse.
    pub fn latest_round(&self, warehouse: Warehouse) -> Option<&Round> {
        self.rounds.get(&warehouse).and_then(|r| r.last())
    }

    /// Every round number present in any warehouse.
    pub fn known_numbers(&self) -> BTreeSet<String> {
        self.rounds
            .values()
            .flatten()
            .map(|r| r.number.clone())
            .collect()
    }

    fn position_by_number(&self, warehouse: Warehouse, number: &str) -> Option<usize> {
        self.rounds
            .get(&warehouse)?
            .iter()
            .position(|r| r.number == number)
    }

    fn require(&self, warehouse: Warehouse, round_ref: &str) -> CoreResult<&Round> {
        self.round(warehouse, round_ref)
            .ok_or_else(|| CoreError::RoundNotFound {
                warehouse,
                round: round_ref.to_string(),
            })
    }

    fn require_mut(&mut self, warehouse: Warehouse, round_ref: &str) -> CoreResult<&mut Round> {
        let id = self.require(warehouse, round_ref)?.id.clone();
        self.rounds
            .get_mut(&warehouse)
            .and_then(|rounds| rounds.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| CoreError::RoundNotFound {
                warehouse,
                round: round_ref.to_string(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> RoundMetadata {
        RoundMetadata {
            registered_by: "ana".to_string(),
            store_id: Some("store-1".to_string()),
            started_at: None,
        }
    }

    fn catalog() -> CatalogStore {
        let mut catalog = CatalogStore::new();
        catalog
            .load(&json!([
                { "code": "A", "name": "Arroz", "unit": "KG" },
                { "code": "B", "name": "Frijol" }
            ]))
            .unwrap();
        catalog
    }

    #[test]
    fn test_idempotent_join() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        let catalog = catalog();

        let first = ledger
            .open_or_join_round(&mut gate, Warehouse::A, "1", meta())
            .unwrap()
            .id
            .clone();
        ledger
            .record_count(&catalog, Warehouse::A, &first, "A", Quantity::from_units(4))
            .unwrap();

        let again = ledger
            .open_or_join_round(&mut gate, Warehouse::A, "001", meta())
            .unwrap();
        assert_eq!(again.id, first);
        assert_eq!(again.entries.len(), 1);
        assert_eq!(ledger.rounds(Warehouse::A).len(), 1);
    }

    #[test]
    fn test_join_active_number_across_warehouses() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        ledger
            .open_or_join_round(&mut gate, Warehouse::A, "3", meta())
            .unwrap();
        gate.set_accepting_new(false);

        let b = ledger
            .open_or_join_round(&mut gate, Warehouse::B, "3", meta())
            .unwrap();
        assert_eq!(b.number, "3");
        assert_eq!(gate.active_number(), Some("3"));
    }

    #[test]
    fn test_gate_rejects_second_active_number() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        ledger
            .open_or_join_round(&mut gate, Warehouse::A, "1", meta())
            .unwrap();
        let err = ledger
            .open_or_join_round(&mut gate, Warehouse::B, "2", meta())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRoundState { .. }));
    }

    #[test]
    fn test_gate_closed_rejects_new_number() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        gate.set_accepting_new(false);
        let err = ledger
            .open_or_join_round(&mut gate, Warehouse::A, "5", meta())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRoundState { .. }));
        assert!(ledger.rounds(Warehouse::A).is_empty());
    }

    #[test]
    fn test_record_count_upserts() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        let catalog = catalog();
        ledger
            .open_or_join_round(&mut gate, Warehouse::A, "1", meta())
            .unwrap();

        let first = ledger
            .record_count(&catalog, Warehouse::A, "1", "A", Quantity::from_units(2))
            .unwrap();
        assert_eq!(first.previous, None);
        let second = ledger
            .record_count(&catalog, Warehouse::A, "1", "A", Quantity::from_units(7))
            .unwrap();
        assert_eq!(second.previous, Some(Quantity::from_units(2)));

        let round = ledger.round(Warehouse::A, "1").unwrap();
        assert_eq!(round.entries.len(), 1);
        assert_eq!(round.entries[0].quantity, Quantity::from_units(7));
        assert_eq!(round.entries[0].unit_of_measure, "KG");
    }

    #[test]
    fn test_record_count_rejects_negative() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        ledger
            .open_or_join_round(&mut gate, Warehouse::A, "1", meta())
            .unwrap();
        let err = ledger
            .record_count(&catalog(), Warehouse::A, "1", "A", Quantity::from_units(-1))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_preview_warnings() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        let catalog = catalog();
        ledger
            .open_or_join_round(&mut gate, Warehouse::A, "1", meta())
            .unwrap();
        ledger
            .record_count(&catalog, Warehouse::A, "1", "B", Quantity::from_units(1))
            .unwrap();

        let clean = ledger
            .preview_count(&catalog, Warehouse::A, "1", "A", Quantity::from_units(1))
            .unwrap();
        assert!(!clean.needs_confirmation());

        let overwrite = ledger
            .preview_count(&catalog, Warehouse::A, "1", "B", Quantity::from_units(9))
            .unwrap();
        assert_eq!(
            overwrite.warnings,
            vec![CountWarning::OverwritesExisting {
                previous: Quantity::from_units(1)
            }]
        );

        let unknown = ledger
            .preview_count(&catalog, Warehouse::A, "1", "ZZ", Quantity::from_units(1))
            .unwrap();
        assert!(matches!(
            unknown.warnings[0],
            CountWarning::UnknownProduct { .. }
        ));
        // preview never mutates
        assert_eq!(ledger.round(Warehouse::A, "1").unwrap().entries.len(), 1);
    }

    #[test]
    fn test_closed_round_is_immutable() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        let catalog = catalog();
        let id = ledger
            .open_or_join_round(&mut gate, Warehouse::A, "1", meta())
            .unwrap()
            .id
            .clone();
        ledger
            .record_count(&catalog, Warehouse::A, &id, "A", Quantity::from_units(3))
            .unwrap();
        ledger
            .close_round(&mut gate, Warehouse::A, &id, Utc::now())
            .unwrap();

        let before = ledger.round(Warehouse::A, &id).unwrap().entries.clone();
        let err = ledger
            .record_count(&catalog, Warehouse::A, &id, "A", Quantity::from_units(99))
            .unwrap_err();
        assert!(matches!(err, CoreError::RoundClosed { .. }));
        let err = ledger
            .replace_entries(Warehouse::A, &id, Vec::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::RoundClosed { .. }));
        assert_eq!(ledger.round(Warehouse::A, &id).unwrap().entries, before);
    }

    #[test]
    fn test_close_twice_is_explicit_error() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        ledger
            .open_or_join_round(&mut gate, Warehouse::A, "1", meta())
            .unwrap();
        ledger
            .close_round(&mut gate, Warehouse::A, "1", Utc::now())
            .unwrap();
        let err = ledger
            .close_round(&mut gate, Warehouse::A, "1", Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyClosed { .. }));
    }

    #[test]
    fn test_gate_released_when_last_round_closes() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        ledger
            .open_or_join_round(&mut gate, Warehouse::A, "1", meta())
            .unwrap();
        ledger
            .open_or_join_round(&mut gate, Warehouse::B, "1", meta())
            .unwrap();

        ledger
            .close_round(&mut gate, Warehouse::A, "1", Utc::now())
            .unwrap();
        assert_eq!(gate.active_number(), Some("1"));
        ledger
            .close_round(&mut gate, Warehouse::B, "1", Utc::now())
            .unwrap();
        assert_eq!(gate.active_number(), None);

        let next = gate
            .assign_next_number(ledger.known_numbers().iter().map(String::as_str))
            .unwrap();
        assert_eq!(next, "2");
    }

    #[test]
    fn test_replace_entries_collapses_codes() {
        let mut ledger = CountLedger::new();
        let mut gate = RoundGate::new();
        ledger
            .open_or_join_round(&mut gate, Warehouse::B, "4", meta())
            .unwrap();
        let entry = |code: &str, units: i64| CountEntry {
            product_code: code.to_string(),
            quantity: Quantity::from_units(units),
            unit_of_measure: "UND".to_string(),
        };
        let n = ledger
            .replace_entries(
                Warehouse::B,
                "4",
                vec![entry("A", 1), entry("B", 2), entry("A", 5)],
            )
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            ledger.round(Warehouse::B, "4").unwrap().entry("A").unwrap().quantity,
            Quantity::from_units(5)
        );
    }

    #[test]
    fn test_unknown_round_ref() {
        let ledger = CountLedger::new();
        let err = ledger
            .preview_count(&catalog(), Warehouse::A, "nope", "A", Quantity::zero())
            .unwrap_err();
        assert!(matches!(err, CoreError::RoundNotFound { .. }));
    }
}
