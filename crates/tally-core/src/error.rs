//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Round invariants, catalog payloads             │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-sync errors (separate crate)                                    │
//! │  └── SyncError        - Load / timeout / remote failures               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → presentation layer    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Invariant violations (writes to a closed round, closing twice, opening a
//! number the gate does not admit) are always returned as errors. They are
//! never folded into a no-op.

use thiserror::Error;

use crate::types::Warehouse;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A count was written to a round that is already closed.
    ///
    /// ## When This Occurs
    /// - The UI kept an entry form open after the round was submitted
    /// - A late hydration tried to refill a closed round
    #[error("Round {number} in warehouse {warehouse} is closed; counts can no longer change")]
    RoundClosed { warehouse: Warehouse, number: String },

    /// `close_round` was called on a round that is already closed.
    #[error("Round {number} in warehouse {warehouse} is already closed")]
    AlreadyClosed { warehouse: Warehouse, number: String },

    /// The round gate refused to create a new round number.
    ///
    /// ## When This Occurs
    /// - New numbers are disabled (`accepting_new == false`)
    /// - Another round number is still active system-wide
    #[error("Round {number} cannot be opened: {reason}")]
    InvalidRoundState { number: String, reason: String },

    /// Counts changed while the round was being submitted.
    ///
    /// ## When This Occurs
    /// - A count was recorded after the submit started but before it
    ///   returned; the service holds the earlier entries
    #[error("Round {number} in warehouse {warehouse} changed while it was being submitted")]
    ChangedDuringSubmit { warehouse: Warehouse, number: String },

    /// The referenced round does not exist in the warehouse.
    #[error("Round {round} not found in warehouse {warehouse}")]
    RoundNotFound { warehouse: Warehouse, round: String },

    /// The catalog payload could not be used at all.
    #[error("Catalog could not be loaded: {reason}")]
    CatalogLoad { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns true for round state-machine violations.
    ///
    /// These indicate a UI state bug and must block the attempted action.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            CoreError::RoundClosed { .. }
                | CoreError::AlreadyClosed { .. }
                | CoreError::InvalidRoundState { .. }
                | CoreError::ChangedDuringSubmit { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Invalid format (e.g., unparseable quantity, non-numeric round number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Malformed rows were dropped during ingestion.
    ///
    /// Rows are not reported individually, only counted.
    #[error("{dropped} malformed {what} row(s) were dropped")]
    RowsDropped { what: String, dropped: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::RoundClosed {
            warehouse: Warehouse::A,
            number: "7".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Round 7 in warehouse A is closed; counts can no longer change"
        );

        let err = ValidationError::RowsDropped {
            what: "snapshot".to_string(),
            dropped: 3,
        };
        assert_eq!(err.to_string(), "3 malformed snapshot row(s) were dropped");
    }

    #[test]
    fn test_invariant_classification() {
        assert!(CoreError::AlreadyClosed {
            warehouse: Warehouse::B,
            number: "1".into()
        }
        .is_invariant_violation());
        assert!(!CoreError::CatalogLoad {
            reason: "not a list".into()
        }
        .is_invariant_violation());
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
