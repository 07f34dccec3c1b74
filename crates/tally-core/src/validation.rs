//! # Validation Module
//!
//! Input validation for codes, counted quantities and round numbers.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation                                                 │
//! │  └── Basic format checks, immediate user feedback                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Ingestion (remote payloads)                                  │
//! │  └── Malformed rows dropped and counted, never fatal                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: THIS MODULE (user-entered values)                            │
//! │  └── Rejected with a typed ValidationError                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::quantity::Quantity;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted product code.
pub const MAX_CODE_LEN: usize = 64;

/// Largest accepted counted quantity (in whole units).
pub const MAX_COUNT_UNITS: i64 = 10_000_000;

/// Largest accepted system quantity magnitude (in whole units).
pub const MAX_SYSTEM_UNITS: i64 = 1_000_000_000;

/// Validates and normalizes a product code.
///
/// ## Rules
/// - Trimmed, must not be empty
/// - At most 64 characters
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_code;
///
/// assert_eq!(validate_code("  P-001 ").unwrap(), "P-001");
/// assert!(validate_code("   ").is_err());
/// ```
pub fn validate_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }

    Ok(code.to_string())
}

/// Validates a counted (physical) quantity.
///
/// ## Rules
/// - Must be >= 0 (zero is a valid count: "looked, found none")
/// - Must not exceed MAX_COUNT_UNITS
pub fn validate_count_quantity(quantity: Quantity) -> ValidationResult<()> {
    if quantity.is_negative() {
        return Err(ValidationError::MustBeNonNegative {
            field: "quantity".to_string(),
        });
    }

    if quantity > Quantity::from_units(MAX_COUNT_UNITS) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_COUNT_UNITS,
        });
    }

    Ok(())
}

/// Validates a system-of-record quantity. Negative balances are allowed.
pub fn validate_system_quantity(quantity: Quantity) -> ValidationResult<()> {
    if quantity.abs() > Quantity::from_units(MAX_SYSTEM_UNITS) {
        return Err(ValidationError::OutOfRange {
            field: "system quantity".to_string(),
            min: -MAX_SYSTEM_UNITS,
            max: MAX_SYSTEM_UNITS,
        });
    }

    Ok(())
}

/// Validates and normalizes a round number.
///
/// Round numbers are positive integers carried as strings (`"007"` → `"7"`).
pub fn validate_round_number(number: &str) -> ValidationResult<String> {
    let number = number.trim();

    if number.is_empty() {
        return Err(ValidationError::Required {
            field: "round number".to_string(),
        });
    }

    let parsed: u64 = number.parse().map_err(|_| ValidationError::InvalidFormat {
        field: "round number".to_string(),
        reason: "must be a positive integer".to_string(),
    })?;

    if parsed == 0 {
        return Err(ValidationError::OutOfRange {
            field: "round number".to_string(),
            min: 1,
            max: i64::MAX,
        });
    }

    Ok(parsed.to_string())
}

/// Validates an operator name for a round.
pub fn validate_registered_by(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "registered by".to_string(),
        });
    }

    if name.chars().count() > 120 {
        return Err(ValidationError::TooLong {
            field: "registered by".to_string(),
            max: 120,
        });
    }

    Ok(name.to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================
