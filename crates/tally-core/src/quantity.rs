//! # Quantity Module
//!
//! Provides the `Quantity` type for stock and count quantities.
//!
//! ## Why Fixed-Point Quantities?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Counted 0.1 kg + 0.2 kg against a system stock of 0.3 kg:             │
//! │    0.1 + 0.2 - 0.3 = 0.00000000000000004  → "SOBRANTE"  ❌ WRONG!       │
//! │                                                                         │
//! │  OUR SOLUTION: Integer thousandths                                      │
//! │    100 + 200 - 300 = 0                    → "CONFORME"  ✅              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::quantity::Quantity;
//!
//! let counted = Quantity::from_units(12);
//! let system = Quantity::from_milli(10_500); // 10.5
//!
//! let diff = counted - system;
//! assert_eq!(diff.milli(), 1_500);
//! assert_eq!(diff.to_string(), "1.5");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

/// Thousandths per whole unit.
pub const MILLI_PER_UNIT: i64 = 1_000;

// =============================================================================
// Quantity Type
// =============================================================================

/// A quantity in thousandths of a unit of measure.
///
/// Signed, because diffs and some system-of-record balances are negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from thousandths of a unit.
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Creates a quantity from whole units.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::quantity::Quantity;
    ///
    /// assert_eq!(Quantity::from_units(3).milli(), 3_000);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * MILLI_PER_UNIT)
    }

    /// Converts a float (as found in JSON payloads) rounding to thousandths.
    ///
    /// Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let milli = (value * MILLI_PER_UNIT as f64).round();
        if milli.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Quantity(milli as i64))
    }

    /// Returns the raw value in thousandths.
    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    /// Returns the quantity as a float (for display/export only).
    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / MILLI_PER_UNIT as f64
    }

    /// Zero quantity.
    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Quantity(self.0.saturating_abs())
    }
}

// =============================================================================
// Parsing
// =============================================================================

impl std::str::FromStr for Quantity {
    type Err = ValidationError;

    /// Parses `"12"`, `"12.5"`, `"-3"` and the comma decimal form `"12,5"`.
    ///
    /// More than three decimals are rounded half away from zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "quantity".to_string(),
            });
        }

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let normalized = digits.replace(',', ".");
        let mut parts = normalized.splitn(2, '.');
        let whole = parts.next().unwrap_or("");
        let frac = parts.next().unwrap_or("");

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("must be a decimal number"));
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("too large"))?
        };

        let mut frac_milli: i64 = 0;
        for (i, c) in frac.chars().take(3).enumerate() {
            let digit = i64::from(c.to_digit(10).unwrap_or(0));
            frac_milli += digit * 10_i64.pow(2 - i as u32);
        }
        if let Some(next) = frac.chars().nth(3) {
            if next.to_digit(10).unwrap_or(0) >= 5 {
                frac_milli += 1;
            }
        }

        let milli = whole_value
            .checked_mul(MILLI_PER_UNIT)
            .and_then(|w| w.checked_add(frac_milli))
            .ok_or_else(|| invalid("too large"))?;

        Ok(Quantity(if negative { -milli } else { milli }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the shortest decimal form: `12`, `12.5`, `-0.125`.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MILLI_PER_UNIT as u64;
        let frac = abs % MILLI_PER_UNIT as u64;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let frac = format!("{:03}", frac);
            write!(f, "{}{}.{}", sign, whole, frac.trim_end_matches('0'))
        }
    }
}

// Arithmetic saturates at the i64 bounds instead of wrapping or panicking.

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(self.0.saturating_neg())
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}

impl<'a> Sum<&'a Quantity> for Quantity {
    fn sum<I: Iterator<Item = &'a Quantity>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
