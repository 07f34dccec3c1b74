//! # Sync Error Types
//!
//! Error types for the session layer. Every remote failure is converted into
//! one of these at the call site; raw transport errors never escape.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │  Loads (warn)   │  │  Invariants (block)     │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Load           │  │  Core(RoundClosed)      │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  Core(AlreadyClosed)    │ │
//! │  │  ConfigLoad...  │  │  RowsDropped    │  │  Core(InvalidRoundState)│ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │  Remote         │  submit rejected by the service                   │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tally_core::{CoreError, ValidationError, Warehouse};
use thiserror::Error;

/// Result type alias for session operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// What a fetch was loading, for messages and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadTarget {
    Catalog,
    Snapshot(Warehouse),
    Counts(Warehouse),
    Rounds,
}

impl std::fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadTarget::Catalog => write!(f, "catalog"),
            LoadTarget::Snapshot(w) => write!(f, "system snapshot for warehouse {}", w),
            LoadTarget::Counts(w) => write!(f, "physical counts for warehouse {}", w),
            LoadTarget::Rounds => write!(f, "available rounds"),
        }
    }
}

/// Session error type.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid service URL.
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Load Errors (degrade to last known good)
    // =========================================================================
    /// A fetch failed or returned an unusable payload.
    #[error("Could not load {target}: {reason}")]
    Load { target: LoadTarget, reason: String },

    /// A fetch did not answer in time and was cancelled.
    #[error("Timed out loading {target} after {secs} seconds")]
    Timeout { target: LoadTarget, secs: u64 },

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The service refused or failed an operation that is not a load.
    #[error("Counting service error: {0}")]
    Remote(String),

    // =========================================================================
    // Core Errors
    // =========================================================================
    /// Business rule violation or validation failure from tally-core.
    #[error(transparent)]
    Core(#[from] CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for SyncError {
    fn from(err: ValidationError) -> Self {
        SyncError::Core(CoreError::Validation(err))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Remote(format!("malformed payload: {}", err))
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if this error should be shown as a non-fatal warning.
    ///
    /// ## Warnings
    /// - Load failures and timeouts (state falls back to last known good)
    /// - Dropped malformed rows
    ///
    /// Invariant violations and config errors are never warnings.
    pub fn is_warning(&self) -> bool {
        match self {
            SyncError::Load { .. } | SyncError::Timeout { .. } => true,
            SyncError::Core(CoreError::Validation(ValidationError::RowsDropped { .. })) => true,
            _ => false,
        }
    }

    /// Returns true for round state-machine violations (a UI state bug).
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, SyncError::Core(e) if e.is_invariant_violation())
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if this was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_errors() {
        assert!(SyncError::Load {
            target: LoadTarget::Catalog,
            reason: "offline".into()
        }
        .is_warning());
        assert!(SyncError::Timeout {
            target: LoadTarget::Snapshot(Warehouse::A),
            secs: 30
        }
        .is_warning());
        assert!(SyncError::from(ValidationError::RowsDropped {
            what: "catalog".into(),
            dropped: 2
        })
        .is_warning());

        assert!(!SyncError::InvalidConfig("bad".into()).is_warning());
        assert!(!SyncError::Remote("rejected".into()).is_warning());
    }

    #[test]
    fn test_invariant_violation() {
        let err = SyncError::from(CoreError::RoundClosed {
            warehouse: Warehouse::B,
            number: "3".into(),
        });
        assert!(err.is_invariant_violation());
        assert!(!err.is_warning());
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_timeout_display() {
        let err = SyncError::Timeout {
            target: LoadTarget::Snapshot(Warehouse::A),
            secs: 30,
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("warehouse A"));
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("x".into()).is_config_error());
        assert!(!SyncError::Remote("x".into()).is_config_error());
    }
}
