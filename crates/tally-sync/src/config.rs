//! # Session Configuration
//!
//! Configuration for an inventory session.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_STORE_ID=store-001                                           │
//! │     TALLY_SERVICE_URL=https://counts.example.com                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally/tally.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.tally.tally/tally.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     30 s request timeout, 50 rows per page                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [store]
//! id = "store-001"
//! name = "Downtown Branch"
//!
//! [operator]
//! registered_by = "ana"
//!
//! [service]
//! url = "https://counts.example.com"
//! dataset_dir = "/srv/tally/uploads"
//! request_timeout_secs = 30
//!
//! [presentation]
//! page_size = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Store Configuration
// =============================================================================

/// The store whose warehouses are being counted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            id: None,
            name: "Default Store".to_string(),
        }
    }
}

// =============================================================================
// Operator Configuration
// =============================================================================

/// Who is registering counts on this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default = "default_registered_by")]
    pub registered_by: String,
}

fn default_registered_by() -> String {
    "operator".to_string()
}

impl Default for OperatorConfig {
    fn default() -> Self {
        OperatorConfig {
            registered_by: default_registered_by(),
        }
    }
}

// =============================================================================
// Service Settings
// =============================================================================

/// Where counting data comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Base URL of the remote counting service (if any).
    #[serde(default)]
    pub url: Option<String>,

    /// Directory of uploaded JSON datasets.
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,

    /// Upper bound for every fetch (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("datasets")
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            url: None,
            dataset_dir: default_dataset_dir(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Presentation Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationSettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    tally_core::DEFAULT_PAGE_SIZE
}

impl Default for PresentationSettings {
    fn default() -> Self {
        PresentationSettings {
            page_size: default_page_size(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete session configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub operator: OperatorConfig,

    #[serde(default)]
    pub service: ServiceSettings,

    #[serde(default)]
    pub presentation: PresentationSettings,
}

impl TallyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tally.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading tally config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load tally config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Tally config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if let Some(ref raw) = self.service.url {
            let parsed = url::Url::parse(raw)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SyncError::InvalidUrl(format!(
                    "Service URL must start with http:// or https://, got: {}",
                    raw
                )));
            }
        }

        if self.service.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.presentation.page_size == 0 {
            return Err(SyncError::InvalidConfig(
                "page_size must be greater than 0".into(),
            ));
        }

        if self.operator.registered_by.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "registered_by must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("TALLY_STORE_ID") {
            debug!(store_id = %id, "Overriding store ID from environment");
            self.store.id = Some(id);
        }

        if let Ok(name) = std::env::var("TALLY_REGISTERED_BY") {
            self.operator.registered_by = name;
        }

        if let Ok(dir) = std::env::var("TALLY_DATASET_DIR") {
            debug!(dataset_dir = %dir, "Overriding dataset directory from environment");
            self.service.dataset_dir = PathBuf::from(dir);
        }

        if let Ok(url) = std::env::var("TALLY_SERVICE_URL") {
            debug!(url = %url, "Overriding service URL from environment");
            self.service.url = Some(url);
        }

        if let Ok(secs) = std::env::var("TALLY_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.service.request_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring non-numeric TALLY_REQUEST_TIMEOUT_SECS"),
            }
        }

        if let Ok(size) = std::env::var("TALLY_PAGE_SIZE") {
            match size.parse::<usize>() {
                Ok(s) => self.presentation.page_size = s,
                Err(_) => warn!(value = %size, "Ignoring non-numeric TALLY_PAGE_SIZE"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "tally")
            .map(|dirs| dirs.config_dir().join("tally.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.request_timeout_secs)
    }

    pub fn store_id(&self) -> Option<&str> {
        self.store.id.as_deref()
    }

    pub fn registered_by(&self) -> &str {
        &self.operator.registered_by
    }

    pub fn service_url(&self) -> Option<&str> {
        self.service.url.as_deref()
    }

    pub fn page_size(&self) -> usize {
        self.presentation.page_size
    }
}
