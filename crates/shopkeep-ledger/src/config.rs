//! # Ledger Configuration
//!
//! Configuration management for the ledger engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SHOPKEEP_DB_PATH=./shopkeep.db                                     │
//! │     SHOPKEEP_STOCK_POLICY=reject                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/shopkeep/shopkeep.toml (Linux)                           │
//! │     ~/Library/Application Support/com.shopkeep.shopkeep/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     UTC business day, allow backorder, 5 commit attempts               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # shopkeep.toml
//! [store]
//! database_path = "/var/lib/shopkeep/shopkeep.db"
//! max_connections = 5
//!
//! [business]
//! name = "Corner Shop"
//! utc_offset_minutes = 300   # UTC+05:00
//! receipt_prefix = "R"
//!
//! [inventory]
//! stock_policy = "allow_backorder"  # allow_backorder | reject
//! low_stock_threshold = 5
//!
//! [engine]
//! max_commit_attempts = 5
//! initial_backoff_ms = 10
//! max_backoff_ms = 500
//!
//! [reports]
//! bills_horizon_days = 7
//! ```

use serde::{Deserialize, Serialize};
use shopkeep_core::receipt::{BusinessClock, RECEIPT_PREFIX};
use shopkeep_core::DEFAULT_LOW_STOCK_THRESHOLD;
use shopkeep_store::DbConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};

/// Config file name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "shopkeep.toml";

// =============================================================================
// Stock Policy
// =============================================================================

/// What a sale does when it asks for more units than are on hand.
///
/// ```text
/// stock 2, sale of 5
///   ALLOW_BACKORDER (default) → stock -3, sale recorded
///   REJECT                    → InsufficientStock, nothing written
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Stock may go negative; the shelf count is corrected later.
    #[default]
    AllowBackorder,

    /// Refuse sales that would take stock below zero.
    Reject,
}

impl std::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockPolicy::AllowBackorder => write!(f, "allow_backorder"),
            StockPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for StockPolicy {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow_backorder" | "allow" | "backorder" => Ok(StockPolicy::AllowBackorder),
            "reject" | "strict" => Ok(StockPolicy::Reject),
            other => Err(LedgerError::InvalidConfig(format!(
                "Unknown stock policy: '{}'. Valid options: allow_backorder, reject",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Where the Record Store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "shopkeep", "shopkeep")
        .map(|dirs| dirs.data_dir().join("shopkeep.db"))
        .unwrap_or_else(|| PathBuf::from("shopkeep.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            database_path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// The shop itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessSettings {
    #[serde(default = "default_business_name")]
    pub name: String,

    /// Offset of the shop's wall clock from UTC. Receipt days and report
    /// buckets start at local midnight.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    #[serde(default = "default_receipt_prefix")]
    pub receipt_prefix: String,
}

fn default_business_name() -> String {
    "My Shop".to_string()
}

fn default_receipt_prefix() -> String {
    RECEIPT_PREFIX.to_string()
}

impl Default for BusinessSettings {
    fn default() -> Self {
        BusinessSettings {
            name: default_business_name(),
            utc_offset_minutes: 0,
            receipt_prefix: default_receipt_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySettings {
    #[serde(default)]
    pub stock_policy: StockPolicy,

    /// Used for products without their own threshold.
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
}

fn default_low_stock_threshold() -> i64 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

impl Default for InventorySettings {
    fn default() -> Self {
        InventorySettings {
            stock_policy: StockPolicy::default(),
            low_stock_threshold: default_low_stock_threshold(),
        }
    }
}

/// Commit retry behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Attempts per operation before `ConcurrentModification`.
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_commit_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    10
}
fn default_max_backoff() -> u64 {
    500
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            max_commit_attempts: default_max_commit_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl EngineSettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// How far ahead "due soon" bills reach.
    #[serde(default = "default_bills_horizon")]
    pub bills_horizon_days: u64,
}

fn default_bills_horizon() -> u64 {
    7
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            bills_horizon_days: default_bills_horizon(),
        }
    }
}

// =============================================================================
// Main Ledger Configuration
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub business: BusinessSettings,

    #[serde(default)]
    pub inventory: InventorySettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub reports: ReportSettings,
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (shopkeep.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
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
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> LedgerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LedgerError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| LedgerError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LedgerResult<()> {
        self.clock()?;

        let prefix = &self.business.receipt_prefix;
        if prefix.is_empty() || prefix.len() > 8 || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LedgerError::InvalidConfig(format!(
                "receipt_prefix must be 1-8 ASCII letters or digits, got: '{}'",
                prefix
            )));
        }

        if self.store.max_connections == 0 {
            return Err(LedgerError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.engine.max_commit_attempts == 0 {
            return Err(LedgerError::InvalidConfig(
                "max_commit_attempts must be greater than 0".into(),
            ));
        }

        if self.engine.initial_backoff_ms > self.engine.max_backoff_ms {
            return Err(LedgerError::InvalidConfig(
                "initial_backoff_ms must not exceed max_backoff_ms".into(),
            ));
        }

        if self.inventory.low_stock_threshold < 0 {
            return Err(LedgerError::InvalidConfig(
                "low_stock_threshold must not be negative".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SHOPKEEP_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.store.database_path = PathBuf::from(path);
        }

        if let Some(offset) = lookup("SHOPKEEP_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(minutes) => self.business.utc_offset_minutes = minutes,
                Err(_) => warn!(offset = %offset, "Ignoring non-numeric UTC offset in environment"),
            }
        }

        if let Some(policy) = lookup("SHOPKEEP_STOCK_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding stock policy from environment");
                    self.inventory.stock_policy = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown stock policy in environment"),
            }
        }

        if let Some(attempts) = lookup("SHOPKEEP_MAX_COMMIT_ATTEMPTS") {
            if let Ok(n) = attempts.parse::<u32>() {
                self.engine.max_commit_attempts = n;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "shopkeep", "shopkeep")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Business clock for receipt days and report buckets.
    pub fn clock(&self) -> LedgerResult<BusinessClock> {
        Ok(BusinessClock::from_offset_minutes(self.business.utc_offset_minutes)?)
    }

    /// Record Store connection settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.store.database_path.clone()).max_connections(self.store.max_connections)
    }

    pub fn stock_policy(&self) -> StockPolicy {
        self.inventory.stock_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_stock_policy_parsing() {
        assert_eq!("allow_backorder".parse::<StockPolicy>().unwrap(), StockPolicy::AllowBackorder);
        assert_eq!("REJECT".parse::<StockPolicy>().unwrap(), StockPolicy::Reject);
        assert!("sometimes".parse::<StockPolicy>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.stock_policy(), StockPolicy::AllowBackorder);
        assert_eq!(config.engine.max_commit_attempts, 5);
        assert_eq!(config.business.receipt_prefix, "R");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LedgerConfig::default();

        config.business.utc_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());
        config.business.utc_offset_minutes = -300;
        assert!(config.validate().is_ok());

        config.business.receipt_prefix = "R-".to_string();
        assert!(config.validate().is_err());
        config.business.receipt_prefix = "INV".to_string();
        assert!(config.validate().is_ok());

        config.engine.max_commit_attempts = 0;
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SHOPKEEP_DB_PATH", "/tmp/shop.db"),
            ("SHOPKEEP_UTC_OFFSET_MINUTES", "330"),
            ("SHOPKEEP_STOCK_POLICY", "reject"),
            ("SHOPKEEP_MAX_COMMIT_ATTEMPTS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = LedgerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.store.database_path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.business.utc_offset_minutes, 330);
        assert_eq!(config.stock_policy(), StockPolicy::Reject);
        assert_eq!(config.engine.max_commit_attempts, 5);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = r#"
            [business]
            name = "Corner Shop"
            utc_offset_minutes = 300

            [inventory]
            stock_policy = "reject"
        "#;

        let config: LedgerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.business.name, "Corner Shop");
        assert_eq!(config.stock_policy(), StockPolicy::Reject);
        assert_eq!(config.engine.max_commit_attempts, 5);
        assert_eq!(config.reports.bills_horizon_days, 7);

        let round_trip: LedgerConfig = toml::from_str(&toml::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(round_trip.business.utc_offset_minutes, 300);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("shopkeep-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join(CONFIG_FILE_NAME);

        let mut config = LedgerConfig::default();
        config.business.name = "Saved Shop".to_string();
        config.save(Some(path.clone())).unwrap();

        let loaded = LedgerConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.business.name, "Saved Shop");

        std::fs::remove_dir_all(dir).unwrap();
    }
}
