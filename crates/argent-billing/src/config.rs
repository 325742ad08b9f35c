//! # Billing Configuration
//!
//! Configuration management for the billing engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ARGENT_DB_PATH=/srv/argent/argent.db                               │
//! │     ARGENT_REGULAR_BALANCE=cached-field                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/argent/billing.toml (Linux)                              │
//! │     ~/Library/Application Support/com.argent.billing/billing.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     REG / empty prefixes, wholesale cached-field, regular derived-sum  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # billing.toml
//! [database]
//! path = "/srv/argent/argent.db"
//! max_connections = 5
//! busy_timeout_ms = 10000
//!
//! [vouchers]
//! regular_prefix = "REG"
//! wholesale_prefix = ""
//!
//! [tax]
//! cgst_bps = 150   # 1.50 %
//! sgst_bps = 150
//!
//! [balance]
//! regular = "derived-sum"
//! wholesale = "cached-field"
//! ```

use argent_core::validation::validate_tax_rate;
use argent_core::{BalanceStrategy, Channel, TaxConfig, TaxRate};
use argent_db::DbConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

/// Longest voucher prefix accepted.
pub const MAX_PREFIX_LEN: usize = 8;

// =============================================================================
// Database Settings
// =============================================================================

/// Where the ledger lives and how writers queue for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a unit of work waits for the write lock (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    10_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Voucher Settings
// =============================================================================

/// Voucher prefixes per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherSettings {
    #[serde(default = "default_regular_prefix")]
    pub regular_prefix: String,

    #[serde(default)]
    pub wholesale_prefix: String,
}

fn default_regular_prefix() -> String {
    argent_core::REGULAR_VOUCHER_PREFIX.to_string()
}

impl Default for VoucherSettings {
    fn default() -> Self {
        VoucherSettings {
            regular_prefix: default_regular_prefix(),
            wholesale_prefix: argent_core::WHOLESALE_VOUCHER_PREFIX.to_string(),
        }
    }
}

impl VoucherSettings {
    pub fn prefix_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Regular => &self.regular_prefix,
            Channel::Wholesale => &self.wholesale_prefix,
        }
    }
}

// =============================================================================
// Tax Settings
// =============================================================================

/// Rates applied when a sale asks for tax without naming rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSettings {
    #[serde(default = "default_gst_bps")]
    pub cgst_bps: u32,

    #[serde(default = "default_gst_bps")]
    pub sgst_bps: u32,
}

fn default_gst_bps() -> u32 {
    150
}

impl Default for TaxSettings {
    fn default() -> Self {
        TaxSettings {
            cgst_bps: default_gst_bps(),
            sgst_bps: default_gst_bps(),
        }
    }
}

impl TaxSettings {
    /// The configured rates as an applicable tax config.
    pub fn gst(&self) -> TaxConfig {
        TaxConfig::gst(TaxRate::from_bps(self.cgst_bps), TaxRate::from_bps(self.sgst_bps))
    }
}

// =============================================================================
// Balance Settings
// =============================================================================

/// Balance strategy per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSettings {
    #[serde(default = "default_regular_strategy")]
    pub regular: BalanceStrategy,

    #[serde(default = "default_wholesale_strategy")]
    pub wholesale: BalanceStrategy,
}

fn default_regular_strategy() -> BalanceStrategy {
    BalanceStrategy::DerivedSum
}

fn default_wholesale_strategy() -> BalanceStrategy {
    BalanceStrategy::CachedField
}

impl Default for BalanceSettings {
    fn default() -> Self {
        BalanceSettings {
            regular: default_regular_strategy(),
            wholesale: default_wholesale_strategy(),
        }
    }
}

impl BalanceSettings {
    pub fn strategy_for(&self, channel: Channel) -> BalanceStrategy {
        match channel {
            Channel::Regular => self.regular,
            Channel::Wholesale => self.wholesale,
        }
    }
}

// =============================================================================
// Main Billing Configuration
// =============================================================================

/// Complete billing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub vouchers: VoucherSettings,

    #[serde(default)]
    pub tax: TaxSettings,

    #[serde(default)]
    pub balance: BalanceSettings,
}

impl BillingConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (billing.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading billing config from file");
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
            warn!("Failed to load billing config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Billing config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.database.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.busy_timeout_ms must be greater than 0".into(),
            ));
        }

        for (name, prefix) in [
            ("regular_prefix", &self.vouchers.regular_prefix),
            ("wholesale_prefix", &self.vouchers.wholesale_prefix),
        ] {
            // Digits would make `{prefix}{YYYYMMDD}` ambiguous
            if prefix.len() > MAX_PREFIX_LEN || !prefix.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ConfigError::Invalid(format!(
                    "vouchers.{} must be at most {} uppercase letters, got '{}'",
                    name, MAX_PREFIX_LEN, prefix
                )));
            }
        }
        if self.vouchers.regular_prefix == self.vouchers.wholesale_prefix {
            return Err(ConfigError::Invalid(
                "regular and wholesale voucher prefixes must differ".into(),
            ));
        }

        validate_tax_rate(TaxRate::from_bps(self.tax.cgst_bps))?;
        validate_tax_rate(TaxRate::from_bps(self.tax.sgst_bps))?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup` (an environment stand-in).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("ARGENT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(max) = lookup("ARGENT_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring non-numeric ARGENT_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(timeout) = lookup("ARGENT_BUSY_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.database.busy_timeout_ms = ms,
                Err(_) => warn!(value = %timeout, "Ignoring non-numeric ARGENT_BUSY_TIMEOUT_MS"),
            }
        }

        if let Some(prefix) = lookup("ARGENT_REGULAR_PREFIX") {
            self.vouchers.regular_prefix = prefix;
        }

        if let Some(prefix) = lookup("ARGENT_WHOLESALE_PREFIX") {
            self.vouchers.wholesale_prefix = prefix;
        }

        for (key, slot) in [
            ("ARGENT_CGST_BPS", &mut self.tax.cgst_bps),
            ("ARGENT_SGST_BPS", &mut self.tax.sgst_bps),
        ] {
            if let Some(value) = lookup(key) {
                match value.parse::<u32>() {
                    Ok(bps) => *slot = bps,
                    Err(_) => warn!(key, value = %value, "Ignoring non-numeric tax rate"),
                }
            }
        }

        for (key, slot) in [
            ("ARGENT_REGULAR_BALANCE", &mut self.balance.regular),
            ("ARGENT_WHOLESALE_BALANCE", &mut self.balance.wholesale),
        ] {
            if let Some(value) = lookup(key) {
                match value.parse::<BalanceStrategy>() {
                    Ok(strategy) => {
                        debug!(key, strategy = strategy.as_str(), "Overriding balance strategy");
                        *slot = strategy;
                    }
                    Err(e) => warn!(key, error = %e, "Ignoring unknown balance strategy"),
                }
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "argent", "billing")
            .map(|dirs| dirs.config_dir().join("billing.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The database file: configured path, else the platform data directory,
    /// else `./argent.db`.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .or_else(|| {
                directories::ProjectDirs::from("com", "argent", "billing")
                    .map(|dirs| dirs.data_dir().join("argent.db"))
            })
            .unwrap_or_else(|| PathBuf::from("argent.db"))
    }

    /// Pool settings for [`argent_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path())
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = BillingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vouchers.prefix_for(Channel::Regular), "REG");
        assert_eq!(config.vouchers.prefix_for(Channel::Wholesale), "");
        assert_eq!(config.balance.strategy_for(Channel::Regular), BalanceStrategy::DerivedSum);
        assert_eq!(config.balance.strategy_for(Channel::Wholesale), BalanceStrategy::CachedField);
        assert_eq!(config.tax.gst().cgst, TaxRate::from_bps(150));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: BillingConfig = toml::from_str(
            r#"
            [balance]
            regular = "cached-field"

            [tax]
            cgst_bps = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.balance.regular, BalanceStrategy::CachedField);
        assert_eq!(config.balance.wholesale, BalanceStrategy::CachedField);
        assert_eq!(config.tax.cgst_bps, 250);
        assert_eq!(config.tax.sgst_bps, 150);
        assert_eq!(config.vouchers.regular_prefix, "REG");
        assert_eq!(config.database.busy_timeout_ms, 10_000);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("ARGENT_DB_PATH", "/tmp/ledger.db"),
            ("ARGENT_REGULAR_PREFIX", "RTL"),
            ("ARGENT_WHOLESALE_BALANCE", "derived-sum"),
            ("ARGENT_DB_MAX_CONNECTIONS", "lots"),
        ]
        .into_iter()
        .collect();

        let mut config = BillingConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path(), PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.vouchers.regular_prefix, "RTL");
        assert_eq!(config.balance.wholesale, BalanceStrategy::DerivedSum);
        // Unparseable values are ignored
        assert_eq!(config.database.max_connections, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = BillingConfig::default();
        config.vouchers.regular_prefix = "R3G".to_string();
        assert!(config.validate().is_err());

        let mut config = BillingConfig::default();
        config.vouchers.wholesale_prefix = "REG".to_string();
        assert!(config.validate().is_err());

        let mut config = BillingConfig::default();
        config.tax.sgst_bps = 10_001;
        assert!(config.validate().is_err());

        let mut config = BillingConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = BillingConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[vouchers]"));
        assert!(toml_str.contains("[balance]"));

        let back: BillingConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.vouchers, config.vouchers);
        assert_eq!(back.balance, config.balance);
    }

    #[test]
    fn test_db_config_carries_settings() {
        let mut config = BillingConfig::default();
        config.database.path = Some(PathBuf::from("/tmp/x.db"));
        config.database.busy_timeout_ms = 2_500;

        let db = config.db_config();
        assert_eq!(db.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(db.busy_timeout, Duration::from_millis(2_500));
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("argent-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("billing.toml");

        let mut config = BillingConfig::default();
        config.database.path = Some(PathBuf::from("/srv/argent/argent.db"));
        config.database.max_connections = 3;
        config.vouchers.regular_prefix = "RS".to_string();
        config.tax.cgst_bps = 250;
        config.balance.regular = BalanceStrategy::CachedField;
        config.save(Some(path.clone())).unwrap();

        let loaded = BillingConfig::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.database.path, config.database.path);
        assert_eq!(loaded.database.max_connections, 3);
        assert_eq!(loaded.vouchers, config.vouchers);
        assert_eq!(loaded.tax, config.tax);
        assert_eq!(loaded.balance, config.balance);

        std::fs::write(&path, "[vouchers\nregular_prefix = ").unwrap();
        assert!(matches!(
            BillingConfig::load(Some(path.clone())),
            Err(ConfigError::LoadFailed(_))
        ));
        let fallback = BillingConfig::load_or_default(Some(path));
        assert_eq!(fallback.vouchers, VoucherSettings::default());

        let _ = std::fs::remove_dir_all(dir);
    }
}
