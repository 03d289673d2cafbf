//! # Terminal Configuration
//!
//! Everything a register terminal needs before it can take a sale: where
//! the database lives, which register it is, and how chatty the logs are.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     PHARMAPOS_DB_PATH=/var/lib/pharmapos/pos.db                         │
//! │     PHARMAPOS_REGISTER_NUMBER=2                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/pharmapos/pos.toml (Linux)                                │
//! │     ~/Library/Application Support/com.pharmapos.pos/pos.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     register 1, opening fund 1000.00, unknown tender as cash            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # pos.toml
//! [database]
//! path = "/var/lib/pharmapos/pos.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [register]
//! register_number = 1
//! opening_fund_cents = 50000
//! unknown_payment = "treat_as_cash"  # treat_as_cash | reject
//!
//! [logging]
//! filter = "info,pharmapos_db=debug,sqlx=warn"
//! ```

use pharmapos_core::register::{RegisterSettings, UnknownPaymentPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// Where and how to open the SQLite database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for the write lock (milliseconds).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Pool acquire timeout (seconds).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "pharmapos", "pos")
        .map(|dirs| dirs.data_dir().join("pharmapos.db"))
        .unwrap_or_else(|| PathBuf::from("./pharmapos.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive string. `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info,pharmapos_db=debug,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete terminal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    /// Register number, opening fund and tender policy for lazily opened
    /// cash sessions.
    #[serde(default)]
    pub register: RegisterSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (pos.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<&Path>) -> DbResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading config from file");
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

    /// Parses a config from TOML text, without environment overrides.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::Config("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.register.register_number < 1 {
            return Err(DbError::Config(format!(
                "register.register_number must be positive, got {}",
                self.register.register_number
            )));
        }

        if self.register.opening_fund_cents < 0 {
            return Err(DbError::Config(format!(
                "register.opening_fund_cents must not be negative, got {}",
                self.register.opening_fund_cents
            )));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("PHARMAPOS_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(number) = lookup("PHARMAPOS_REGISTER_NUMBER") {
            match number.parse::<i64>() {
                Ok(n) => self.register.register_number = n,
                Err(_) => warn!(value = %number, "Ignoring non-numeric register number"),
            }
        }

        if let Some(fund) = lookup("PHARMAPOS_OPENING_FUND_CENTS") {
            match fund.parse::<i64>() {
                Ok(cents) => self.register.opening_fund_cents = cents,
                Err(_) => warn!(value = %fund, "Ignoring non-numeric opening fund"),
            }
        }

        if let Some(policy) = lookup("PHARMAPOS_UNKNOWN_PAYMENT") {
            match policy.parse::<UnknownPaymentPolicy>() {
                Ok(parsed) => self.register.unknown_payment = parsed,
                Err(_) => warn!(value = %policy, "Unknown payment policy in environment"),
            }
        }

        if let Some(filter) = lookup("PHARMAPOS_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "pharmapos", "pos")
            .map(|dirs| dirs.config_dir().join("pos.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pool configuration derived from `[database]`.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }

    pub fn register_settings(&self) -> RegisterSettings {
        self.register
    }

    /// Installs the global tracing subscriber.
    ///
    /// `RUST_LOG` takes precedence over `[logging].filter`. Calling this twice
    /// is harmless; the second call is ignored.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.filter));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PosConfig::default();
        assert_eq!(config.register.register_number, 1);
        assert_eq!(config.register.opening_fund_cents, 100_000);
        assert_eq!(config.register.unknown_payment, UnknownPaymentPolicy::TreatAsCash);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PosConfig::from_toml(
            r#"
            [database]
            path = "/tmp/pos.db"

            [register]
            register_number = 3
            unknown_payment = "reject"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/pos.db"));
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.register.register_number, 3);
        assert_eq!(config.register.opening_fund_cents, 100_000);
        assert_eq!(config.register.unknown_payment, UnknownPaymentPolicy::Reject);
        assert_eq!(config.logging.filter, default_log_filter());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PosConfig::default();
        config.register.register_number = 0;
        assert!(matches!(config.validate(), Err(DbError::Config(_))));

        let mut config = PosConfig::default();
        config.register.opening_fund_cents = -1;
        assert!(config.validate().is_err());

        let mut config = PosConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = PosConfig::from_toml("[register\nregister_number = ").unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PHARMAPOS_DB_PATH", "/data/pos.db"),
            ("PHARMAPOS_REGISTER_NUMBER", "4"),
            ("PHARMAPOS_OPENING_FUND_CENTS", "not-a-number"),
            ("PHARMAPOS_UNKNOWN_PAYMENT", "reject"),
            ("PHARMAPOS_LOG", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = PosConfig::default();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/pos.db"));
        assert_eq!(config.register.register_number, 4);
        // Unparseable values are ignored.
        assert_eq!(config.register.opening_fund_cents, 100_000);
        assert_eq!(config.register.unknown_payment, UnknownPaymentPolicy::Reject);
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn test_db_config_mapping() {
        let mut config = PosConfig::default();
        config.database.path = PathBuf::from("/tmp/x.db");
        config.database.busy_timeout_ms = 250;

        let db = config.db_config();
        assert_eq!(db.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(db.busy_timeout, Duration::from_millis(250));
        assert_eq!(db.max_connections, 5);
    }

    #[test]
    fn test_toml_serialization() {
        let config = PosConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[register]"));
        assert!(text.contains("register_number = 1"));
    }
}
