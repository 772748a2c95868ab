use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

/// Tunables of the booking engine itself.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Largest price/payment difference still treated as rounding noise.
    pub mismatch_epsilon: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mismatch_epsilon: 0.01,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Period of the background seat-sync + payment-cleanup pass; 0 disables it.
    pub interval_secs: u64,
    pub run_on_start: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = var_or(name, default);
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StorageBackend::Postgres),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            _ => Err(()),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend: StorageBackend = parse_var("STORAGE_BACKEND", "postgres")?;

        let database_url = env::var("DATABASE_URL").unwrap_or_default();
        if backend == StorageBackend::Postgres && database_url.is_empty() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let mismatch_epsilon: f64 = parse_var("LEDGER_MISMATCH_EPSILON", "0.01")?;
        if !mismatch_epsilon.is_finite() || mismatch_epsilon < 0.0 {
            return Err(ConfigError::Invalid {
                name: "LEDGER_MISMATCH_EPSILON",
                value: mismatch_epsilon.to_string(),
            });
        }

        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parse_var("PORT", "8000")?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "seat_ledger=debug,tower_http=debug"),
                log_format: parse_var("LOG_FORMAT", "pretty")?,
            },
            database: DatabaseConfig {
                url: database_url,
                pool_size: parse_var("DB_POOL_SIZE", "20")?,
                acquire_timeout_secs: parse_var("DB_ACQUIRE_TIMEOUT_SECS", "5")?,
            },
            storage: StorageConfig { backend },
            ledger: LedgerConfig { mismatch_epsilon },
            reconciliation: ReconciliationConfig {
                interval_secs: parse_var("RECONCILE_INTERVAL_SECS", "0")?,
                run_on_start: parse_var("RECONCILE_ON_START", "false")?,
            },
        })
    }

    /// Defaults with the in-memory backend; nothing is read from the environment.
    pub fn in_memory() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                environment: "test".to_string(),
                rust_log: "seat_ledger=debug".to_string(),
                log_format: LogFormat::Pretty,
            },
            database: DatabaseConfig {
                url: String::new(),
                pool_size: 1,
                acquire_timeout_secs: 5,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
            },
            ledger: LedgerConfig::default(),
            reconciliation: ReconciliationConfig {
                interval_secs: 0,
                run_on_start: false,
            },
        }
    }
}
