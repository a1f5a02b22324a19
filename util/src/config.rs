//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.
//!
//! Every key has a default; malformed numeric values fall back to that default
//! rather than aborting start-up.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock, RwLockReadGuard};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    /// JSON file holding grade bands, eligibility and passing rules.
    pub rules_path: String,
    /// Upper bound on records computed concurrently during a batch.
    pub batch_concurrency: usize,
    pub store_retry_attempts: u32,
    pub store_retry_backoff_ms: u64,
    /// `floor`, `half_up` or `none`.
    pub rounding_policy: String,
    pub percentage_precision: u32,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: var_or("APP_ENV", "development"),
            project_name: var_or("PROJECT_NAME", "final-results"),
            log_level: var_or("LOG_LEVEL", "info"),
            log_file: var_or("LOG_FILE", "logs/results.log"),
            log_to_stdout: var_or("LOG_TO_STDOUT", "false") == "true",
            database_path: var_or("DATABASE_PATH", "data/results.db"),
            rules_path: var_or("RULES_PATH", "config/rules.json"),
            batch_concurrency: parsed_or("BATCH_CONCURRENCY", 8usize).max(1),
            store_retry_attempts: parsed_or("STORE_RETRY_ATTEMPTS", 3u32).max(1),
            store_retry_backoff_ms: parsed_or("STORE_RETRY_BACKOFF_MS", 100u64),
            rounding_policy: var_or("ROUNDING_POLICY", "half_up").to_lowercase(),
            percentage_precision: parsed_or("PERCENTAGE_PRECISION", 2u32).min(6),
        }
    }

    /// SQLite connection string for `database_path`, creating the file if missing.
    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.database_path)
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// A poisoned lock is recovered, since the configuration is plain data.
    pub fn global() -> RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value.into());
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_rules_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.rules_path = value.into());
    }

    pub fn set_batch_concurrency(value: usize) {
        AppConfig::set_field(|cfg| cfg.batch_concurrency = value.max(1));
    }

    pub fn set_store_retry_attempts(value: u32) {
        AppConfig::set_field(|cfg| cfg.store_retry_attempts = value.max(1));
    }

    pub fn set_store_retry_backoff_ms(value: u64) {
        AppConfig::set_field(|cfg| cfg.store_retry_backoff_ms = value);
    }

    pub fn set_rounding_policy(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.rounding_policy = value.into().to_lowercase());
    }

    pub fn set_percentage_precision(value: u32) {
        AppConfig::set_field(|cfg| cfg.percentage_precision = value.min(6));
    }
}
