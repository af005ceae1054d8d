//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine tuning.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// What `reverse` does when the entry was already reversed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalPolicy {
    /// Hand back the reversal that already exists.
    #[default]
    ReturnExisting,
    /// Fail with an already-reversed error.
    Reject,
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// How long a posting or reversal waits for account row locks.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Behaviour of a second reversal of the same entry.
    #[serde(default)]
    pub reversal_policy: ReversalPolicy,
    /// Attempts at resolving a find-or-create race on accounts.
    #[serde(default = "default_account_create_retries")]
    pub account_create_retries: u32,
    /// Size of the recent-entries slice in balance summaries.
    #[serde(default = "default_recent_entries_limit")]
    pub recent_entries_limit: u64,
    /// Audit notes attached to each pending-balance row.
    #[serde(default = "default_pending_notes_limit")]
    pub pending_notes_limit: usize,
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_account_create_retries() -> u32 {
    3
}

fn default_recent_entries_limit() -> u64 {
    10
}

fn default_pending_notes_limit() -> usize {
    5
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            reversal_policy: ReversalPolicy::default(),
            account_create_retries: default_account_create_retries(),
            recent_entries_limit: default_recent_entries_limit(),
            pending_notes_limit: default_pending_notes_limit(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default.toml`,
    /// `config/{RUN_MODE}.toml`, then `SAFAR__SECTION__KEY` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SAFAR").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
