//! Environment-driven configuration for the monitor binary.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::model::{Address, AddressFormatError, Selector, SelectorFormatError};

pub const DEFAULT_SEQUENCER_ADDRESS: &str = "0x238b4E35dAed6100C6162fAE4510261f88996EC9";
pub const DEFAULT_WORK_SIGNATURE: &str = "work(bytes32,bytes)";
pub const DEFAULT_LOOKBACK_BLOCKS: u64 = 5_000;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 12;
pub const DEFAULT_FETCH_CONCURRENCY: u64 = 1;
pub const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Key configuration derived from `.env`/process variables. Everything the
/// scan engine and its collaborators need is resolved here, before any of
/// them is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    rpc_url: String,
    sequencer_address: Address,
    work_signature: String,
    work_selector: Selector,
    lookback_blocks: u64,
    poll_interval: Duration,
    fetch_concurrency: usize,
    cycle_timeout: Duration,
    rpc_timeout: Duration,
    discord_webhook_url: Option<String>,
    slack_webhook_url: Option<String>,
}

impl BootstrapConfig {
    /// Loads configuration by hydrating `.env` (if present) and reading the
    /// process variables. Missing or malformed entries surface as
    /// `ConfigError`.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let rpc_url = get_required_var("RPC_URL")?;

        let sequencer_raw = get_optional_var("SEQUENCER_ADDRESS")
            .unwrap_or_else(|| DEFAULT_SEQUENCER_ADDRESS.to_string());
        let sequencer_address =
            Address::parse(&sequencer_raw).map_err(|source| ConfigError::InvalidAddress {
                key: "SEQUENCER_ADDRESS",
                source,
            })?;

        let work_signature = get_optional_var("WORK_SIGNATURE")
            .unwrap_or_else(|| DEFAULT_WORK_SIGNATURE.to_string());
        // A literal selector wins over the signature it would be derived from.
        let work_selector = match get_optional_var("WORK_SELECTOR") {
            Some(raw) => Selector::from_hex(&raw).map_err(|source| {
                ConfigError::InvalidSelector {
                    key: "WORK_SELECTOR",
                    source,
                }
            })?,
            None => Selector::from_signature(&work_signature).map_err(|source| {
                ConfigError::InvalidSelector {
                    key: "WORK_SIGNATURE",
                    source,
                }
            })?,
        };

        let lookback_blocks = get_number_var("MONITOR_LOOKBACK_BLOCKS", DEFAULT_LOOKBACK_BLOCKS)?;
        let poll_interval_secs =
            get_positive_var("MONITOR_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let fetch_concurrency =
            get_positive_var("MONITOR_FETCH_CONCURRENCY", DEFAULT_FETCH_CONCURRENCY)?;
        let cycle_timeout_secs =
            get_positive_var("MONITOR_CYCLE_TIMEOUT_SECS", DEFAULT_CYCLE_TIMEOUT_SECS)?;
        let rpc_timeout_secs = get_positive_var("RPC_TIMEOUT_SECS", DEFAULT_RPC_TIMEOUT_SECS)?;

        Ok(Self {
            rpc_url,
            sequencer_address,
            work_signature,
            work_selector,
            lookback_blocks,
            poll_interval: Duration::from_secs(poll_interval_secs),
            fetch_concurrency: usize::try_from(fetch_concurrency).unwrap_or(usize::MAX),
            cycle_timeout: Duration::from_secs(cycle_timeout_secs),
            rpc_timeout: Duration::from_secs(rpc_timeout_secs),
            discord_webhook_url: get_optional_var("DISCORD_WEBHOOK_URL"),
            slack_webhook_url: get_optional_var("SLACK_WEBHOOK_URL"),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn sequencer_address(&self) -> &Address {
        &self.sequencer_address
    }

    pub fn work_signature(&self) -> &str {
        &self.work_signature
    }

    pub fn work_selector(&self) -> Selector {
        self.work_selector
    }

    pub fn lookback_blocks(&self) -> u64 {
        self.lookback_blocks
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency
    }

    pub fn cycle_timeout(&self) -> Duration {
        self.cycle_timeout
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    pub fn discord_webhook_url(&self) -> Option<&str> {
        self.discord_webhook_url.as_deref()
    }

    pub fn slack_webhook_url(&self) -> Option<&str> {
        self.slack_webhook_url.as_deref()
    }
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    get_optional_var(key).ok_or(ConfigError::MissingVar { key })
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_number_var(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match get_optional_var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { key, source }),
        None => Ok(default),
    }
}

fn get_positive_var(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match get_number_var(key, default)? {
        0 => Err(ConfigError::NotPositive { key }),
        value => Ok(value),
    }
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("JOB_WATCH_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("`{key}` must be greater than zero")]
    NotPositive { key: &'static str },
    #[error("invalid address in `{key}`: {source}")]
    InvalidAddress {
        key: &'static str,
        #[source]
        source: AddressFormatError,
    },
    #[error("invalid function signature in `{key}`: {source}")]
    InvalidSelector {
        key: &'static str,
        #[source]
        source: SelectorFormatError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    const OPTIONAL_KEYS: &[&str] = &[
        "SEQUENCER_ADDRESS",
        "WORK_SIGNATURE",
        "WORK_SELECTOR",
        "MONITOR_LOOKBACK_BLOCKS",
        "MONITOR_POLL_INTERVAL_SECS",
        "MONITOR_FETCH_CONCURRENCY",
        "MONITOR_CYCLE_TIMEOUT_SECS",
        "RPC_TIMEOUT_SECS",
        "DISCORD_WEBHOOK_URL",
        "SLACK_WEBHOOK_URL",
    ];

    fn set_env() {
        std::env::set_var("JOB_WATCH_SKIP_DOTENV", "1");
        std::env::set_var("RPC_URL", "http://localhost:8545");
        for key in OPTIONAL_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();

        let config = BootstrapConfig::load_from_env().expect("config loads");
        assert_eq!(config.rpc_url(), "http://localhost:8545");
        assert_eq!(
            config.sequencer_address().as_str(),
            "0x238b4e35daed6100c6162fae4510261f88996ec9"
        );
        assert_eq!(config.work_signature(), DEFAULT_WORK_SIGNATURE);
        assert_eq!(config.work_selector().to_string(), "0x1d2ab000");
        assert_eq!(config.lookback_blocks(), 5_000);
        assert_eq!(config.poll_interval(), Duration::from_secs(12));
        assert_eq!(config.fetch_concurrency(), 1);
        assert_eq!(config.cycle_timeout(), Duration::from_secs(120));
        assert_eq!(config.rpc_timeout(), Duration::from_secs(30));
        assert_eq!(config.discord_webhook_url(), None);
        assert_eq!(config.slack_webhook_url(), None);
    }

    #[test]
    fn overrides_are_read_and_trimmed() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("RPC_URL", "  https://rpc.example  ");
        std::env::set_var("MONITOR_LOOKBACK_BLOCKS", "10");
        std::env::set_var("MONITOR_POLL_INTERVAL_SECS", "3");
        std::env::set_var("MONITOR_FETCH_CONCURRENCY", "8");
        std::env::set_var("DISCORD_WEBHOOK_URL", "https://discord.example/hook");
        std::env::set_var("SLACK_WEBHOOK_URL", "   ");

        let config = BootstrapConfig::load_from_env().expect("config loads");
        assert_eq!(config.rpc_url(), "https://rpc.example");
        assert_eq!(config.lookback_blocks(), 10);
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.fetch_concurrency(), 8);
        assert_eq!(
            config.discord_webhook_url(),
            Some("https://discord.example/hook")
        );
        assert_eq!(config.slack_webhook_url(), None);

        set_env();
    }

    #[test]
    fn literal_selector_overrides_signature() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("WORK_SELECTOR", " 0x6191C782 ");

        let config = BootstrapConfig::load_from_env().expect("config loads");
        assert_eq!(config.work_selector().to_string(), "0x6191c782");
        assert_eq!(config.work_signature(), DEFAULT_WORK_SIGNATURE);

        std::env::set_var("WORK_SELECTOR", "0x6191");
        let err = BootstrapConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSelector {
                key: "WORK_SELECTOR",
                source: SelectorFormatError::WrongLength,
            }
        ));

        set_env();
    }

    #[test]
    fn missing_rpc_url_is_reported() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("RPC_URL", "   ");

        let err = BootstrapConfig::load_from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar { key: "RPC_URL" }));

        set_env();
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("MONITOR_POLL_INTERVAL_SECS", "0");

        let err = BootstrapConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotPositive {
                key: "MONITOR_POLL_INTERVAL_SECS"
            }
        ));

        set_env();
    }

    #[test]
    fn malformed_values_are_rejected() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("MONITOR_LOOKBACK_BLOCKS", "many");
        let err = BootstrapConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "MONITOR_LOOKBACK_BLOCKS",
                ..
            }
        ));

        set_env();
        std::env::set_var("SEQUENCER_ADDRESS", "0x1234");
        let err = BootstrapConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidAddress {
                key: "SEQUENCER_ADDRESS",
                source: AddressFormatError::WrongLength,
            }
        ));

        set_env();
    }
}
