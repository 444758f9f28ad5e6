//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Telegram channel settings. Present only when a bot token is set.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub allowed_users: Vec<String>,
}

/// Bot configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// JSON catalog/address seed imported at startup.
    pub seed_file: Option<PathBuf>,
    /// JSON override for the matcher weights.
    pub weights_file: Option<PathBuf>,
    /// Sessions idle this long are evicted.
    pub session_idle_timeout: Duration,
    pub sweep_interval: Duration,
    /// Outbound messages longer than this are split.
    pub max_message_len: usize,
    pub part_delay: Duration,
    pub telegram: Option<TelegramConfig>,
    /// Whether to read messages from stdin.
    pub cli_enabled: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/order-desk.db"),
            seed_file: None,
            weights_file: None,
            session_idle_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(15 * 60),
            max_message_len: 4000,
            part_delay: Duration::from_millis(100),
            telegram: None,
            cli_enabled: true,
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset and blank values take the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let db_path = get("ORDER_DESK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let seed_file = get("ORDER_DESK_SEED_FILE").map(PathBuf::from);
        let weights_file = get("ORDER_DESK_WEIGHTS_FILE").map(PathBuf::from);

        let idle_min: u64 = parse_number(&get, "ORDER_DESK_SESSION_IDLE_MIN", 30)?;
        let session_idle_timeout = minutes("ORDER_DESK_SESSION_IDLE_MIN", idle_min)?;
        let sweep_min: u64 = parse_number(&get, "ORDER_DESK_SWEEP_INTERVAL_MIN", 15)?;
        if sweep_min == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ORDER_DESK_SWEEP_INTERVAL_MIN".into(),
                message: "must be at least 1".into(),
            });
        }
        let sweep_interval = minutes("ORDER_DESK_SWEEP_INTERVAL_MIN", sweep_min)?;
        let max_message_len: usize = parse_number(&get, "ORDER_DESK_MAX_MESSAGE_LEN", 4000)?;
        if max_message_len == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ORDER_DESK_MAX_MESSAGE_LEN".into(),
                message: "must be at least 1".into(),
            });
        }
        let part_delay_ms: u64 = parse_number(&get, "ORDER_DESK_PART_DELAY_MS", 100)?;

        let telegram = get("TELEGRAM_BOT_TOKEN").map(|token| TelegramConfig {
            bot_token: SecretString::from(token),
            allowed_users: get("TELEGRAM_ALLOWED_USERS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        });

        let cli_enabled = match get("ORDER_DESK_CLI") {
            None => defaults.cli_enabled,
            Some(v) => parse_flag("ORDER_DESK_CLI", &v)?,
        };

        Ok(Self {
            db_path,
            seed_file,
            weights_file,
            session_idle_timeout,
            sweep_interval,
            max_message_len,
            part_delay: Duration::from_millis(part_delay_ms),
            telegram,
            cli_enabled,
        })
    }
}

fn minutes(key: &str, value: u64) -> Result<Duration, ConfigError> {
    value
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{value} minutes is out of range"),
        })
}

fn parse_number<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
