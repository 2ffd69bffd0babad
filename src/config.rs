//! Configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Public link to the bot, used in share messages.
pub const DEFAULT_BOT_LINK: &str = "https://t.me/MoscowZooQxstay_bot";

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot name for identification in logs.
    pub name: String,
    /// Telegram Bot API token. Telegram is disabled when absent.
    pub telegram_token: Option<SecretString>,
    /// Telegram usernames or numeric ids allowed to talk to the bot (`*` = everyone).
    pub allowed_users: Vec<String>,
    /// Whether to run the stdin/stdout channel.
    pub cli_enabled: bool,
    /// Quiz definition file. The built-in quiz is used when absent.
    pub quiz_path: Option<PathBuf>,
    /// Append-only feedback log.
    pub feedback_path: PathBuf,
    /// Link shared alongside quiz results.
    pub bot_link: String,
    /// Directory for `bot.log`.
    pub log_dir: PathBuf,
    /// Quiz sessions idle for this long are dropped.
    pub session_idle_timeout: Duration,
    /// How often idle sessions are swept.
    pub session_sweep_interval: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "totem-bot".to_string(),
            telegram_token: None,
            allowed_users: vec!["*".to_string()],
            cli_enabled: false,
            quiz_path: None,
            feedback_path: PathBuf::from("feedback.txt"),
            bot_link: DEFAULT_BOT_LINK.to_string(),
            log_dir: PathBuf::from("."),
            session_idle_timeout: Duration::from_secs(3600), // 1 hour
            session_sweep_interval: Duration::from_secs(600), // 10 minutes
        }
    }
}

impl BotConfig {
    /// Load a `.env` file into the process environment (the working
    /// directory's when `path` is `None`). Variables already set are kept.
    /// Returns the file that was read, if any.
    pub fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(path) => dotenv::from_path(path).ok().map(|()| path.to_path_buf()),
            None => dotenv::dotenv().ok(),
        }
    }

    /// Build configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_token = get("TELEGRAM_BOT_TOKEN").map(SecretString::from);

        let allowed_users = get("TELEGRAM_ALLOWED_USERS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_users);

        let cli_enabled = match get("TOTEM_CLI") {
            Some(raw) => parse_bool("TOTEM_CLI", &raw)?,
            None => telegram_token.is_none(),
        };

        let session_idle_timeout = match get("TOTEM_SESSION_IDLE_SECS") {
            Some(raw) => Duration::from_secs(parse_secs("TOTEM_SESSION_IDLE_SECS", &raw)?),
            None => defaults.session_idle_timeout,
        };

        Ok(Self {
            name: defaults.name,
            telegram_token,
            allowed_users,
            cli_enabled,
            quiz_path: get("TOTEM_QUIZ_PATH").map(PathBuf::from),
            feedback_path: get("TOTEM_FEEDBACK_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.feedback_path),
            bot_link: get("TOTEM_BOT_LINK").unwrap_or(defaults.bot_link),
            log_dir: get("TOTEM_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            session_idle_timeout,
            session_sweep_interval: defaults.session_sweep_interval,
        })
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(secs),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
