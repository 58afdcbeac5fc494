//! Configuration types, loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::log::memory::DEFAULT_PARTITIONS;
use crate::notify::telegram::DEFAULT_API_BASE;

/// Variables that older deployments set for publish retries. They are
/// recognized only so startup can report that they have no effect.
pub const IGNORED_RETRY_VARS: [&str; 2] = ["RETRY_INITIAL_TIME", "RETRY_MAX_ATTEMPTS"];

/// Which notifier delivers `notification` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    Telegram,
    Console,
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "console" => Ok(Self::Console),
            other => Err(format!("unknown notifier '{other}', expected telegram or console")),
        }
    }
}

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// `production` switches logs to JSON.
    pub environment: String,
    pub notifications_topic: String,
    pub dead_letter_topic: String,
    /// Consumer group for the notification consumer.
    pub group_id: String,
    /// Partitions per topic in the in-process log.
    pub partitions: usize,
    pub notifier: NotifierKind,
    pub telegram_bot_token: Option<SecretString>,
    pub telegram_api_base: String,
    /// Opt-in bound on a single handler invocation.
    pub handler_timeout: Option<Duration>,
    /// Retry variables that were set and will be ignored.
    pub ignored: Vec<&'static str>,
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve each variable. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(&get, "PORT", 3000u16)?;
        let environment = get("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let notifications_topic =
            get("NOTIFICATIONS_TOPIC").unwrap_or_else(|| "notifications".to_string());
        let dead_letter_topic =
            get("DEAD_LETTER_TOPIC").unwrap_or_else(|| "dead-letter".to_string());
        let group_id = get("GROUP_ID").unwrap_or_else(|| "notification-group".to_string());

        let partitions = parse_or(&get, "LOG_PARTITIONS", DEFAULT_PARTITIONS)?;
        if partitions == 0 {
            return Err(invalid("LOG_PARTITIONS", "must be at least 1"));
        }

        let notifier = parse_or(&get, "NOTIFIER", NotifierKind::Telegram)?;
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").map(SecretString::from);
        if notifier == NotifierKind::Telegram && telegram_bot_token.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "TELEGRAM_BOT_TOKEN".into(),
                hint: "Set it to the bot token, or use NOTIFIER=console".into(),
            });
        }
        let telegram_api_base =
            get("TELEGRAM_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let handler_timeout = match get("HANDLER_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|e| invalid("HANDLER_TIMEOUT_MS", &format!("{e}")))?;
                if ms == 0 {
                    return Err(invalid("HANDLER_TIMEOUT_MS", "must be greater than 0"));
                }
                Some(Duration::from_millis(ms))
            }
            None => None,
        };

        let ignored = IGNORED_RETRY_VARS
            .into_iter()
            .filter(|key| get(key).is_some())
            .collect();

        Ok(Self {
            port,
            environment,
            notifications_topic,
            dead_letter_topic,
            group_id,
            partitions,
            notifier,
            telegram_bot_token,
            telegram_api_base,
            handler_timeout,
            ignored,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(key, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
