use chrono::FixedOffset;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::Pacing;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the operator configures. Loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub search_url: String,
    pub db_path: String,
    pub image_root: PathBuf,
    pub template_path: PathBuf,
    pub poll_interval: Duration,
    pub recipients: Vec<String>,
    pub bot_token: String,
    pub telegram_api_base: String,
    pub log_level: String,
    pub http_timeout: Duration,
    pub pacing: Pacing,
    pub photo_pause: Duration,
    pub max_photos: usize,
    pub source_offset: FixedOffset,
}

impl AppConfig {
    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { get };

        let search_url = vars.required("SEARCH_URL")?;
        url::Url::parse(&search_url).map_err(|e| ConfigError::Invalid {
            name: "SEARCH_URL",
            reason: e.to_string(),
        })?;

        let recipients: Vec<String> = vars
            .required("CHAT_IDS")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if recipients.is_empty() {
            return Err(ConfigError::Invalid {
                name: "CHAT_IDS",
                reason: "no recipients listed".to_string(),
            });
        }

        let poll_minutes: u64 = vars.parsed("POLL_INTERVAL_MINUTES", 10)?;
        if poll_minutes == 0 {
            return Err(ConfigError::Invalid {
                name: "POLL_INTERVAL_MINUTES",
                reason: "must be at least 1".to_string(),
            });
        }

        let offset_hours: i32 = vars.parsed("SOURCE_UTC_OFFSET_HOURS", 3)?;
        let source_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::Invalid {
                name: "SOURCE_UTC_OFFSET_HOURS",
                reason: format!("{offset_hours} is out of range"),
            })?;

        Ok(Self {
            search_url,
            db_path: vars.or("DB_PATH", "data/flatwatch.sqlite3"),
            image_root: PathBuf::from(vars.or("IMAGE_ROOT", "data/images")),
            template_path: PathBuf::from(vars.or("TEMPLATE_PATH", "data/message_template.html")),
            poll_interval: Duration::from_secs(poll_minutes * 60),
            recipients,
            bot_token: vars.required("TELEGRAM_BOT_TOKEN")?,
            telegram_api_base: vars.or("TELEGRAM_API_BASE", "https://api.telegram.org"),
            log_level: vars.or("LOG_LEVEL", "info"),
            http_timeout: Duration::from_secs(vars.parsed("HTTP_TIMEOUT_SECS", 60)?),
            pacing: Pacing {
                after_listing: Duration::from_secs(vars.parsed("LISTING_PAUSE_SECS", 10)?),
                after_tick: Duration::from_secs(vars.parsed("TICK_PAUSE_SECS", 30)?),
            },
            photo_pause: Duration::from_millis(vars.parsed("PHOTO_PAUSE_MS", 500)?),
            max_photos: vars.parsed("MAX_PHOTOS", 7)?,
            source_offset,
        })
    }
}

struct Vars<F> {
    get: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn value(&self, name: &str) -> Option<String> {
        (self.get)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.value(name).ok_or(ConfigError::Missing(name))
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.value(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.value(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
        }
    }
}
