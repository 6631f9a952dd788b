//! Bot configuration loaded from environment variables (and `.env`).

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use teloxide::types::UserId;

use crate::errors::ConfigError;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_APPEALS_PAGE_SIZE: usize = 10;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:[A-Za-z0-9_-]{35}$").expect("token pattern is valid"));

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    /// Primary admins, never empty
    pub admin_ids: Vec<UserId>,
    pub data_dir: PathBuf,
    pub media_dir: PathBuf,
    /// Selects the PostgreSQL store when set
    pub database_url: Option<String>,
    pub sections_file: Option<PathBuf>,
    /// Flat-file layout imported at startup
    pub legacy_dir: Option<PathBuf>,
    pub appeals_page_size: usize,
    pub log_format: LogFormat,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("BOT_TOKEN"))
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        if !TOKEN_PATTERN.is_match(&bot_token) {
            return Err(ConfigError::Invalid {
                key: "TELEGRAM_BOT_TOKEN",
                reason: "expected <bot id>:<35 character secret>".to_string(),
            });
        }

        let admin_ids = parse_admin_ids(&get("ADMIN_IDS").ok_or(ConfigError::Missing("ADMIN_IDS"))?)?;

        let data_dir = get("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let media_dir = get("MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("media"));

        let appeals_page_size = match get("APPEALS_PAGE_SIZE") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "APPEALS_PAGE_SIZE",
                        reason: format!("{raw:?} is not a positive number"),
                    })
                }
            },
            None => DEFAULT_APPEALS_PAGE_SIZE,
        };

        let log_format = match get("LOG_FORMAT").map(|f| f.to_ascii_lowercase()).as_deref() {
            None | Some("text") | Some("pretty") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    reason: format!("unknown format {other:?}"),
                })
            }
        };

        Ok(Self {
            bot_token,
            admin_ids,
            data_dir,
            media_dir,
            database_url: get("DATABASE_URL"),
            sections_file: get("SECTIONS_FILE").map(PathBuf::from),
            legacy_dir: get("LEGACY_DIR").map(PathBuf::from),
            appeals_page_size,
            log_format,
        })
    }
}

/// Parse a comma separated list of numeric Telegram ids
pub fn parse_admin_ids(raw: &str) -> Result<Vec<UserId>, ConfigError> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let id = part.parse::<u64>().map_err(|_| ConfigError::Invalid {
            key: "ADMIN_IDS",
            reason: format!("{part:?} is not a numeric user id"),
        })?;
        if !ids.contains(&UserId(id)) {
            ids.push(UserId(id));
        }
    }
    if ids.is_empty() {
        return Err(ConfigError::Missing("ADMIN_IDS"));
    }
    Ok(ids)
}
