//! Persisted bot state: credentials, target chat, poll interval and per-feed cursors.
//!
//! The file is a flat JSON object whose keys match what earlier deployments wrote,
//! so an existing `config.json` keeps working. Keys this program does not know
//! about are carried through untouched when the state is persisted.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::models::{FeedKind, epoch_seconds};
use crate::telegram::{ChatId, DEFAULT_API_BASE};

const PLACEHOLDER_TOKEN: &str = "YOUR_BOT_API_TOKEN";
const PLACEHOLDER_CHAT: &str = "YOUR_CHANNEL_ID";
const DEFAULT_INTERVAL_SECS: u64 = 60 * 5;
const DEFAULT_NEWS_FEED: &str = "https://archlinux.org/feeds/news/";
const DEFAULT_PKG_FEED: &str = "https://archlinux.org/feeds/packages/";

/// Delivery position within one feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedCursor {
    /// Publish time of the newest entry already delivered.
    pub watermark: DateTime<Utc>,
    /// Validator from the last fully processed fetch.
    pub cache_token: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "API_TOKEN")]
    pub api_token: String,

    #[serde(rename = "CHAT_ID")]
    pub chat_id: ChatId,

    #[serde(rename = "LAST_NEWS", with = "epoch_seconds", default = "unix_epoch")]
    pub last_news: DateTime<Utc>,

    #[serde(rename = "LAST_NEWS_ETAG", with = "cache_token", default)]
    pub last_news_etag: Option<String>,

    #[serde(rename = "LAST_PKG_UPDATE_ALL", with = "epoch_seconds", default = "unix_epoch")]
    pub last_pkg_update: DateTime<Utc>,

    #[serde(rename = "LAST_PKG_UPDATE_ETAG", with = "cache_token", default)]
    pub last_pkg_update_etag: Option<String>,

    /// Seconds between polls.
    #[serde(rename = "INTERVAL", default = "default_interval")]
    pub interval: u64,

    #[serde(rename = "API_BASE", default = "default_api_base")]
    pub api_base: String,

    #[serde(rename = "NEWS_FEED", default = "default_news_feed")]
    pub news_feed: String,

    #[serde(rename = "PKG_FEED", default = "default_pkg_feed")]
    pub pkg_feed: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_news_feed() -> String {
    DEFAULT_NEWS_FEED.to_string()
}

fn default_pkg_feed() -> String {
    DEFAULT_PKG_FEED.to_string()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .field("last_news", &self.last_news)
            .field("last_news_etag", &self.last_news_etag)
            .field("last_pkg_update", &self.last_pkg_update)
            .field("last_pkg_update_etag", &self.last_pkg_update_etag)
            .field("interval", &self.interval)
            .field("api_base", &self.api_base)
            .field("news_feed", &self.news_feed)
            .field("pkg_feed", &self.pkg_feed)
            .finish()
    }
}

impl Config {
    /// Settings written out when no state file exists yet.
    pub fn template() -> Self {
        Self {
            api_token: PLACEHOLDER_TOKEN.to_string(),
            chat_id: ChatId::Username(PLACEHOLDER_CHAT.to_string()),
            last_news: unix_epoch(),
            last_news_etag: None,
            last_pkg_update: unix_epoch(),
            last_pkg_update_etag: None,
            interval: DEFAULT_INTERVAL_SECS,
            api_base: default_api_base(),
            news_feed: default_news_feed(),
            pkg_feed: default_pkg_feed(),
            extra: Map::new(),
        }
    }

    /// Load and validate the state file.
    ///
    /// A missing file is replaced by a template and reported as an error, so the
    /// operator has to fill in credentials before the bot runs. A malformed file
    /// is left untouched.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Creating {}", path.display());
                Self::template().persist(path)?;
                return Err(ConfigError::Provisioned(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config: Config = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate(path)?;
        debug!("Loaded {:?}", config);
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let unset = |field| ConfigError::Unprovisioned {
            path: path.to_path_buf(),
            field,
        };
        if self.api_token.trim().is_empty() || self.api_token == PLACEHOLDER_TOKEN {
            return Err(unset("API_TOKEN"));
        }
        match &self.chat_id {
            ChatId::Username(name) if name.trim().is_empty() || name == PLACEHOLDER_CHAT => {
                Err(unset("CHAT_ID"))
            }
            _ => Ok(()),
        }
    }

    /// Write the state file through a sibling temp file and a rename.
    pub fn persist(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer).map_err(|e| io_err(e.into()))?;
        buf.push(b'\n');

        let tmp = temp_path(path);
        fs::write(&tmp, &buf).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        debug!("Saved {}", path.display());
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    pub fn cursor(&self, kind: FeedKind) -> FeedCursor {
        match kind {
            FeedKind::News => FeedCursor {
                watermark: self.last_news,
                cache_token: self.last_news_etag.clone(),
            },
            FeedKind::Packages => FeedCursor {
                watermark: self.last_pkg_update,
                cache_token: self.last_pkg_update_etag.clone(),
            },
        }
    }

    pub fn set_cursor(&mut self, kind: FeedKind, cursor: FeedCursor) {
        let (watermark, token) = match kind {
            FeedKind::News => (&mut self.last_news, &mut self.last_news_etag),
            FeedKind::Packages => (&mut self.last_pkg_update, &mut self.last_pkg_update_etag),
        };
        // Never move a watermark backwards.
        *watermark = (*watermark).max(cursor.watermark);
        *token = cursor.cache_token;
    }

    pub fn feed_url(&self, kind: FeedKind) -> &str {
        match kind {
            FeedKind::News => &self.news_feed,
            FeedKind::Packages => &self.pkg_feed,
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Cache tokens are stored as strings, empty meaning none. Older files may hold a number.
mod cache_token {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(token: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(token.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const LEGACY: &str = r#"{
        "API_TOKEN": "123:ABC",
        "CHAT_ID": "@archlinux_feed",
        "LAST_NEWS": 1704067200.1,
        "LAST_NEWS_ETAG": "\"news-1\"",
        "LAST_PKG_UPDATE_ALL": 1704070800,
        "LAST_PKG_UPDATE_ETAG": 0,
        "INTERVAL": 600,
        "BOT_ID": 42
    }"#;

    fn write(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_legacy_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&write(&dir, LEGACY)).unwrap();

        assert_eq!(config.api_token, "123:ABC");
        assert_eq!(config.chat_id, ChatId::Username("@archlinux_feed".into()));
        assert_eq!(config.last_news.timestamp(), 1_704_067_200);
        assert_eq!(config.last_news_etag.as_deref(), Some("\"news-1\""));
        assert_eq!(config.last_pkg_update, Utc.timestamp_opt(1_704_070_800, 0).unwrap());
        assert_eq!(config.last_pkg_update_etag, None);
        assert_eq!(config.interval(), Duration::from_secs(600));
        assert_eq!(config.news_feed, DEFAULT_NEWS_FEED);
        assert_eq!(config.extra.get("BOT_ID"), Some(&Value::from(42)));
    }

    #[test]
    fn persist_round_trips_and_keeps_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, LEGACY);
        let mut config = Config::load(&path).unwrap();
        config.set_cursor(
            FeedKind::Packages,
            FeedCursor {
                watermark: Utc.timestamp_opt(1_704_080_000, 0).unwrap(),
                cache_token: Some("\"pkg-2\"".into()),
            },
        );
        config.persist(&path).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["LAST_PKG_UPDATE_ALL"], Value::from(1_704_080_000));
        assert_eq!(raw["LAST_PKG_UPDATE_ETAG"], Value::from("\"pkg-2\""));
        assert_eq!(raw["BOT_ID"], Value::from(42));
        assert!(!temp_path(&path).exists());

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.cursor(FeedKind::Packages), config.cursor(FeedKind::Packages));
        assert_eq!(reloaded.cursor(FeedKind::News), config.cursor(FeedKind::News));
    }

    #[test]
    fn missing_file_writes_template_and_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Provisioned(_)));
        assert!(path.exists());

        // The template itself is not runnable.
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Unprovisioned { field: "API_TOKEN", .. }));
    }

    #[test]
    fn malformed_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "{ not json");

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn placeholder_chat_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"{"API_TOKEN": "123:ABC", "CHAT_ID": "YOUR_CHANNEL_ID"}"#);

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Unprovisioned { field: "CHAT_ID", .. })
        ));
    }

    #[test]
    fn set_cursor_never_moves_watermark_back() {
        let mut config = Config::template();
        let later = Utc.timestamp_opt(2_000, 0).unwrap();
        config.set_cursor(FeedKind::News, FeedCursor { watermark: later, cache_token: None });
        config.set_cursor(
            FeedKind::News,
            FeedCursor {
                watermark: Utc.timestamp_opt(1_000, 0).unwrap(),
                cache_token: Some("t".into()),
            },
        );

        let cursor = config.cursor(FeedKind::News);
        assert_eq!(cursor.watermark, later);
        assert_eq!(cursor.cache_token.as_deref(), Some("t"));
    }

    #[test]
    fn debug_hides_token() {
        let mut config = Config::template();
        config.api_token = "123:SECRET".into();
        assert!(!format!("{config:?}").contains("SECRET"));
    }
}
