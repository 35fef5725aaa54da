use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Which of the two fixed feeds an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    News,
    Packages,
}

impl FeedKind {
    pub fn label(self) -> &'static str {
        match self {
            FeedKind::News => "News",
            FeedKind::Packages => "Package",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub published_at: DateTime<Utc>,
    pub title: String,
    pub link: String,
    pub description: String,
    pub tags: Vec<String>,  // Category terms, only filled in by the package feed
}

/// What a single poll of a feed produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    /// Server confirmed nothing changed since the cache token was issued.
    Unchanged,
    /// Entries in the feed's own order, plus the token to send next time.
    Fresh {
        entries: Vec<FeedEntry>,
        cache_token: Option<String>,
    },
}

/// The bot account as reported by the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub username: String,
    #[serde(rename = "first_name")]
    pub display_name: String,
}

/// Serializes a timestamp as (possibly fractional) seconds since the epoch.
pub mod epoch_seconds {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn to_secs(ts: &DateTime<Utc>) -> f64 {
        ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1e9
    }

    pub fn from_secs(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        // Microsecond resolution survives the trip through an f64 unchanged.
        let whole = secs.floor();
        let micros = ((secs - whole) * 1e6).round().min(999_999.0) as u32;
        Utc.timestamp_opt(whole as i64, micros * 1_000).single()
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        if ts.timestamp_subsec_nanos() == 0 {
            serializer.serialize_i64(ts.timestamp())
        } else {
            serializer.serialize_f64(to_secs(ts))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        from_secs(secs).ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
    }
}
