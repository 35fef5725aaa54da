use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("created template {0}, fill in API_TOKEN and CHAT_ID before restarting")]
    Provisioned(PathBuf),

    #[error("{field} in {path} is still unset")]
    Unprovisioned { path: PathBuf, field: &'static str },
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    #[error("parse error: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
}

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("request to {method} failed: {source}")]
    Network {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} returned HTTP {status}: {description}")]
    HttpStatus {
        method: &'static str,
        status: u16,
        description: String,
    },

    #[error("{method} rejected: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("{0} already exists, another instance may be running")]
    AlreadyRunning(PathBuf),

    #[error("failed to write lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why one feed's pipeline stopped early.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("poll failed: {0}")]
    Poll(#[from] FeedError),

    #[error("delivery of \"{title}\" failed: {source}")]
    Delivery {
        title: String,
        #[source]
        source: TelegramError,
    },

    #[error("pinning \"{title}\" failed: {source}")]
    Pin {
        title: String,
        #[source]
        source: TelegramError,
    },
}
