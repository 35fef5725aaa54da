use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use fern::colors::{Color, ColoredLevelConfig};
use log::{LevelFilter, warn};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FILE_PREFIX: &str = "asparagus.";
/// Today's file plus five previous days.
const KEPT_LOG_FILES: usize = 6;

/// Log configuration options
pub struct LogConfig {
    /// Log level for console output
    pub console_level: LevelFilter,
    /// Log level for file output
    pub file_level: LevelFilter,
    /// Directory for daily log files (None means no file logging)
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_level: LevelFilter::Info,
            file_level: LevelFilter::Debug,
            log_dir: None,
        }
    }
}

/// Initialize the logging system with the provided configuration
pub fn init(config: LogConfig) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let console_config = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Local::now().format(TIME_FORMAT),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .level(config.console_level)
        .chain(io::stdout());

    // Collect everything, then filter at each output
    let mut log_config = fern::Dispatch::new()
        .level(LevelFilter::Trace)
        // Keep the HTTP stack quiet
        .level_for("hyper", LevelFilter::Info)
        .level_for("reqwest", LevelFilter::Info)
        .chain(console_config);

    // One file per day, no colour codes
    let log_dir = config.log_dir;
    if let Some(log_dir) = &log_dir {
        fs::create_dir_all(log_dir)?;
        let prefix = log_dir.join(FILE_PREFIX);
        let file_config = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{} [{}] [{}] {}",
                    chrono::Local::now().format(TIME_FORMAT),
                    record.target(),
                    record.level(),
                    message
                ))
            })
            .level(config.file_level)
            .chain(fern::DateBased::new(prefix.to_string_lossy().into_owned(), "%Y-%m-%d.log"));

        log_config = log_config.chain(file_config);
    }

    log_config.apply()?;

    if let Some(log_dir) = &log_dir {
        if let Err(e) = prune_old_logs(log_dir, KEPT_LOG_FILES) {
            warn!("Failed to prune old logs in {}: {e}", log_dir.display());
        }
    }

    Ok(())
}

/// Delete all but the newest `keep` daily log files; returns how many were removed.
///
/// File names embed the date as `%Y-%m-%d`, so name order is age order.
fn prune_old_logs(dir: &Path, keep: usize) -> io::Result<usize> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(FILE_PREFIX) && name.ends_with(".log") && entry.file_type()?.is_file() {
            logs.push(entry.path());
        }
    }
    logs.sort();

    let excess = logs.len().saturating_sub(keep);
    for path in &logs[..excess] {
        fs::remove_file(path)?;
    }
    Ok(excess)
}

/// Utility function to convert a string to a log level
pub fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info, // Default to Info for unrecognized levels
    }
}
