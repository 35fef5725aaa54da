use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use reqwest::Client;
use tokio::sync::watch;

mod config;
mod error;
mod feed;
mod logger;
mod models;
mod pidfile;
mod pipeline;
mod sanitize;
mod scheduler;
mod telegram;
mod template;
#[cfg(test)]
mod testing;

use crate::config::Config;
use crate::error::ConfigError;
use crate::feed::FeedFetcher;
use crate::logger::LogConfig;
use crate::models::FeedKind;
use crate::pidfile::PidFile;
use crate::scheduler::Scheduler;
use crate::telegram::TelegramClient;

/// Relay Arch Linux news and package updates to a Telegram channel.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// State file with credentials and feed cursors
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Lock file guarding against a second instance
    #[arg(long, default_value = "asparagus.pid")]
    pid_file: PathBuf,

    /// Directory for daily log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Console log level (file logs are always at debug)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logger::init(LogConfig {
        console_level: logger::parse_log_level(&args.log_level),
        log_dir: Some(args.log_dir.clone()),
        ..Default::default()
    })?;

    // Listen before any slow startup step so an early signal is not lost.
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested, finishing current cycle");
        let _ = shutdown_tx.send(true);
    });

    let _lock = PidFile::acquire(&args.pid_file)?;

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            if matches!(e, ConfigError::Provisioned(_) | ConfigError::Unprovisioned { .. }) {
                info!("Please setup your \"{}\" file before restarting.", args.config.display());
            }
            return Err(e.into());
        }
    };

    let http = Client::new();
    let telegram = TelegramClient::new(http.clone(), &config.api_base, &config.api_token, config.chat_id.clone());
    let bot = tokio::select! {
        bot = telegram.get_me() => bot.context("failed to fetch bot identity")?,
        _ = shutdown_rx.changed() => {
            info!("Stopped during startup");
            return Ok(());
        }
    };

    info!("BOT Name: {}", bot.display_name);
    info!("BOT Username: {}", bot.username);
    info!("Target Channel: {}", config.chat_id);
    info!("Fetch Interval: {}s", config.interval().as_secs());

    let news = FeedFetcher::new(http.clone(), config.feed_url(FeedKind::News));
    let packages = FeedFetcher::new(http, config.feed_url(FeedKind::Packages));
    info!("Feeds: {} and {}", news.url(), packages.url());
    let scheduler = Scheduler::new(config, args.config, news, packages, telegram, bot);

    if args.once {
        let report = scheduler.run_once().await?;
        if !report.is_success() {
            anyhow::bail!("cycle finished with errors");
        }
        return Ok(());
    }

    scheduler.run(shutdown_rx).await?;
    info!("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
