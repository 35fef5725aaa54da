use std::path::PathBuf;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::config::Config;
use crate::error::ConfigError;
use crate::feed::FeedSource;
use crate::models::{BotIdentity, FeedKind};
use crate::pipeline::{self, FeedOutcome};
use crate::telegram::Delivery;

/// Result of one tick across both feeds.
#[derive(Debug)]
pub struct CycleReport {
    pub news: FeedOutcome,
    pub packages: FeedOutcome,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        !self.news.is_failure() && !self.packages.is_failure()
    }

    fn log(&self) {
        for (kind, outcome) in [(FeedKind::News, &self.news), (FeedKind::Packages, &self.packages)] {
            match outcome {
                FeedOutcome::Unchanged => {}
                FeedOutcome::Delivered { count: 0 } => {}
                FeedOutcome::Delivered { count } => info!("{kind}: delivered {count} entries"),
                FeedOutcome::Failed { delivered, reason } => {
                    error!("{kind}: cycle failed after {delivered} deliveries: {reason}")
                }
            }
        }
    }
}

/// Drives both feeds on a fixed interval, one after the other.
pub struct Scheduler<S, D> {
    config: Config,
    config_path: PathBuf,
    news: S,
    packages: S,
    sink: D,
    bot: BotIdentity,
}

impl<S: FeedSource, D: Delivery> Scheduler<S, D> {
    pub fn new(config: Config, config_path: PathBuf, news: S, packages: S, sink: D, bot: BotIdentity) -> Self {
        Self {
            config,
            config_path,
            news,
            packages,
            sink,
            bot,
        }
    }

    /// Run the news pipeline to completion, then the package pipeline.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let news = self.run_feed(FeedKind::News).await;
        let packages = self.run_feed(FeedKind::Packages).await;
        let report = CycleReport { news, packages };
        report.log();
        report
    }

    async fn run_feed(&mut self, kind: FeedKind) -> FeedOutcome {
        let source = match kind {
            FeedKind::News => &self.news,
            FeedKind::Packages => &self.packages,
        };
        let mut cursor = self.config.cursor(kind);
        let outcome = pipeline::run_feed(kind, source, &self.sink, &self.bot, &mut cursor).await;
        self.config.set_cursor(kind, cursor);
        outcome
    }

    /// Save state after a cycle; a failed save is logged and retried next cycle.
    fn checkpoint(&self) {
        if let Err(e) = self.config.persist(&self.config_path) {
            error!("Failed to save state: {e}");
        }
    }

    /// Run a single cycle and save state.
    pub async fn run_once(mut self) -> Result<CycleReport, ConfigError> {
        let report = self.run_cycle().await;
        self.config.persist(&self.config_path)?;
        Ok(report)
    }

    /// Poll, save, sleep, repeat until `shutdown` turns true.
    ///
    /// Shutdown is only acted on between cycles, never in the middle of a delivery.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ConfigError> {
        let interval = self.config.interval();
        loop {
            let report = self.run_cycle().await;
            if !report.is_success() {
                warn!("Cycle finished with errors, retrying in {}s", interval.as_secs());
            }
            self.checkpoint();

            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = sleep(interval) => {}
                Ok(()) = shutdown.changed() => {
                    if *shutdown.borrow_and_update() {
                        break;
                    }
                }
            }
        }

        info!("Saving {}", self.config_path.display());
        self.config.persist(&self.config_path)
    }
}
