//! One feed's trip through poll, select, render and deliver.
//!
//! The watermark is the publish time of the newest delivered entry. An entry is
//! new when it is strictly newer than the watermark. The watermark only moves
//! past a timestamp once every selected entry carrying that timestamp went out.
//! A failure therefore never leaves an undelivered entry behind it.

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::FeedCursor;
use crate::error::CycleError;
use crate::feed::FeedSource;
use crate::models::{BotIdentity, FeedEntry, FeedKind, PollResult};
use crate::telegram::Delivery;
use crate::template;

/// How one feed fared during a cycle.
#[derive(Debug)]
pub enum FeedOutcome {
    Unchanged,
    Delivered { count: usize },
    Failed { delivered: usize, reason: CycleError },
}

impl FeedOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FeedOutcome::Failed { .. })
    }
}

/// Entries strictly newer than `watermark`, oldest first.
///
/// Entries sharing a timestamp keep the order the feed listed them in.
pub fn select(entries: Vec<FeedEntry>, watermark: DateTime<Utc>) -> Vec<FeedEntry> {
    let mut fresh: Vec<FeedEntry> = entries
        .into_iter()
        .filter(|e| e.published_at > watermark)
        .collect();
    fresh.sort_by_key(|e| e.published_at);
    fresh
}

/// Send `entries` in order, advancing `watermark` as they go out.
///
/// Stops at the first failure. News messages are pinned after sending and
/// package updates are sent silently.
pub async fn deliver<D: Delivery>(
    entries: &[FeedEntry],
    kind: FeedKind,
    bot: &BotIdentity,
    sink: &D,
    watermark: &mut DateTime<Utc>,
) -> FeedOutcome {
    for (i, entry) in entries.iter().enumerate() {
        let text = template::format(entry, kind, bot);
        let silent = kind == FeedKind::Packages;

        let message_id = match sink.send_message(&text, silent).await {
            Ok(id) => id,
            Err(source) => {
                return FeedOutcome::Failed {
                    delivered: i,
                    reason: CycleError::Delivery {
                        title: entry.title.clone(),
                        source,
                    },
                };
            }
        };
        info!("{}: \"{}\" pushed", kind, entry.title);

        let tie_pending = entries
            .get(i + 1)
            .is_some_and(|next| next.published_at == entry.published_at);
        if !tie_pending && entry.published_at > *watermark {
            *watermark = entry.published_at;
        }

        if kind == FeedKind::News {
            if let Err(source) = sink.pin_message(message_id).await {
                return FeedOutcome::Failed {
                    delivered: i + 1,
                    reason: CycleError::Pin {
                        title: entry.title.clone(),
                        source,
                    },
                };
            }
            info!("{}: \"{}\" pinned", kind, entry.title);
        }
    }

    FeedOutcome::Delivered { count: entries.len() }
}

/// Poll one feed and deliver whatever is new, updating `cursor` in place.
///
/// The fresh cache token is only kept once the whole batch went out, so a
/// partially delivered feed is fetched in full again next time.
pub async fn run_feed<S: FeedSource, D: Delivery>(
    kind: FeedKind,
    source: &S,
    sink: &D,
    bot: &BotIdentity,
    cursor: &mut FeedCursor,
) -> FeedOutcome {
    let poll = match source.poll(cursor.cache_token.as_deref()).await {
        Ok(poll) => poll,
        Err(e) => {
            return FeedOutcome::Failed {
                delivered: 0,
                reason: e.into(),
            };
        }
    };

    let (entries, cache_token) = match poll {
        PollResult::Unchanged => {
            debug!("{kind}: no update");
            return FeedOutcome::Unchanged;
        }
        PollResult::Fresh { entries, cache_token } => (entries, cache_token),
    };

    let selected = select(entries, cursor.watermark);
    debug!("{kind}: {} new entries", selected.len());

    let outcome = deliver(&selected, kind, bot, sink, &mut cursor.watermark).await;
    if !outcome.is_failure() {
        cursor.cache_token = cache_token;
    }
    outcome
}
