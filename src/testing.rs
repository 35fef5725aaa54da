//! Fakes shared by the pipeline and scheduler tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{FeedError, TelegramError};
use crate::feed::FeedSource;
use crate::models::{BotIdentity, FeedEntry, PollResult};
use crate::telegram::Delivery;

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn entry(title: &str, secs: i64) -> FeedEntry {
    FeedEntry {
        published_at: ts(secs),
        title: title.to_string(),
        link: format!("https://example.com/{title}"),
        description: format!("about {title}"),
        tags: vec!["Core".to_string()],
    }
}

pub fn bot() -> BotIdentity {
    BotIdentity {
        id: 1,
        username: "asparagus_bot".to_string(),
        display_name: "Asparagus".to_string(),
    }
}

/// Replays queued poll results; once drained it reports `Unchanged`.
#[derive(Default)]
pub struct ScriptedFeed {
    responses: RefCell<VecDeque<Result<PollResult, FeedError>>>,
    tokens: RefCell<Vec<Option<String>>>,
}

impl ScriptedFeed {
    pub fn new(responses: Vec<Result<PollResult, FeedError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            tokens: RefCell::default(),
        }
    }

    pub fn fresh(entries: Vec<FeedEntry>, cache_token: Option<&str>) -> Self {
        Self::new(vec![Ok(PollResult::Fresh {
            entries,
            cache_token: cache_token.map(str::to_string),
        })])
    }

    pub fn push(&self, response: Result<PollResult, FeedError>) {
        self.responses.borrow_mut().push_back(response);
    }

    /// Cache tokens passed to each poll, in call order.
    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.tokens.borrow().clone()
    }
}

impl FeedSource for ScriptedFeed {
    async fn poll(&self, cache_token: Option<&str>) -> Result<PollResult, FeedError> {
        self.tokens.borrow_mut().push(cache_token.map(str::to_string));
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(PollResult::Unchanged))
    }
}

/// Records every send; message ids count up from 1.
#[derive(Default)]
pub struct RecordingSink {
    sent: RefCell<Vec<(String, bool)>>,
    pinned: RefCell<Vec<i64>>,
    /// Zero-based send attempt that fails, once.
    fail_at: Cell<Option<usize>>,
    fail_pin: bool,
    attempts: Cell<usize>,
}

impl RecordingSink {
    pub fn failing_at(attempt: usize) -> Self {
        Self {
            fail_at: Cell::new(Some(attempt)),
            ..Default::default()
        }
    }

    pub fn failing_pin() -> Self {
        Self {
            fail_pin: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, bool)> {
        self.sent.borrow().clone()
    }

    pub fn pinned(&self) -> Vec<i64> {
        self.pinned.borrow().clone()
    }
}

fn refused(method: &'static str) -> TelegramError {
    TelegramError::HttpStatus {
        method,
        status: 502,
        description: "Bad Gateway".to_string(),
    }
}

impl Delivery for RecordingSink {
    async fn send_message(&self, text: &str, silent: bool) -> Result<i64, TelegramError> {
        let attempt = self.attempts.get();
        self.attempts.set(attempt + 1);
        if self.fail_at.get() == Some(attempt) {
            self.fail_at.set(None);
            return Err(refused("sendMessage"));
        }
        let mut sent = self.sent.borrow_mut();
        sent.push((text.to_string(), silent));
        Ok(sent.len() as i64)
    }

    async fn pin_message(&self, message_id: i64) -> Result<(), TelegramError> {
        if self.fail_pin {
            return Err(refused("pinChatMessage"));
        }
        self.pinned.borrow_mut().push(message_id);
        Ok(())
    }
}
