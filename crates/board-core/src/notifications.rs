//! User-facing notifications for board actions.
//!
//! Every user action (add, delete, drag-save, layout save) reports its outcome
//! through a [`NotificationSink`]. Sinks are fire-and-forget: callers never
//! inspect a return value, and a sink must not fail the action it reports on.
//!
//! [`NoticeLog`] keeps a bounded, newest-first history so the terminal UI can
//! show the most recent notice for a few seconds before it fades.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ── Notice ────────────────────────────────────────────────────────────────────

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A single transient message shown to the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// UTC timestamp of when the notice was raised.
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            at: Utc::now(),
        }
    }

    /// `true` while the notice is younger than `ttl` relative to `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.at < ttl
    }
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

/// Destination for action outcomes.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sink that only writes notices to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!(message = %notice.message, "notice"),
            NoticeLevel::Error => tracing::warn!(message = %notice.message, "notice"),
        }
    }
}

/// Default number of notices retained by [`NoticeLog`].
pub const DEFAULT_NOTICE_CAPACITY: usize = 32;

/// Bounded in-memory notice history, newest first.
#[derive(Debug)]
pub struct NoticeLog {
    capacity: usize,
    notices: Mutex<VecDeque<Notice>>,
}

impl NoticeLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            notices: Mutex::new(VecDeque::new()),
        }
    }

    /// Most recent notice, if any.
    pub fn latest(&self) -> Option<Notice> {
        self.notices.lock().front().cloned()
    }

    /// Most recent notice still within `ttl` of `now`.
    pub fn latest_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> Option<Notice> {
        self.latest().filter(|n| n.is_fresh(now, ttl))
    }

    /// Snapshot of the retained notices, newest first.
    pub fn snapshot(&self) -> Vec<Notice> {
        self.notices.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.notices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.lock().is_empty()
    }

    /// Count of retained notices at `level`.
    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices
            .lock()
            .iter()
            .filter(|n| n.level == level)
            .count()
    }
}

impl Default for NoticeLog {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_CAPACITY)
    }
}

impl NotificationSink for NoticeLog {
    fn notify(&self, notice: Notice) {
        TracingSink.notify(notice.clone());
        let mut notices = self.notices.lock();
        notices.push_front(notice);
        notices.truncate(self.capacity);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
