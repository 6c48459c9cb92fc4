//! Bounded, most-recent-first store of operator-facing notifications.

use crate::types::{FeedNotice, NoticeKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Maximum number of alerts retained; overflow drops the oldest.
pub const ALERT_CAPACITY: usize = 50;

/// Severity of an operator alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Info,
    Warning,
    Success,
    Danger,
}

/// One operator-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Feed-assigned, monotonically increasing
    pub id: u64,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Mutated only by explicit acknowledgment
    pub read: bool,
}

/// In-memory ring buffer of alerts, newest first. Not persisted; tied to
/// the dashboard session's lifetime.
#[derive(Debug, Clone, Default)]
pub struct AlertFeed {
    alerts: VecDeque<Alert>,
    next_id: u64,
}

impl AlertFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend an alert, dropping the oldest beyond [`ALERT_CAPACITY`].
    /// Returns the assigned id.
    pub fn push(&mut self, kind: AlertKind, title: impl Into<String>, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.alerts.push_front(Alert {
            id,
            kind,
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now(),
            read: false,
        });
        self.alerts.truncate(ALERT_CAPACITY);
        id
    }

    /// Record a push-delivered notice as an alert.
    pub fn push_notice(&mut self, notice: &FeedNotice) -> u64 {
        let kind = match notice.kind {
            NoticeKind::Error => AlertKind::Danger,
            NoticeKind::Signal => AlertKind::Info,
            NoticeKind::Subscribed | NoticeKind::Unsubscribed => AlertKind::Info,
        };
        let title = match notice.kind {
            NoticeKind::Signal => "Trading signal",
            NoticeKind::Subscribed => "Subscribed",
            NoticeKind::Unsubscribed => "Unsubscribed",
            NoticeKind::Error => "Server error",
        };
        let message = match (&notice.message, notice.symbols.is_empty()) {
            (Some(message), _) => message.clone(),
            (None, false) => notice.symbols.join(", "),
            (None, true) => notice.kind.to_string(),
        };
        self.push(kind, title, message)
    }

    /// Idempotent; unknown ids are ignored.
    pub fn mark_read(&mut self, id: u64) {
        if let Some(alert) = self.alerts.iter_mut().find(|alert| alert.id == id) {
            alert.read = true;
        }
    }

    /// Idempotent.
    pub fn mark_all_read(&mut self) {
        for alert in &mut self.alerts {
            alert.read = true;
        }
    }

    pub fn unread_count(&self) -> usize {
        self.alerts.iter().filter(|alert| !alert.read).count()
    }

    /// Alerts newest-first.
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}
