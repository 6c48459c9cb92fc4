/// Wire data types for the price feed protocol.
///
/// Field names match the JSON emitted by the price server; see
/// [`crate::protocol`] for the message envelopes that carry them.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest known state of one instrument: OHLCV plus current price.
///
/// A snapshot always replaces the previous one for its symbol wholesale;
/// there is no partial merge.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PriceSnapshot {
    /// Instrument symbol (e.g. "AAPL")
    pub symbol: String,
    /// Bar timestamp from the server
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Most recent traded price
    pub current_price: f64,
    /// When the server last refreshed this instrument, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Informational message from the server (`signal`, `subscribed`,
/// `unsubscribed`, `error`).
///
/// Notices are forwarded to alerting/logging and never touch the price
/// cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedNotice {
    pub kind: NoticeKind,
    pub message: Option<String>,
    pub symbols: Vec<String>,
}

/// Notice discriminant, taken from the inbound `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Signal,
    Subscribed,
    Unsubscribed,
    Error,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::Signal => "signal",
            NoticeKind::Subscribed => "subscribed",
            NoticeKind::Unsubscribed => "unsubscribed",
            NoticeKind::Error => "error",
        }
    }
}

impl std::fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
