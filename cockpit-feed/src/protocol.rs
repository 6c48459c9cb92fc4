//! Subscription protocol codec.
//!
//! Outbound commands are `action`-tagged JSON objects; inbound frames are
//! routed on their `type` field alone. A malformed frame, an unknown tag,
//! or a payload whose shape does not match its declared type is logged and
//! discarded without affecting the connection.

use crate::error::FeedError;
use crate::types::{FeedNotice, NoticeKind, PriceSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Command sent to the price server.
///
/// `symbols` is always serialized; an empty sequence on `get_latest` means
/// "all known instruments".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundCommand {
    Subscribe { symbols: Vec<String> },
    Unsubscribe { symbols: Vec<String> },
    GetLatest { symbols: Vec<String> },
}

impl OutboundCommand {
    pub fn subscribe(symbols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Subscribe {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    pub fn unsubscribe(symbols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Unsubscribe {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    /// Request the latest snapshots; no symbols means all known.
    pub fn get_latest(symbols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::GetLatest {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    /// Wire encoding of the command.
    pub fn encode(&self) -> String {
        // Serialization of a tagged enum of plain vecs cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Decoded inbound message, dispatched by the `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Single snapshot for one instrument
    PriceUpdate(PriceSnapshot),
    /// Bulk snapshot response (`get_latest` reply or server push)
    LatestPrices(Vec<PriceSnapshot>),
    /// Informational message forwarded to alerting/logging
    Notice(FeedNotice),
}

/// Top-level inbound envelope; `data` is interpreted per `type`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    symbols: Vec<String>,
}

/// Decode one raw text frame.
///
/// `Ok(None)` means an unknown tag to be ignored; `Err` covers
/// unparseable text and payloads that do not match their declared type.
/// Neither is a connection-level condition.
pub fn decode(text: &str) -> Result<Option<InboundMessage>, FeedError> {
    let envelope = serde_json::from_str::<Envelope>(text)?;

    let notice_kind = match envelope.kind.as_str() {
        "price_update" => {
            let snapshot = serde_json::from_value::<PriceSnapshot>(envelope.data)?;
            return Ok(Some(InboundMessage::PriceUpdate(snapshot)));
        }
        "latest_prices" => {
            let snapshots = serde_json::from_value::<Vec<PriceSnapshot>>(envelope.data)?;
            return Ok(Some(InboundMessage::LatestPrices(snapshots)));
        }
        "signal" => NoticeKind::Signal,
        "subscribed" => NoticeKind::Subscribed,
        "unsubscribed" => NoticeKind::Unsubscribed,
        "error" => NoticeKind::Error,
        other => {
            debug!(tag = other, "ignoring inbound frame with unknown type");
            return Ok(None);
        }
    };

    Ok(Some(InboundMessage::Notice(FeedNotice {
        kind: notice_kind,
        message: envelope.message,
        symbols: envelope.symbols,
    })))
}

/// [`decode`], with the drop policy applied: malformed frames are logged
/// and discarded.
pub fn decode_frame(text: &str) -> Option<InboundMessage> {
    match decode(text) {
        Ok(message) => message,
        Err(error) => {
            warn!(%error, "discarding malformed inbound frame");
            debug!(frame = text, "raw malformed frame");
            None
        }
    }
}
