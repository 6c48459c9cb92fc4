//! Push side of the cockpit synchronization layer.
//!
//! Owns the WebSocket connection to the price server, decodes its
//! subscribe/unsubscribe/query protocol, and maintains the local state fed
//! by it: a copy-on-write price cache and a bounded operator alert feed.

pub mod alert;
pub mod cache;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod types;

pub use alert::{Alert, AlertFeed, AlertKind, ALERT_CAPACITY};
pub use cache::PriceCache;
pub use connection::{connect, ConnectionState, FeedConfig, FeedHandle};
pub use error::FeedError;
pub use protocol::{InboundMessage, OutboundCommand};
pub use types::{FeedNotice, NoticeKind, PriceSnapshot};
