use thiserror::Error;

/// All errors generated in `cockpit-feed`.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Socket-level failure. Always recovered locally by the reconnect
    /// loop; surfaced to observers only as a connectivity flag.
    #[error("transport: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// A single inbound frame failed to parse or did not match the shape
    /// its `type` tag declared. Dropped per-frame; the connection is
    /// unaffected.
    #[error("failed to decode inbound frame: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FeedError {
    /// True if the error ends the current connection (and therefore
    /// triggers a reconnect attempt).
    pub fn is_terminal(&self) -> bool {
        matches!(self, FeedError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_not_terminal() {
        let error = FeedError::from(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
        assert!(!error.is_terminal());
    }
}
