use thiserror::Error;

/// All errors generated in `cockpit-control`.
#[derive(Debug, Error)]
pub enum ControlError {
    /// HTTP transport failure on the way to the engine.
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),

    /// The engine answered with a non-success status. `detail` carries the
    /// backend-provided message when present, a generic one otherwise.
    #[error("engine api error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// Status/portfolio endpoint reported no active trading session. This
    /// is a normal "not running" poll result, not a failure.
    #[error("no active trading session")]
    NoActiveSession,

    /// A command of the same family is already in flight.
    #[error("{0} command already in flight")]
    CommandInFlight(&'static str),

    /// `confirm_*` was called with nothing pending confirmation.
    #[error("no pending {0} command to confirm")]
    NothingPending(&'static str),
}

impl ControlError {
    /// Backend detail message for surfacing to the operator.
    pub fn detail(&self) -> String {
        match self {
            ControlError::Api { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}
