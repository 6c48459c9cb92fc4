//! Pull/command side of the cockpit synchronization layer.
//!
//! Polls the trading engine's REST API on a fixed cadence, merges the
//! results with push-delivered alerts from [`cockpit_feed`], and exposes
//! the start/stop/emergency-stop command flows with confirmation gating
//! and in-flight guarding.

pub mod api;
pub mod controller;
pub mod error;
pub mod types;

pub use api::{EngineApi, RestEngineClient};
pub use controller::{
    spawn_poll_loop, CommandDisposition, DashboardController, PollHandle, POLL_INTERVAL,
};
pub use error::ControlError;
pub use types::{
    EmergencyStopResponse, Portfolio, PositionInfo, StartRequest, StartResponse, StopRequest,
    StopResponse, TradingMode, TradingSession,
};
