/// Data types for the trading engine REST API.
///
/// These match the JSON exchanged with the engine; the controller keeps
/// read-only cached copies that are overwritten wholesale on each
/// successful poll.
use serde::{Deserialize, Serialize};

/// Whether the engine trades with simulated or real money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    #[default]
    Paper,
    Live,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Paper => "paper",
            TradingMode::Live => "live",
        }
    }

    /// Live trading is the destructive mode that requires explicit
    /// operator confirmation before starting.
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, TradingMode::Live)
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trading session state as reported by the engine.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TradingSession {
    pub mode: TradingMode,
    pub is_running: bool,
    pub daily_pnl: f64,
    pub daily_pnl_pct: f64,
    pub active_position_count: u32,
    pub trades_today: u32,
    pub uptime_seconds: u64,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub enabled_strategies: Vec<String>,
}

/// One open position inside the portfolio report.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PositionInfo {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
}

/// Portfolio report, fetched only while a session is running.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Portfolio {
    pub total_value: f64,
    pub cash: f64,
    pub positions_value: f64,
    #[serde(default)]
    pub positions: Vec<PositionInfo>,
}

impl Portfolio {
    /// Aggregate position P&L percentage.
    ///
    /// A simple arithmetic mean across positions, not value-weighted. This
    /// matches the engine dashboard's observable behavior and must stay
    /// that way.
    pub fn mean_position_pnl_pct(&self) -> f64 {
        if self.positions.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .positions
            .iter()
            .map(|position| position.unrealized_pnl_pct)
            .sum();
        sum / self.positions.len() as f64
    }
}

/// Body of `POST /api/trading/start`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StartRequest {
    pub mode: TradingMode,
}

/// Engine reply to a start request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct StartResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /api/trading/stop`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct StopRequest {}

/// Engine reply to a stop request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct StopResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Engine reply to an emergency stop: how many positions were liquidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct EmergencyStopResponse {
    pub closed_positions: u32,
}
