//! REST client for the trading engine.
//!
//! The controller consumes the engine through the [`EngineApi`] trait so
//! tests can script responses; [`RestEngineClient`] is the production
//! implementation.

use crate::error::ControlError;
use crate::types::{
    EmergencyStopResponse, Portfolio, StartRequest, StartResponse, StopRequest, StopResponse,
    TradingSession,
};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Request/response operations the trading engine exposes. All idempotent
/// from the caller's perspective; failures surface as [`ControlError`].
#[async_trait]
pub trait EngineApi: Send + Sync {
    async fn trading_status(&self) -> Result<TradingSession, ControlError>;
    async fn portfolio_status(&self) -> Result<Portfolio, ControlError>;
    async fn start_trading(&self, request: &StartRequest) -> Result<StartResponse, ControlError>;
    async fn stop_trading(&self, request: &StopRequest) -> Result<StopResponse, ControlError>;
    async fn emergency_stop(&self, reason: &str) -> Result<EmergencyStopResponse, ControlError>;
}

/// Error body shape used by the engine (`detail`, falling back to
/// `message`).
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// [`EngineApi`] implementation over HTTP.
#[derive(Debug, Clone)]
pub struct RestEngineClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestEngineClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ControlError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        session_scoped: bool,
    ) -> Result<T, ControlError> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        Self::decode(response, session_scoped).await
    }

    async fn post_json<B: serde::Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ControlError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await?;
        Self::decode(response, false).await
    }

    /// Turn a response into a typed value or a typed error. On
    /// session-scoped endpoints an HTTP 404 means "no active session",
    /// which callers treat as a normal not-running result.
    async fn decode<T: DeserializeOwned>(
        response: Response,
        session_scoped: bool,
    ) -> Result<T, ControlError> {
        let status = response.status();
        if session_scoped && status == StatusCode::NOT_FOUND {
            return Err(ControlError::NoActiveSession);
        }
        if !status.is_success() {
            let detail = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.detail.or(body.message))
                .unwrap_or_else(|| format!("engine returned {status}"));
            return Err(ControlError::Api {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl EngineApi for RestEngineClient {
    async fn trading_status(&self) -> Result<TradingSession, ControlError> {
        self.get_json("/api/trading/status", true).await
    }

    async fn portfolio_status(&self) -> Result<Portfolio, ControlError> {
        self.get_json("/api/portfolio/status", true).await
    }

    async fn start_trading(&self, request: &StartRequest) -> Result<StartResponse, ControlError> {
        self.post_json("/api/trading/start", request).await
    }

    async fn stop_trading(&self, request: &StopRequest) -> Result<StopResponse, ControlError> {
        self.post_json("/api/trading/stop", request).await
    }

    async fn emergency_stop(&self, reason: &str) -> Result<EmergencyStopResponse, ControlError> {
        self.post_json(
            "/api/trading/emergency-stop",
            &serde_json::json!({ "reason": reason }),
        )
        .await
    }
}
