//! Dashboard synchronization controller.
//!
//! Reconciles the trading state the operator wants with the state the
//! engine actually reports: a fixed-cadence status poll (with the
//! portfolio sub-fetch gated on `is_running`), confirmation-gated
//! start/stop/emergency command flows with per-family in-flight guards,
//! and an alert feed merged from command results and push-delivered
//! notices.
//!
//! Optimistic updates never outlive one poll cycle: every successful
//! command immediately re-polls, and the next authoritative result
//! overwrites whatever was assumed.

use crate::api::EngineApi;
use crate::error::ControlError;
use crate::types::{Portfolio, StartRequest, StopRequest, TradingMode, TradingSession};
use cockpit_feed::alert::{Alert, AlertFeed, AlertKind};
use cockpit_feed::types::FeedNotice;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Cadence of the background status poll.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome of a command request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandDisposition {
    /// The REST call was issued and completed.
    Completed,
    /// The command is parked until the operator confirms or cancels.
    ConfirmationRequired,
}

/// Mutable dashboard state. Locked only between awaits; every update is a
/// whole-value replace.
#[derive(Debug, Default)]
struct DashState {
    session: TradingSession,
    portfolio: Option<Portfolio>,
    alerts: AlertFeed,
    pending_start: Option<StartRequest>,
    pending_stop: bool,
    emergency_pending: bool,
}

/// RAII reset for an advisory in-flight flag: cleared on every exit path,
/// including early returns.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool, family: &'static str) -> Result<Self, ControlError> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(ControlError::CommandInFlight(family));
        }
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Controller over an [`EngineApi`] implementation.
pub struct DashboardController<A> {
    api: A,
    state: Mutex<DashState>,
    start_guard: AtomicBool,
    stop_guard: AtomicBool,
    emergency_guard: AtomicBool,
}

impl<A: EngineApi> DashboardController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::new(DashState::default()),
            start_guard: AtomicBool::new(false),
            stop_guard: AtomicBool::new(false),
            emergency_guard: AtomicBool::new(false),
        }
    }

    /// One poll cycle: refresh the session status, then the portfolio if
    /// and only if that status reports a running session.
    ///
    /// "No active session" is a normal not-running result. Any other
    /// failure is logged and the last-good values are retained; nothing is
    /// cleared on a transient error.
    pub async fn poll(&self) {
        match self.api.trading_status().await {
            Ok(session) => {
                self.state.lock().session = session;
            }
            Err(ControlError::NoActiveSession) => {
                let mut state = self.state.lock();
                state.session.is_running = false;
                state.portfolio = None;
            }
            Err(error) => {
                warn!(%error, "status poll failed, keeping last known session");
                return;
            }
        }

        let running = self.state.lock().session.is_running;
        if !running {
            // No session: showing positions for it would be misleading.
            self.state.lock().portfolio = None;
            return;
        }

        match self.api.portfolio_status().await {
            Ok(portfolio) => {
                self.state.lock().portfolio = Some(portfolio);
            }
            Err(ControlError::NoActiveSession) => {
                let mut state = self.state.lock();
                state.session.is_running = false;
                state.portfolio = None;
            }
            Err(error) => {
                warn!(%error, "portfolio poll failed, keeping last known portfolio");
            }
        }
    }

    /// Request a trading start.
    ///
    /// Paper mode issues the REST call immediately. Live mode parks the
    /// request and returns [`CommandDisposition::ConfirmationRequired`]
    /// without touching the backend. A second start while one is in flight
    /// is rejected.
    pub async fn request_start(&self, mode: TradingMode) -> Result<CommandDisposition, ControlError> {
        if self.start_guard.load(Ordering::SeqCst) {
            return Err(ControlError::CommandInFlight("start"));
        }

        let request = StartRequest { mode };
        if mode.requires_confirmation() {
            info!(%mode, "start command awaiting operator confirmation");
            self.state.lock().pending_start = Some(request);
            return Ok(CommandDisposition::ConfirmationRequired);
        }

        let guard = InFlight::acquire(&self.start_guard, "start")?;
        self.issue_start(request, guard).await?;
        Ok(CommandDisposition::Completed)
    }

    /// Issue a start previously parked by [`Self::request_start`].
    pub async fn confirm_start(&self) -> Result<(), ControlError> {
        let guard = InFlight::acquire(&self.start_guard, "start")?;
        let request = self
            .state
            .lock()
            .pending_start
            .take()
            .ok_or(ControlError::NothingPending("start"))?;
        self.issue_start(request, guard).await
    }

    /// Discard a parked start request. No backend call is made.
    pub fn cancel_start(&self) {
        self.state.lock().pending_start = None;
    }

    async fn issue_start(
        &self,
        request: StartRequest,
        _guard: InFlight<'_>,
    ) -> Result<(), ControlError> {
        info!(mode = %request.mode, "issuing start command");
        match self.api.start_trading(&request).await {
            Ok(response) => {
                {
                    let mut state = self.state.lock();
                    // Optimistic until the reconcile poll answers.
                    state.session.is_running = true;
                    state.session.mode = request.mode;
                    let message = response
                        .message
                        .unwrap_or_else(|| format!("{} trading session started", request.mode));
                    state.alerts.push(AlertKind::Success, "Trading started", message);
                }
                self.poll().await;
                Ok(())
            }
            Err(error) => {
                warn!(%error, "start command failed");
                self.state
                    .lock()
                    .alerts
                    .push(AlertKind::Danger, "Start failed", error.detail());
                Err(error)
            }
        }
    }

    /// Request a trading stop. Always requires confirmation.
    pub fn request_stop(&self) -> Result<CommandDisposition, ControlError> {
        if self.stop_guard.load(Ordering::SeqCst) {
            return Err(ControlError::CommandInFlight("stop"));
        }
        self.state.lock().pending_stop = true;
        Ok(CommandDisposition::ConfirmationRequired)
    }

    /// Issue a stop previously requested. On failure the cached state is
    /// left unchanged.
    pub async fn confirm_stop(&self) -> Result<(), ControlError> {
        let _guard = InFlight::acquire(&self.stop_guard, "stop")?;
        {
            let mut state = self.state.lock();
            if !state.pending_stop {
                return Err(ControlError::NothingPending("stop"));
            }
            state.pending_stop = false;
        }

        info!("issuing stop command");
        match self.api.stop_trading(&StopRequest::default()).await {
            Ok(response) => {
                {
                    let mut state = self.state.lock();
                    state.session.is_running = false;
                    state.portfolio = None;
                    let message = response
                        .message
                        .unwrap_or_else(|| "trading session stopped".to_string());
                    state.alerts.push(AlertKind::Info, "Trading stopped", message);
                }
                self.poll().await;
                Ok(())
            }
            Err(error) => {
                warn!(%error, "stop command failed");
                self.state
                    .lock()
                    .alerts
                    .push(AlertKind::Danger, "Stop failed", error.detail());
                Err(error)
            }
        }
    }

    pub fn cancel_stop(&self) {
        self.state.lock().pending_stop = false;
    }

    /// Arm the kill switch. Pure state transition; no backend call until
    /// [`Self::confirm_emergency_stop`].
    pub fn request_emergency_stop(&self) {
        self.state.lock().emergency_pending = true;
    }

    pub fn cancel_emergency_stop(&self) {
        self.state.lock().emergency_pending = false;
    }

    pub fn emergency_confirm_pending(&self) -> bool {
        self.state.lock().emergency_pending
    }

    /// Fire the kill switch: liquidate everything and halt the engine.
    ///
    /// Returns the number of liquidated positions. On failure the session
    /// state is exactly what it was before the attempt; an emergency stop
    /// must never claim success it did not get.
    pub async fn confirm_emergency_stop(&self, reason: &str) -> Result<u32, ControlError> {
        let _guard = InFlight::acquire(&self.emergency_guard, "emergency stop")?;
        {
            let mut state = self.state.lock();
            if !state.emergency_pending {
                return Err(ControlError::NothingPending("emergency stop"));
            }
            state.emergency_pending = false;
        }

        warn!(reason, "issuing emergency stop");
        match self.api.emergency_stop(reason).await {
            Ok(response) => {
                {
                    let mut state = self.state.lock();
                    state.session.is_running = false;
                    state.portfolio = None;
                    state.alerts.push(
                        AlertKind::Danger,
                        "Emergency stop",
                        format!("Liquidated {} positions", response.closed_positions),
                    );
                }
                self.poll().await;
                Ok(response.closed_positions)
            }
            Err(error) => {
                warn!(%error, "emergency stop failed");
                self.state
                    .lock()
                    .alerts
                    .push(AlertKind::Danger, "Emergency stop failed", error.detail());
                Err(error)
            }
        }
    }

    /// Record a push-delivered notice in the alert feed.
    pub fn ingest_notice(&self, notice: &FeedNotice) {
        self.state.lock().alerts.push_notice(notice);
    }

    pub fn session(&self) -> TradingSession {
        self.state.lock().session.clone()
    }

    pub fn portfolio(&self) -> Option<Portfolio> {
        self.state.lock().portfolio.clone()
    }

    /// Alerts newest-first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.state.lock().alerts.iter().cloned().collect()
    }

    pub fn unread_alerts(&self) -> usize {
        self.state.lock().alerts.unread_count()
    }

    pub fn acknowledge(&self, id: u64) {
        self.state.lock().alerts.mark_read(id);
    }

    pub fn acknowledge_all(&self) {
        self.state.lock().alerts.mark_all_read();
    }

    pub fn pending_start(&self) -> Option<TradingMode> {
        self.state.lock().pending_start.as_ref().map(|request| request.mode)
    }

    pub fn pending_stop(&self) -> bool {
        self.state.lock().pending_stop
    }
}

/// Handle to the background poll loop. Dropping it aborts the task;
/// [`PollHandle::shutdown`] stops it and waits.
#[derive(Debug)]
pub struct PollHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PollHandle {
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Start the fixed-cadence poll loop: one immediate poll, then one per
/// `period`. The timer is always active while the handle lives; the
/// portfolio gating happens inside [`DashboardController::poll`].
pub fn spawn_poll_loop<A>(
    controller: Arc<DashboardController<A>>,
    period: Duration,
) -> PollHandle
where
    A: EngineApi + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => controller.poll().await,
                _ = shutdown_rx.changed() => break,
            }
        }
    });

    PollHandle {
        shutdown_tx,
        task: Some(task),
    }
}
