//! WebSocket connection manager for the price feed.
//!
//! Owns exactly one connection at a time and reconnects forever with a
//! constant delay. The connect/read/reconnect loop runs in a single
//! spawned task; at most one reconnect sleep is pending at any moment, and
//! teardown cancels it together with the live socket on every exit path.

use crate::error::FeedError;
use crate::protocol::{decode_frame, InboundMessage, OutboundCommand};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Lifecycle of the single feed connection. Exactly one socket is live at
/// a time; a reconnect fully supersedes the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Between connections, with the reconnect sleep pending
    ReconnectPending,
}

/// Feed client configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Price server WebSocket URL
    pub url: String,
    /// Delay between a terminal close and the next connection attempt
    pub reconnect_delay: Duration,
    /// Buffer size of the decoded-message channel
    pub channel_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765/ws/prices".to_string(),
            reconnect_delay: Duration::from_secs(5),
            channel_buffer_size: 1000,
        }
    }
}

impl FeedConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

/// Handle to the running feed task.
///
/// Dropping the handle tears the task down; [`FeedHandle::close`] does the
/// same but waits for the socket to be released.
#[derive(Debug)]
pub struct FeedHandle {
    command_tx: mpsc::UnboundedSender<OutboundCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

/// Start the feed client. Returns the control handle and the stream of
/// decoded inbound messages, in arrival order.
pub fn connect(config: FeedConfig) -> (FeedHandle, mpsc::Receiver<InboundMessage>) {
    let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(run_feed_loop(
        config,
        command_rx,
        event_tx,
        state_tx,
        shutdown_rx,
    ));

    (
        FeedHandle {
            command_tx,
            state_rx,
            shutdown_tx,
            task: Some(task),
        },
        event_rx,
    )
}

impl FeedHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch channel for observing connectivity transitions.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Send a command to the server.
    ///
    /// A no-op unless the connection is currently up: commands are dropped,
    /// not queued, so callers must not assume delivery.
    pub fn send(&self, command: OutboundCommand) {
        if self.state() != ConnectionState::Connected {
            debug!(?command, "not connected, dropping outbound command");
            return;
        }
        if self.command_tx.send(command).is_err() {
            debug!("feed task already stopped, dropping outbound command");
        }
    }

    /// Stop the feed: cancels any pending reconnect sleep, closes a live
    /// socket, and waits for the task to finish.
    pub async fn close(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Connect / read / reconnect loop. Unbounded retry with constant backoff.
async fn run_feed_loop(
    config: FeedConfig,
    mut command_rx: mpsc::UnboundedReceiver<OutboundCommand>,
    event_tx: mpsc::Sender<InboundMessage>,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(url = %config.url, "starting price feed client");

    loop {
        state_tx.send_replace(ConnectionState::Connecting);

        let connected = tokio::select! {
            result = connect_async(&config.url) => result,
            _ = shutdown_rx.changed() => break,
        };

        match connected {
            Ok((stream, _)) => {
                info!(url = %config.url, "connected to price server");
                state_tx.send_replace(ConnectionState::Connected);

                let (mut write, mut read) = stream.split();

                'connection: loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            let _ = write.send(Message::Close(None)).await;
                            state_tx.send_replace(ConnectionState::Disconnected);
                            return;
                        }
                        command = command_rx.recv() => match command {
                            Some(command) => {
                                if let Err(error) =
                                    write.send(Message::Text(command.encode().into())).await
                                {
                                    error!(%error, "failed to send command, closing connection");
                                    break 'connection;
                                }
                            }
                            // All handles dropped; nothing left to serve.
                            None => {
                                let _ = write.send(Message::Close(None)).await;
                                state_tx.send_replace(ConnectionState::Disconnected);
                                return;
                            }
                        },
                        frame = read.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(message) = decode_frame(&text) {
                                    if event_tx.send(message).await.is_err() {
                                        warn!("event receiver dropped, stopping feed client");
                                        state_tx.send_replace(ConnectionState::Disconnected);
                                        return;
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) => {
                                info!("server closed connection");
                                break 'connection;
                            }
                            // Heartbeats are answered by tungstenite itself
                            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                            Some(Ok(_)) => {}
                            Some(Err(error)) => {
                                let error = FeedError::Transport(error);
                                error!(%error, "websocket error");
                                break 'connection;
                            }
                            None => {
                                info!("websocket stream ended");
                                break 'connection;
                            }
                        },
                    }
                }

                state_tx.send_replace(ConnectionState::Disconnected);
            }
            Err(error) => {
                let error = FeedError::Transport(error);
                error!(url = %config.url, %error, "failed to connect to price server");
                state_tx.send_replace(ConnectionState::Disconnected);
            }
        }

        state_tx.send_replace(ConnectionState::ReconnectPending);
        debug!(delay = ?config.reconnect_delay, "waiting before reconnecting");
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    state_tx.send_replace(ConnectionState::Disconnected);
}
