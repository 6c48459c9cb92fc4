//! Headless cockpit runner: wires the price feed and the dashboard
//! controller together and logs what a UI would render.

use cockpit_control::{spawn_poll_loop, DashboardController, RestEngineClient, POLL_INTERVAL};
use cockpit_feed::{connect, ConnectionState, FeedConfig, InboundMessage, OutboundCommand, PriceCache};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    init_logging();

    // Configurable via environment, with local-development defaults.
    let ws_url = std::env::var("COCKPIT_WS_URL")
        .unwrap_or_else(|_| "ws://127.0.0.1:8765/ws/prices".to_string());
    let api_url =
        std::env::var("COCKPIT_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
    let symbols: Vec<String> = std::env::var("COCKPIT_SYMBOLS")
        .unwrap_or_else(|_| "AAPL,MSFT,TSLA".to_string())
        .split(',')
        .map(|symbol| symbol.trim().to_string())
        .filter(|symbol| !symbol.is_empty())
        .collect();

    info!(%ws_url, %api_url, ?symbols, "starting cockpit console");

    let engine = match RestEngineClient::new(api_url) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to build engine client");
            return;
        }
    };
    let controller = Arc::new(DashboardController::new(engine));
    let poller = spawn_poll_loop(Arc::clone(&controller), POLL_INTERVAL);

    let (feed, mut events) = connect(FeedConfig::new(ws_url));
    let mut states = feed.state_watch();
    let mut cache = PriceCache::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, shutting down");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow();
                info!(?state, "feed connection state changed");
                // (Re)subscribe on every fresh connection; the server does
                // not persist subscriptions across a reconnect.
                if state == ConnectionState::Connected {
                    feed.send(OutboundCommand::subscribe(symbols.iter().cloned()));
                    feed.send(OutboundCommand::get_latest(Vec::<String>::new()));
                }
            }
            event = events.recv() => match event {
                Some(InboundMessage::PriceUpdate(snapshot)) => {
                    debug!(symbol = %snapshot.symbol, price = snapshot.current_price, "price update");
                    cache.apply(snapshot);
                }
                Some(InboundMessage::LatestPrices(snapshots)) => {
                    debug!(count = snapshots.len(), "bulk price response");
                    cache.apply_bulk(snapshots);
                }
                Some(InboundMessage::Notice(notice)) => {
                    info!(kind = %notice.kind, message = ?notice.message, "server notice");
                    controller.ingest_notice(&notice);
                }
                None => {
                    warn!("feed event channel closed");
                    break;
                }
            }
        }
    }

    let session = controller.session();
    info!(
        running = session.is_running,
        tracked = cache.len(),
        unread_alerts = controller.unread_alerts(),
        "final state"
    );

    poller.shutdown().await;
    feed.close().await;
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
