//! Integration tests driving the feed client against an in-process
//! WebSocket server.

use cockpit_feed::{
    connect, ConnectionState, FeedConfig, InboundMessage, OutboundCommand, PriceCache,
};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/prices", listener.local_addr().unwrap());
    (listener, url)
}

async fn wait_for_state(
    rx: &mut watch::Receiver<ConnectionState>,
    target: ConnectionState,
) {
    timeout(TEST_TIMEOUT, async {
        loop {
            if *rx.borrow() == target {
                return;
            }
            rx.changed().await.expect("feed task gone");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {target:?}"));
}

fn snapshot_json(symbol: &str, price: f64) -> String {
    format!(
        r#"{{"symbol":"{symbol}","timestamp":"2025-06-02T14:30:00Z",
            "open":{price},"high":{price},"low":{price},"close":{price},
            "volume":1000.0,"current_price":{price}}}"#
    )
}

#[tokio::test]
async fn test_reconnects_with_constant_delay_after_server_close() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));

    // Server accepts and immediately closes every connection.
    let server_accepts = Arc::clone(&accepts);
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            server_accepts.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut ws) = accept_async(stream).await {
                let _ = ws.close(None).await;
            }
        }
    });

    let config = FeedConfig::new(url).with_reconnect_delay(Duration::from_millis(100));
    let (handle, _events) = connect(config);

    // ~450ms of closes at a 100ms constant delay: one immediate attempt
    // plus roughly one per delay tick afterwards.
    tokio::time::sleep(Duration::from_millis(450)).await;
    let seen = accepts.load(Ordering::SeqCst);
    assert!(
        (3..=6).contains(&seen),
        "expected 3..=6 connection attempts, saw {seen}"
    );

    handle.close().await;
}

#[tokio::test]
async fn test_close_cancels_pending_reconnect() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));

    let server_accepts = Arc::clone(&accepts);
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            server_accepts.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut ws) = accept_async(stream).await {
                let _ = ws.close(None).await;
            }
        }
    });

    let config = FeedConfig::new(url).with_reconnect_delay(Duration::from_millis(100));
    let (handle, _events) = connect(config);

    // Let at least one connect/close cycle happen, then tear down while
    // the reconnect sleep is pending.
    timeout(TEST_TIMEOUT, async {
        while accepts.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("server never saw a connection");

    handle.close().await;
    let at_close = accepts.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        accepts.load(Ordering::SeqCst),
        at_close,
        "connection attempts continued after close"
    );
}

#[tokio::test]
async fn test_send_while_disconnected_is_dropped_not_queued() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();

    // First connection is closed immediately; later connections stay open
    // and forward every received text frame.
    let server_accepts = Arc::clone(&accepts);
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let n = server_accepts.fetch_add(1, Ordering::SeqCst);
            let Ok(mut ws) = accept_async(stream).await else {
                continue;
            };
            if n == 0 {
                let _ = ws.close(None).await;
                continue;
            }
            let frame_tx = frame_tx.clone();
            tokio::spawn(async move {
                while let Some(Ok(Message::Text(text))) = ws.next().await {
                    let _ = frame_tx.send(text.to_string());
                }
            });
        }
    });

    let config = FeedConfig::new(url).with_reconnect_delay(Duration::from_millis(200));
    let (handle, _events) = connect(config);
    let mut states = handle.state_watch();

    // Wait out the first connect/close cycle, then send mid-reconnect.
    timeout(TEST_TIMEOUT, async {
        while accepts.load(Ordering::SeqCst) < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_ne!(handle.state(), ConnectionState::Connected);
    handle.send(OutboundCommand::subscribe(["AAPL"]));

    // Second connection comes up; only a command sent while connected
    // reaches the server.
    wait_for_state(&mut states, ConnectionState::Connected).await;
    handle.send(OutboundCommand::get_latest(["AAPL"]));

    let first = timeout(TEST_TIMEOUT, frame_rx.recv())
        .await
        .expect("no frame within timeout")
        .expect("server frame channel closed");
    assert_eq!(first, r#"{"action":"get_latest","symbols":["AAPL"]}"#);

    // The dropped subscribe must not surface later.
    let extra = timeout(Duration::from_millis(200), frame_rx.recv()).await;
    assert!(extra.is_err(), "dropped command was delivered: {extra:?}");

    handle.close().await;
}

#[tokio::test]
async fn test_push_then_bulk_updates_cache_last_write_wins() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        // Wait for the subscribe before pushing.
        let subscribe = ws.next().await.unwrap().unwrap();
        assert!(subscribe.to_text().unwrap().contains("subscribe"));

        let update = format!(
            r#"{{"type":"price_update","symbol":"AAPL","data":{}}}"#,
            snapshot_json("AAPL", 190.5)
        );
        let bulk = format!(
            r#"{{"type":"latest_prices","data":[{},{}]}}"#,
            snapshot_json("AAPL", 191.0),
            snapshot_json("TSLA", 250.0)
        );
        ws.send(Message::Text(update.into())).await.unwrap();
        // A malformed frame in between must be dropped without breaking
        // the connection or the messages around it.
        ws.send(Message::Text("{broken".into())).await.unwrap();
        ws.send(Message::Text(bulk.into())).await.unwrap();

        // Hold the connection open until the client goes away.
        while ws.next().await.is_some() {}
    });

    let config = FeedConfig::new(url).with_reconnect_delay(Duration::from_millis(100));
    let (handle, mut events) = connect(config);
    let mut states = handle.state_watch();
    wait_for_state(&mut states, ConnectionState::Connected).await;

    handle.send(OutboundCommand::subscribe(["AAPL", "TSLA"]));

    let mut cache = PriceCache::new();
    for _ in 0..2 {
        let message = timeout(TEST_TIMEOUT, events.recv())
            .await
            .expect("no message within timeout")
            .expect("event channel closed");
        match message {
            InboundMessage::PriceUpdate(snapshot) => cache.apply(snapshot),
            InboundMessage::LatestPrices(snapshots) => cache.apply_bulk(snapshots),
            InboundMessage::Notice(_) => {}
        }
    }

    let view = cache.read();
    assert_eq!(view["AAPL"].current_price, 191.0);
    assert_eq!(view["TSLA"].current_price, 250.0);

    handle.close().await;
}
