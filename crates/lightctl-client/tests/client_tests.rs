//! Client tests (lightctl-client)
//!
//! Runs the client against an in-process WebSocket server on loopback
//! and against resolvers that always fail.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use lightctl_client::{ConnectionState, LightControlClient};
use lightctl_core::{Compose, LightMode, PackageType, Rainbow, Strobe};
use lightctl_transport::{Resolver, TransportError};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

const WAIT: Duration = Duration::from_secs(5);

async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<tokio::net::TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

struct FailingResolver {
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Resolver for FailingResolver {
    async fn resolve(&self, host: &str, _port: u16) -> lightctl_transport::Result<Vec<SocketAddr>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::ResolveFailed {
            host: host.to_string(),
            reason: "simulated".to_string(),
        })
    }
}

fn failing_client(attempts: Arc<AtomicUsize>) -> LightControlClient {
    LightControlClient::builder("lightcontrol.test", 80)
        .resolver(FailingResolver { attempts })
        .reconnect_delay(Duration::from_millis(10))
        .build()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_idle_before_start() {
    let client = LightControlClient::new("127.0.0.1", 9);
    assert!(!client.is_connected());
    assert!(!client.is_running());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.connection_string(), "Disconnected (127.0.0.1:9)");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_handshake_and_disconnect() {
    let (listener, addr) = bind().await;
    let (go_tx, go_rx) = oneshot::channel::<()>();
    let (close_tx, close_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // Hold the upgrade until the test has looked at the client
        go_rx.await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        close_rx.await.unwrap();
        ws.close(None).await.unwrap();
        listener
    });

    let client = LightControlClient::builder("127.0.0.1", addr.port())
        .reconnect_delay(Duration::from_millis(50))
        .build();
    client.start().unwrap();
    assert!(client.is_running());

    wait_for("handshake start", || {
        client.state() == ConnectionState::Handshaking
    })
    .await;
    assert!(!client.is_connected());

    go_tx.send(()).unwrap();
    wait_for("connected", || client.is_connected()).await;
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(client
        .connection_string()
        .starts_with(&format!("Connected to 127.0.0.1:{}", addr.port())));

    close_tx.send(()).unwrap();
    wait_for("disconnect", || !client.is_connected()).await;
    assert!(client.is_running());

    let _listener = server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_inbound_frames_update_device_state() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let mut nodes = vec![PackageType::NodeInfo.as_u8()];
        nodes.extend_from_slice(&1u32.to_le_bytes());
        let mut chunk = vec![0u8; 113];
        chunk[24] = 5;
        chunk[25..30].copy_from_slice(b"stage");
        nodes.extend_from_slice(&chunk);

        ws.send(WsMessage::Binary(LightMode::color(9, 8, 7).compose().to_vec()))
            .await
            .unwrap();
        ws.send(WsMessage::Binary(vec![0xfe, 1, 2])).await.unwrap();
        ws.send(WsMessage::Binary(vec![PackageType::Strobe.as_u8(), 1]))
            .await
            .unwrap();
        ws.send(WsMessage::Binary(nodes)).await.unwrap();
        // Keep the connection open until the client goes away
        while let Some(Ok(_)) = ws.next().await {}
    });

    let client = LightControlClient::new("127.0.0.1", addr.port());
    client.start().unwrap();

    wait_for("node list", || client.device_state().nodes.len() == 1).await;
    let state = client.device_state();
    assert_eq!(state.light_mode, Some(LightMode::color(9, 8, 7)));
    assert!(state.strobe.is_none(), "undersized strobe must be dropped");
    assert!(client.is_connected(), "malformed frames must not disconnect");
    assert_eq!(state.nodes[0].name, "stage");
    assert_eq!(
        client.connection_string(),
        format!("Connected to 127.0.0.1:{} (1 node: stage)", addr.port())
    );

    drop(client);
    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connected_callback_and_fifo_sends() {
    let (listener, addr) = bind().await;
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let _server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        while let Some(Ok(msg)) = ws.next().await {
            if let WsMessage::Binary(data) = msg {
                let _ = frames_tx.send(data);
            }
        }
    });

    let greeted = Arc::new(AtomicUsize::new(0));
    let greeted_cb = greeted.clone();
    let client = LightControlClient::builder("127.0.0.1", addr.port())
        .client_id("Music Quiz Tests")
        .on_connected(move |handle| {
            greeted_cb.fetch_add(1, Ordering::SeqCst);
            assert!(handle.is_connected());
            handle.send_message(&LightMode::color(0, 0, 255)).unwrap();
        })
        .build();
    client.start().unwrap();

    let first = tokio::time::timeout(WAIT, frames_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, LightMode::color(0, 0, 255).compose().to_vec());
    assert_eq!(greeted.load(Ordering::SeqCst), 1);

    let sent: Vec<Vec<u8>> = (1..=3u32)
        .map(|i| Rainbow { update_rate_ms: i }.compose().to_vec())
        .collect();
    for i in 1..=3u32 {
        client
            .send_message_timeout(&Rainbow { update_rate_ms: i }, Duration::from_secs(5))
            .unwrap();
    }

    for expected in sent {
        let frame = tokio::time::timeout(WAIT, frames_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, expected);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connects_to_ipv6_literal() {
    let listener = TcpListener::bind("[::1]:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let _server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    let client = LightControlClient::builder("::1", addr.port())
        .reconnect_delay(Duration::from_millis(50))
        .build();
    client.start().unwrap();

    wait_for("connected over IPv6", || client.is_connected()).await;
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_quiet_connection_kept_without_keep_alive() {
    let (listener, addr) = bind().await;

    let _server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    let connects = Arc::new(AtomicUsize::new(0));
    let counter = connects.clone();
    let client = LightControlClient::builder("127.0.0.1", addr.port())
        .keep_alive(false)
        .idle_timeout(Duration::from_millis(200))
        .reconnect_delay(Duration::from_millis(10))
        .on_connected(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    client.start().unwrap();

    wait_for("connected", || client.is_connected()).await;
    // Several idle periods without a single frame in either direction
    tokio::time::sleep(Duration::from_millis(800)).await;

    assert!(client.is_connected());
    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Retry and failure paths
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_resolve_failure_is_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let states = Arc::new(Mutex::new(Vec::new()));

    let client = failing_client(attempts.clone());
    let recorded = states.clone();
    client.add_state_callback(move |state| recorded.lock().push(state));
    client.start().unwrap();

    wait_for("second resolve", || attempts.load(Ordering::SeqCst) >= 2).await;
    assert!(!client.is_connected());

    let states = states.lock().clone();
    assert_eq!(states[0], ConnectionState::Resolving);
    assert_eq!(states[1], ConnectionState::Disconnected);
    assert_eq!(states[2], ConnectionState::Resolving);
    assert!(!states.contains(&ConnectionState::Connecting));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sends_while_disconnected_do_not_pile_up() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let client = failing_client(attempts.clone());
    client.start().unwrap();
    wait_for("first resolve", || attempts.load(Ordering::SeqCst) >= 1).await;

    for i in 0..20u32 {
        client
            .send_message(&Strobe {
                on_time_us: i,
                off_time_us: i,
            })
            .unwrap();
    }

    wait_for("queue drained", || client.queued_messages() == 0).await;
    // Slot is free again: the next send must not be rejected
    client.send_message(&LightMode::off()).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_refused_keeps_retrying() {
    let (listener, addr) = bind().await;
    drop(listener);

    let states = Arc::new(Mutex::new(Vec::new()));
    let recorded = states.clone();
    let client = LightControlClient::builder("127.0.0.1", addr.port())
        .reconnect_delay(Duration::from_millis(10))
        .on_state_change(move |state| recorded.lock().push(state))
        .build();
    client.start().unwrap();

    wait_for("repeated connect attempts", || {
        states
            .lock()
            .iter()
            .filter(|s| **s == ConnectionState::Connecting)
            .count()
            >= 2
    })
    .await;
    assert!(!client.is_connected());
    assert!(client.is_running());
}

#[tokio::test]
async fn test_empty_hostname_never_connects() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let client = LightControlClient::builder("", 80)
        .resolver(FailingResolver {
            attempts: attempts.clone(),
        })
        .build();
    client.start().unwrap();

    wait_for("loop exit", || !client.is_running()).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
    assert_eq!(client.connection_string(), "No LightControl host configured");

    // Sends are accepted and dropped, never stuck in flight
    client.send_message(&LightMode::off()).unwrap();
    client.send_message(&LightMode::off()).unwrap();
    assert_eq!(client.queued_messages(), 0);
}

#[tokio::test]
async fn test_start_is_idempotent_and_drop_stops() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let client = failing_client(attempts.clone());
    client.start().unwrap();
    client.start().unwrap();

    let handle = client.handle();
    assert!(handle.is_running());
    drop(client);

    assert!(!handle.is_running());
    assert!(!handle.is_connected());
    assert_eq!(handle.state(), ConnectionState::Stopped);
}
