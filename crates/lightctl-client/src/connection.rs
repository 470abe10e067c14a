//! Connection loop
//!
//! Runs on the client's own thread inside a current-thread runtime:
//! resolve, connect, handshake, then read and write until the connection
//! fails, closes or stop is requested, and start over.

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use lightctl_core::SharedDeviceState;
use lightctl_transport::websocket::{self, WsStream};
use lightctl_transport::{Result, TransportError};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::client::{ConnectionState, Shared};
use crate::queue::OutboundQueue;

const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

pub(crate) struct Connection {
    shared: Arc<Shared>,
    writes: mpsc::UnboundedReceiver<Bytes>,
}

impl Connection {
    pub(crate) fn new(shared: Arc<Shared>, writes: mpsc::UnboundedReceiver<Bytes>) -> Self {
        Self { shared, writes }
    }

    /// Thread body
    pub(crate) fn run(mut self) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build();

        match runtime {
            Ok(runtime) => {
                runtime.block_on(self.run_loop());
                // Do not wait on a pending getaddrinfo
                runtime.shutdown_background();
            }
            Err(e) => error!("Failed to start connection runtime: {}", e),
        }

        self.shutdown();
    }

    async fn run_loop(&mut self) {
        let shared = Arc::clone(&self.shared);
        let host = shared.config.hostname.as_str();
        let port = shared.config.port;

        if host.is_empty() {
            debug!("No hostname configured, connection loop not started");
            return;
        }

        while !shared.stopping() {
            let result = self.session().await;
            shared.set_connected(false);
            shared.set_state(ConnectionState::Disconnected);

            if shared.stopping() {
                break;
            }
            match result {
                Ok(()) => {}
                Err(e) => warn!("Connection to {}:{} lost: {}", host, port, e),
            }

            let delay = shared.config.reconnect_delay;
            if !delay.is_zero() && self.offline(tokio::time::sleep(delay)).await.is_none() {
                break;
            }
        }
    }

    /// One pass through the state machine. `Ok` only when stop was requested.
    async fn session(&mut self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let config = &shared.config;
        let host = config.hostname.as_str();

        shared.set_state(ConnectionState::Resolving);
        let resolver = Arc::clone(&shared.resolver);
        let Some(addrs) = self.offline(resolver.resolve(host, config.port)).await else {
            return Ok(());
        };
        let addrs = addrs?;

        shared.set_state(ConnectionState::Connecting);
        let Some(tcp) = self
            .offline(websocket::connect_tcp(&addrs, &config.websocket))
            .await
        else {
            return Ok(());
        };
        let tcp = tcp?;

        shared.set_state(ConnectionState::Handshaking);
        let Some(ws) = self
            .offline(websocket::handshake(tcp, host, config.port, &config.websocket))
            .await
        else {
            return Ok(());
        };
        let ws = ws?;

        info!("Connected to LightControl node {}:{}", host, config.port);
        shared.set_connected(true);
        shared.set_state(ConnectionState::Connected);
        shared.notify_connected();

        self.serve(ws).await
    }

    /// Drive `fut` while no connection exists. Writes arriving meanwhile
    /// fail immediately. Returns `None` if stop is requested first.
    async fn offline<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                out = &mut fut => return Some(out),
                Some(data) = self.writes.recv() => self.shared.fail_write(data),
                _ = self.shared.stopped() => return None,
            }
        }
    }

    async fn serve(&mut self, ws: WsStream) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let ws_config = &shared.config.websocket;
        let (mut sink, mut stream) = ws.split();
        let mut writing = false;

        let result = {
            // Idle detection relies on pings being answered
            let idle_timeout = ws_config.ping_interval().map(|_| ws_config.idle_timeout);
            let read = read_frames(&mut stream, &shared.device, idle_timeout);
            let write = write_frames(
                &mut sink,
                &mut self.writes,
                &shared.queue,
                ws_config.ping_interval(),
                &mut writing,
            );
            tokio::select! {
                r = read => r,
                r = write => r,
                _ = shared.stopped() => Ok(()),
            }
        };

        // A write cut short never completes on its own
        if writing {
            shared.release_write_slot();
        }

        if shared.stopping() {
            let close = sink.send(WsMessage::Close(None));
            if tokio::time::timeout(CLOSE_TIMEOUT, close).await.is_err() {
                debug!("Close frame not sent within {:?}", CLOSE_TIMEOUT);
            }
        }

        result
    }

    fn shutdown(&mut self) {
        self.writes.close();
        while let Ok(data) = self.writes.try_recv() {
            self.shared.fail_write(data);
        }
        self.shared.set_connected(false);
        self.shared.set_state(ConnectionState::Stopped);
        self.shared.set_running(false);
    }
}

async fn read_frames(
    stream: &mut SplitStream<WsStream>,
    device: &SharedDeviceState,
    idle_timeout: Option<Duration>,
) -> Result<()> {
    loop {
        let frame = match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| TransportError::Timeout("idle"))?,
            None => stream.next().await,
        };

        match frame {
            Some(Ok(WsMessage::Binary(data))) => {
                device.parse_message(&data);
            }
            Some(Ok(WsMessage::Text(text))) => {
                debug!("Ignoring {} byte text frame", text.len());
            }
            Some(Ok(WsMessage::Close(frame))) => {
                let reason = frame.map(|f| f.reason.to_string());
                info!("Node closed connection: {:?}", reason);
                return Err(TransportError::ConnectionClosed);
            }
            // Ping, pong and raw frames only keep the connection alive
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Err(TransportError::ConnectionClosed),
        }
    }
}

async fn write_frames(
    sink: &mut SplitSink<WsStream, WsMessage>,
    writes: &mut mpsc::UnboundedReceiver<Bytes>,
    queue: &OutboundQueue,
    ping_interval: Option<Duration>,
    writing: &mut bool,
) -> Result<()> {
    let mut ping = ping_interval.map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            Some(data) = writes.recv() => {
                let mut next = Some(data);
                while let Some(data) = next {
                    *writing = true;
                    sink.send(WsMessage::Binary(data.to_vec())).await?;
                    *writing = false;
                    next = queue.complete(Instant::now());
                }
            }
            _ = tick(&mut ping) => {
                sink.send(WsMessage::Ping(Vec::new())).await?;
            }
            else => return Err(TransportError::ConnectionClosed),
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
