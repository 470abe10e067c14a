//! LightControl client
//!
//! The client owns one background thread that runs the connection loop.
//! Calls from other threads never block on network I/O: sends are queued
//! and status queries read atomics or take short locks.

use bytes::Bytes;
use lightctl_core::{Compose, DeviceState, SharedDeviceState};
use lightctl_transport::Resolver;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info};

use crate::builder::{ClientBuilder, ClientConfig, ConnectedCallback, StateCallback};
use crate::connection::Connection;
use crate::error::Result;
use crate::queue::{OutboundQueue, Submit};

/// Connection lifecycle as seen by the background loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Resolving = 1,
    Connecting = 2,
    Handshaking = 3,
    Connected = 4,
    Stopped = 5,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Resolving,
            2 => ConnectionState::Connecting,
            3 => ConnectionState::Handshaking,
            4 => ConnectionState::Connected,
            5 => ConnectionState::Stopped,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Resolving => "Resolving",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Handshaking => "Handshaking",
            ConnectionState::Connected => "Connected",
            ConnectionState::Stopped => "Stopped",
        };
        f.write_str(text)
    }
}

/// State shared between the client, its handles and the connection thread
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) device: SharedDeviceState,
    pub(crate) queue: OutboundQueue,
    writes: mpsc::UnboundedSender<Bytes>,
    connected: AtomicBool,
    running: AtomicBool,
    stop: AtomicBool,
    wake: Notify,
    state: AtomicU8,
    connected_callbacks: RwLock<Vec<ConnectedCallback>>,
    state_callbacks: RwLock<Vec<StateCallback>>,
}

impl Shared {
    pub(crate) fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Resolves once stop has been requested
    pub(crate) async fn stopped(&self) {
        loop {
            let notified = self.wake.notified();
            if self.stopping() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state.swap(state as u8, Ordering::SeqCst);
        if previous == state as u8 {
            return;
        }
        debug!(
            "{}:{} {} -> {}",
            self.config.hostname,
            self.config.port,
            ConnectionState::from_u8(previous),
            state
        );
        for callback in self.state_callbacks.read().iter() {
            callback(state);
        }
    }

    pub(crate) fn notify_connected(self: &Arc<Self>) {
        let handle = ClientHandle {
            shared: Arc::clone(self),
        };
        for callback in self.connected_callbacks.read().iter() {
            callback(&handle);
        }
    }

    /// Hand bytes that own the write slot to the connection loop
    fn dispatch(&self, data: Bytes) {
        if let Err(mpsc::error::SendError(data)) = self.writes.send(data) {
            self.fail_write(data);
        }
    }

    /// A write that owned the slot could not be sent. Completing it drains
    /// the backlog the same way, since every further write fails as well.
    pub(crate) fn fail_write(&self, data: Bytes) {
        debug!("Dropping {} byte write: not connected", data.len());
        self.release_write_slot();
    }

    pub(crate) fn release_write_slot(&self) {
        let mut next = self.queue.complete(Instant::now());
        while let Some(data) = next {
            debug!("Dropping {} byte write: not connected", data.len());
            next = self.queue.complete(Instant::now());
        }
    }
}

/// Cloneable handle to a running client, passed to connected callbacks
#[derive(Clone)]
pub struct ClientHandle {
    shared: Arc<Shared>,
}

impl ClientHandle {
    /// Compose and send a message with the configured default timeout
    pub fn send_message<M: Compose>(&self, message: &M) -> Result<()> {
        self.send_bytes(message.compose(), self.shared.config.send_timeout)
    }

    /// Compose and send a message that is discarded if it cannot be
    /// written within `timeout`
    pub fn send_message_timeout<M: Compose>(&self, message: &M, timeout: Duration) -> Result<()> {
        self.send_bytes(message.compose(), timeout)
    }

    /// Send an already composed frame
    pub fn send_bytes(&self, data: impl Into<Bytes>, timeout: Duration) -> Result<()> {
        match self.shared.queue.submit(data.into(), timeout, Instant::now())? {
            Submit::WriteNow(data) => self.shared.dispatch(data),
            Submit::Queued => {}
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    /// Copy of the last known device state
    pub fn device_state(&self) -> DeviceState {
        self.shared.device.snapshot()
    }

    /// Messages waiting behind the in-flight write
    pub fn queued_messages(&self) -> usize {
        self.shared.queue.len()
    }

    /// True while a write holds the slot
    pub fn is_sending(&self) -> bool {
        self.shared.queue.is_in_flight()
    }

    pub fn hostname(&self) -> &str {
        &self.shared.config.hostname
    }

    pub fn port(&self) -> u16 {
        self.shared.config.port
    }

    /// Human readable connection status
    pub fn connection_string(&self) -> String {
        let config = &self.shared.config;
        if config.hostname.is_empty() {
            return "No LightControl host configured".to_string();
        }

        let state = self.state();
        if state != ConnectionState::Connected {
            return format!("{} ({}:{})", state, config.hostname, config.port);
        }

        self.shared.device.with(|device| {
            let names: Vec<&str> = device
                .nodes
                .iter()
                .map(|node| node.name.as_str())
                .filter(|name| !name.is_empty())
                .collect();
            let count = device.nodes.len();
            let noun = if count == 1 { "node" } else { "nodes" };
            if names.is_empty() {
                format!(
                    "Connected to {}:{} ({} {})",
                    config.hostname, config.port, count, noun
                )
            } else {
                format!(
                    "Connected to {}:{} ({} {}: {})",
                    config.hostname,
                    config.port,
                    count,
                    noun,
                    names.join(", ")
                )
            }
        })
    }
}

/// Client for one LightControl node
///
/// Dropping the client stops the connection loop and joins its thread.
pub struct LightControlClient {
    handle: ClientHandle,
    writes: Mutex<Option<mpsc::UnboundedReceiver<Bytes>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl LightControlClient {
    /// Client with default settings. An empty hostname leaves the client idle.
    pub fn new(hostname: &str, port: u16) -> Self {
        ClientBuilder::new(hostname, port).build()
    }

    pub fn builder(hostname: &str, port: u16) -> ClientBuilder {
        ClientBuilder::new(hostname, port)
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        resolver: Arc<dyn Resolver>,
        connected_callbacks: Vec<ConnectedCallback>,
        state_callbacks: Vec<StateCallback>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = OutboundQueue::new(config.queue_capacity);

        let shared = Arc::new(Shared {
            config,
            resolver,
            device: SharedDeviceState::new(),
            queue,
            writes: tx,
            connected: AtomicBool::new(false),
            running: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            wake: Notify::new(),
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            connected_callbacks: RwLock::new(connected_callbacks),
            state_callbacks: RwLock::new(state_callbacks),
        });

        Self {
            handle: ClientHandle { shared },
            writes: Mutex::new(Some(rx)),
            thread: Mutex::new(None),
        }
    }

    /// Spawn the connection loop. Calling it again is a no-op.
    pub fn start(&self) -> Result<()> {
        let Some(writes) = self.writes.lock().take() else {
            return Ok(());
        };

        let shared = Arc::clone(&self.handle.shared);
        shared.set_running(true);
        let thread = std::thread::Builder::new()
            .name("lightctl-client".to_string())
            .spawn(move || Connection::new(shared, writes).run());

        match thread {
            Ok(thread) => {
                *self.thread.lock() = Some(thread);
                Ok(())
            }
            Err(e) => {
                self.handle.shared.set_running(false);
                Err(e.into())
            }
        }
    }

    /// Register a callback run on the connection thread after each handshake
    ///
    /// Must not be called from inside a connected callback.
    pub fn add_connected_callback<F>(&self, callback: F)
    where
        F: Fn(&ClientHandle) + Send + Sync + 'static,
    {
        self.handle
            .shared
            .connected_callbacks
            .write()
            .push(Box::new(callback));
    }

    /// Register a callback run on every state transition
    pub fn add_state_callback<F>(&self, callback: F)
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.handle
            .shared
            .state_callbacks
            .write()
            .push(Box::new(callback));
    }

    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    pub fn send_message<M: Compose>(&self, message: &M) -> Result<()> {
        self.handle.send_message(message)
    }

    pub fn send_message_timeout<M: Compose>(&self, message: &M, timeout: Duration) -> Result<()> {
        self.handle.send_message_timeout(message, timeout)
    }

    pub fn send_bytes(&self, data: impl Into<Bytes>, timeout: Duration) -> Result<()> {
        self.handle.send_bytes(data, timeout)
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    pub fn device_state(&self) -> DeviceState {
        self.handle.device_state()
    }

    pub fn queued_messages(&self) -> usize {
        self.handle.queued_messages()
    }

    pub fn is_sending(&self) -> bool {
        self.handle.is_sending()
    }

    pub fn connection_string(&self) -> String {
        self.handle.connection_string()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.handle.shared.config
    }
}

impl Drop for LightControlClient {
    fn drop(&mut self) {
        let shared = &self.handle.shared;
        shared.stop.store(true, Ordering::SeqCst);
        shared.wake.notify_one();

        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                tracing::error!("Connection thread panicked");
            }
            info!(
                "Stopped LightControl client for {}:{}",
                shared.config.hostname, shared.config.port
            );
        }
    }
}
