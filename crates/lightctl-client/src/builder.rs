//! Client configuration and builder

use lightctl_core::DEFAULT_PORT;
use lightctl_transport::{DnsResolver, Resolver, WebSocketConfig};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{ClientHandle, ConnectionState, LightControlClient};

/// Default time a queued message may wait before it is discarded
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default backlog bound of the outbound queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Callback run once per successful handshake
pub type ConnectedCallback = Box<dyn Fn(&ClientHandle) + Send + Sync>;

/// Callback run on every connection state transition
pub type StateCallback = Box<dyn Fn(ConnectionState) + Send + Sync>;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Node hostname or address. Empty means not configured.
    pub hostname: String,
    pub port: u16,
    pub websocket: WebSocketConfig,
    /// Pause between a failed or closed connection and the next attempt
    pub reconnect_delay: Duration,
    pub send_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            port: DEFAULT_PORT,
            websocket: WebSocketConfig::default(),
            reconnect_delay: Duration::from_millis(500),
            send_timeout: DEFAULT_SEND_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Builder for [`LightControlClient`]
pub struct ClientBuilder {
    config: ClientConfig,
    resolver: Arc<dyn Resolver>,
    connected_callbacks: Vec<ConnectedCallback>,
    state_callbacks: Vec<StateCallback>,
}

impl ClientBuilder {
    pub fn new(hostname: &str, port: u16) -> Self {
        Self::from_config(ClientConfig {
            hostname: hostname.to_string(),
            port,
            ..Default::default()
        })
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(DnsResolver),
            connected_callbacks: Vec::new(),
            state_callbacks: Vec::new(),
        }
    }

    /// Identifier sent in the upgrade request
    pub fn client_id(mut self, id: &str) -> Self {
        self.config.websocket.client_id = id.to_string();
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.config.websocket.path = path.to_string();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.websocket.connect_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.websocket.handshake_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.websocket.idle_timeout = timeout;
        self
    }

    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.config.websocket.keep_alive = enabled;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Replace the system resolver
    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn on_connected<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ClientHandle) + Send + Sync + 'static,
    {
        self.connected_callbacks.push(Box::new(callback));
        self
    }

    pub fn on_state_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.state_callbacks.push(Box::new(callback));
        self
    }

    /// Build the client. The connection loop is not running until `start()`.
    pub fn build(self) -> LightControlClient {
        LightControlClient::from_parts(
            self.config,
            self.resolver,
            self.connected_callbacks,
            self.state_callbacks,
        )
    }
}
