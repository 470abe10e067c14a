//! WebSocket transport implementation

use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    client_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue},
    WebSocketStream,
};
use tracing::debug;

use crate::error::{Result, TransportError};

use lightctl_core::DEFAULT_PATH;

/// Established client connection to a node
pub type WsStream = WebSocketStream<TcpStream>;

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Request path
    pub path: String,
    /// Sent as `User-Agent` in the upgrade request
    pub client_id: String,
    /// Bound on the TCP connect phase
    pub connect_timeout: Duration,
    /// Bound on the upgrade handshake
    pub handshake_timeout: Duration,
    /// Connection is dropped when nothing arrives for this long.
    /// Only enforced while `keep_alive` is on.
    pub idle_timeout: Duration,
    /// Send pings every `idle_timeout / 2` so the peer keeps answering.
    /// When off, a silent connection is kept open indefinitely.
    pub keep_alive: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            client_id: "Music Quiz".to_string(),
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(10),
            keep_alive: true,
        }
    }
}

impl WebSocketConfig {
    /// Interval between keep-alive pings, `None` when disabled
    pub fn ping_interval(&self) -> Option<Duration> {
        if self.keep_alive {
            Some(self.idle_timeout / 2)
        } else {
            None
        }
    }

    pub fn url(&self, host: &str, port: u16) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("ws://{}:{}{}", authority_host(host), port, path)
    }
}

/// IPv6 literals must be bracketed inside a URL authority
fn authority_host(host: &str) -> String {
    match host.parse::<Ipv6Addr>() {
        Ok(addr) => format!("[{}]", addr),
        Err(_) => host.to_string(),
    }
}

/// Connect to the first reachable endpoint within the connect timeout
pub async fn connect_tcp(addrs: &[SocketAddr], config: &WebSocketConfig) -> Result<TcpStream> {
    let attempt = async {
        let mut last_err = None;
        for addr in addrs {
            debug!("Connecting TCP to {}", addr);
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => TransportError::ConnectionFailed(e.to_string()),
            None => TransportError::ConnectionFailed("no endpoints".to_string()),
        })
    };

    tokio::time::timeout(config.connect_timeout, attempt)
        .await
        .map_err(|_| TransportError::Timeout("connect"))?
}

/// Upgrade an established TCP stream to a WebSocket
pub async fn handshake(
    stream: TcpStream,
    host: &str,
    port: u16,
    config: &WebSocketConfig,
) -> Result<WsStream> {
    let url = config.url(host, port);
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

    let agent = HeaderValue::from_str(&config.client_id)
        .map_err(|e| TransportError::InvalidHeader(e.to_string()))?;
    request.headers_mut().insert("User-Agent", agent);

    let upgrade = client_async(request, stream);
    let (ws, response) = tokio::time::timeout(config.handshake_timeout, upgrade)
        .await
        .map_err(|_| TransportError::Timeout("handshake"))?
        .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;

    debug!("WebSocket handshake with {} done: {}", url, response.status());
    Ok(ws)
}
