//! LightControl Transport Layer
//!
//! WebSocket over TCP, the only transport LightControl nodes speak:
//! - hostname resolution behind the [`Resolver`] trait
//! - TCP connect bounded by a connect timeout
//! - upgrade handshake carrying a client identifier

pub mod error;
pub mod traits;
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{DnsResolver, Resolver};
pub use websocket::{WebSocketConfig, WsStream};
