//! LightControl Client Library
//!
//! Keeps a WebSocket connection to one LightControl node alive on a
//! background thread and decodes everything the node reports into a
//! [`DeviceState`](lightctl_core::DeviceState).
//!
//! # Example
//!
//! ```ignore
//! use lightctl_client::LightControlClient;
//! use lightctl_core::LightMode;
//!
//! let client = LightControlClient::builder("192.168.4.1", 80)
//!     .client_id("Music Quiz")
//!     .on_connected(|client| {
//!         let _ = client.send_message(&LightMode::color(0, 0, 255));
//!     })
//!     .build();
//! client.start()?;
//!
//! client.send_message(&LightMode::color(255, 0, 0))?;
//! println!("{}", client.connection_string());
//! ```

pub mod builder;
pub mod client;
mod connection;
pub mod error;
pub mod queue;

pub use builder::{ClientBuilder, ClientConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_SEND_TIMEOUT};
pub use client::{ClientHandle, ConnectionState, LightControlClient};
pub use error::{ClientError, Result};
pub use queue::{OutboundQueue, PendingMessage, Submit};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::ClientBuilder;
    pub use crate::client::{ClientHandle, ConnectionState, LightControlClient};
    pub use crate::error::{ClientError, Result};
    pub use lightctl_core::{
        Compose, Glitter, LightMode, OnBoardLedStrength, Pulse, PulseDirection, Rainbow,
        RunningSections, Strobe,
    };
}
