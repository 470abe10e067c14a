//! LightControl Core
//!
//! Wire types and encoding for the LightControl protocol spoken by
//! ESP-mesh LED controllers.
//!
//! This crate provides:
//! - Package type tags ([`PackageType`])
//! - Message payloads and the [`Message`] sum type
//! - Binary compose/decode ([`codec`])
//! - Last-known device state and the inbound dispatcher ([`DeviceState`])

pub mod codec;
pub mod error;
pub mod state;
pub mod types;

pub use codec::{decode, Compose, Decode};
pub use error::{Error, Result};
pub use state::{DeviceState, ParseOutcome, SharedDeviceState};
pub use types::*;

/// Default WebSocket port of a LightControl node
pub const DEFAULT_PORT: u16 = 80;

/// Default WebSocket path
pub const DEFAULT_PATH: &str = "/";

/// mDNS service type advertised by LightControl nodes
pub const MDNS_SERVICE_TYPE: &str = "_lightcontrol._tcp.local.";
