//! Last-known state of the connected LightControl mesh
//!
//! Every inbound frame overwrites the slot of its category; no history
//! is retained.

use crate::codec::{self, Decode};
use crate::types::*;
use crate::Error;
use bytes::Buf;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

/// Result of dispatching one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Decoded and stored in its slot
    Stored(PackageType),
    /// Known package type without a modeled payload, dropped
    Ignored(PackageType),
    /// Tag outside the package type table
    Unknown(u8),
    /// Payload could not be decoded, state left untouched
    Malformed(PackageType),
    /// Frame had no tag byte
    Empty,
}

/// Most recently decoded value per message category
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    pub light_mode: Option<LightMode>,
    pub strobe: Option<Strobe>,
    pub glitter: Option<Glitter>,
    pub pulse: Option<Pulse>,
    pub rainbow: Option<Rainbow>,
    pub running_sections: Option<RunningSections>,
    pub on_board_led_strength: Option<OnBoardLedStrength>,
    pub nodes: Vec<NodeInfo>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the leading tag and route the rest of the frame to its decoder
    pub fn parse_message(&mut self, bytes: &[u8]) -> ParseOutcome {
        let mut buf = bytes;
        if !buf.has_remaining() {
            debug!("Received empty frame");
            return ParseOutcome::Empty;
        }

        let tag = buf.get_u8();
        let Some(kind) = PackageType::from_u8(tag) else {
            debug!("Unknown package type 0x{:02x}, ignoring", tag);
            return ParseOutcome::Unknown(tag);
        };

        match codec::decode_payload(kind, &mut buf) {
            Ok(message) => {
                self.store(message);
                ParseOutcome::Stored(kind)
            }
            Err(Error::Unhandled(kind)) => ParseOutcome::Ignored(kind),
            Err(e) => {
                error!("Failed to decode {}: {}", kind, e);
                ParseOutcome::Malformed(kind)
            }
        }
    }

    fn store(&mut self, message: Message) {
        match message {
            Message::LightMode(m) => self.light_mode = Some(m),
            Message::Strobe(m) => self.strobe = Some(m),
            Message::Glitter(m) => self.glitter = Some(m),
            Message::Pulse(m) => self.pulse = Some(m),
            Message::Rainbow(m) => self.rainbow = Some(m),
            Message::RunningSections(m) => self.running_sections = Some(m),
            Message::OnBoardLedStrength(m) => self.on_board_led_strength = Some(m),
            Message::NodeInfo(list) => self.nodes = list.nodes,
        }
    }

    /// Decode a standalone NodeInfo payload into the node list
    pub fn update_nodes(&mut self, payload: &[u8]) -> crate::Result<usize> {
        let mut buf = payload;
        let list = NodeList::decode(&mut buf)?;
        self.nodes = list.nodes;
        Ok(self.nodes.len())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Device state shared between the connection thread and callers
#[derive(Debug, Clone, Default)]
pub struct SharedDeviceState {
    inner: Arc<Mutex<DeviceState>>,
}

impl SharedDeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_message(&self, bytes: &[u8]) -> ParseOutcome {
        self.inner.lock().parse_message(bytes)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> DeviceState {
        self.inner.lock().clone()
    }

    /// Run `f` with the state locked
    pub fn with<R>(&self, f: impl FnOnce(&DeviceState) -> R) -> R {
        let guard = self.inner.lock();
        f(&*guard)
    }

    pub fn reset(&self) {
        *self.inner.lock() = DeviceState::default();
    }
}
