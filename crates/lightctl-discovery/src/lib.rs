//! LightControl Discovery
//!
//! Finds LightControl nodes on the local network by browsing for their
//! mDNS service and keeps a name to address table that any thread can read.

pub mod device;
pub mod error;

#[cfg(feature = "mdns")]
pub mod mdns;

pub use device::{preferred_address, DeviceTable, DiscoveredDevice};
pub use error::{DiscoveryError, Result};

#[cfg(feature = "mdns")]
pub use mdns::LightControlDiscover;

use std::time::Duration;

/// Discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Service type to browse for
    pub service_type: String,
    /// Longest wait for an mDNS event before the stop flag is checked again
    pub poll_timeout: Duration,
    /// Drop devices not seen for this long. `None` keeps them forever.
    pub device_ttl: Option<Duration>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_type: lightctl_core::MDNS_SERVICE_TYPE.to_string(),
            poll_timeout: Duration::from_secs(5),
            device_ttl: None,
        }
    }
}
