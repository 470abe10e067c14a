//! Discovered device table

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A node seen on the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Record name the address was announced under
    pub name: String,
    /// Most recently observed address, formatted for display
    pub address: String,
    /// When the name was first seen
    pub discovered_at: Instant,
    /// When the address was last confirmed
    pub last_seen: Instant,
}

impl DiscoveredDevice {
    pub fn new(name: String, address: String) -> Self {
        let now = Instant::now();
        Self {
            name,
            address,
            discovered_at: now,
            last_seen: now,
        }
    }

    /// Update last seen time
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.last_seen.elapsed() > ttl
    }
}

/// Name to address table, written by the discovery thread and read by anyone
///
/// Entries are only added or overwritten. Nothing is removed except by
/// [`clear`](DeviceTable::clear) or an explicit [`evict_stale`](DeviceTable::evict_stale).
#[derive(Debug, Default)]
pub struct DeviceTable {
    entries: Mutex<HashMap<String, DiscoveredDevice>>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name` or replace its address
    pub fn record(&self, name: &str, address: &str) {
        let mut entries = self.entries.lock();
        match entries.get_mut(name) {
            Some(device) => {
                if device.address != address {
                    info!("Device {} moved from {} to {}", name, device.address, address);
                    device.address = address.to_string();
                }
                device.touch();
            }
            None => {
                info!("Discovered LightControl device {} at {}", name, address);
                entries.insert(
                    name.to_string(),
                    DiscoveredDevice::new(name.to_string(), address.to_string()),
                );
            }
        }
    }

    /// Snapshot of name to address
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries
            .lock()
            .iter()
            .map(|(name, device)| (name.clone(), device.address.clone()))
            .collect()
    }

    /// Snapshot of the full entries, sorted by name
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        let mut devices: Vec<DiscoveredDevice> = self.entries.lock().values().cloned().collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop entries not confirmed within `ttl`, returns how many went
    pub fn evict_stale(&self, ttl: Duration) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|name, device| {
            let keep = !device.is_stale(ttl);
            if !keep {
                debug!("Evicting stale device {} ({})", name, device.address);
            }
            keep
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Pick the address to record for a resolved service: the lowest IPv4
/// address if there is one, else the lowest of the rest.
pub fn preferred_address<I>(addresses: I) -> Option<String>
where
    I: IntoIterator,
    I::Item: std::fmt::Display,
{
    let mut formatted: Vec<String> = addresses.into_iter().map(|a| a.to_string()).collect();
    formatted.sort();

    let ipv4 = formatted
        .iter()
        .position(|addr| addr.parse::<Ipv4Addr>().is_ok());
    match ipv4 {
        Some(index) => Some(formatted.swap_remove(index)),
        None => formatted.into_iter().next(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv6Addr};

    #[test]
    fn test_record_overwrites_address() {
        let table = DeviceTable::new();
        table.record("stage.local", "192.168.4.1");
        table.record("stage.local", "192.168.4.7");

        assert_eq!(table.len(), 1);
        assert_eq!(table.snapshot()["stage.local"], "192.168.4.7");
    }

    #[test]
    fn test_prefers_ipv4() {
        let addrs: Vec<IpAddr> = vec![
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            "192.168.4.1".parse().unwrap(),
        ];
        assert_eq!(preferred_address(addrs).as_deref(), Some("192.168.4.1"));
    }

    #[test]
    fn test_falls_back_to_ipv6() {
        let addrs = vec![IpAddr::V6(Ipv6Addr::LOCALHOST)];
        assert_eq!(preferred_address(addrs).as_deref(), Some("::1"));
        assert_eq!(preferred_address(Vec::<IpAddr>::new()), None);
    }

    #[test]
    fn test_evict_stale() {
        let table = DeviceTable::new();
        table.record("a.local", "10.0.0.1");
        std::thread::sleep(Duration::from_millis(20));
        table.record("b.local", "10.0.0.2");

        assert_eq!(table.evict_stale(Duration::from_millis(10)), 1);
        assert!(table.snapshot().contains_key("b.local"));
        assert!(!table.snapshot().contains_key("a.local"));
    }
}
