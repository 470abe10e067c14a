//! mDNS/Bonjour discovery

use crate::{DeviceTable, DiscoveryConfig, DiscoveryError, Result};
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::device::{preferred_address, DiscoveredDevice};

/// Passive discovery of LightControl nodes
///
/// Browsing starts on a background thread as soon as the instance is
/// created and runs until it is dropped.
pub struct LightControlDiscover {
    table: Arc<DeviceTable>,
    stop: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    service_type: String,
    daemon: Option<ServiceDaemon>,
    thread: Option<JoinHandle<()>>,
}

impl LightControlDiscover {
    pub fn new() -> Result<Self> {
        Self::with_config(DiscoveryConfig::default())
    }

    /// Start browsing. If the mDNS daemon cannot be created the failure is
    /// logged and the instance stays inactive with an empty table.
    pub fn with_config(config: DiscoveryConfig) -> Result<Self> {
        let table = Arc::new(DeviceTable::new());
        let stop = Arc::new(AtomicBool::new(false));
        let service_type = config.service_type.clone();

        // The daemon opens its own multicast socket on every interface
        let daemon = match ServiceDaemon::new() {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("mDNS discovery stopped: {}", DiscoveryError::Mdns(e.to_string()));
                return Ok(Self {
                    table,
                    stop,
                    active: Arc::new(AtomicBool::new(false)),
                    service_type,
                    daemon: None,
                    thread: None,
                });
            }
        };

        let active = Arc::new(AtomicBool::new(true));
        let thread = {
            let table = Arc::clone(&table);
            let stop = Arc::clone(&stop);
            let active = Arc::clone(&active);
            let daemon = daemon.clone();
            std::thread::Builder::new()
                .name("lightctl-discovery".to_string())
                .spawn(move || {
                    if let Err(e) = browse(&daemon, &config, &table, &stop) {
                        error!("mDNS discovery stopped: {}", e);
                    }
                    active.store(false, Ordering::SeqCst);
                })?
        };

        Ok(Self {
            table,
            stop,
            active,
            service_type,
            daemon: Some(daemon),
            thread: Some(thread),
        })
    }

    /// Copy of the name to address table
    pub fn get_devices(&self) -> HashMap<String, String> {
        self.table.snapshot()
    }

    /// Full entries with first and last seen times
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        self.table.devices()
    }

    pub fn clear_devices(&self) {
        self.table.clear();
    }

    /// Add or update an entry by hand
    pub fn record(&self, name: &str, address: &str) {
        self.table.record(name, address);
    }

    /// False once the background thread has exited
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn table(&self) -> Arc<DeviceTable> {
        Arc::clone(&self.table)
    }
}

impl Drop for LightControlDiscover {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);

        // Wake the thread out of its poll wait
        if let Some(daemon) = self.daemon.take() {
            if let Err(e) = daemon.stop_browse(&self.service_type) {
                debug!("mDNS stop browse failed: {:?}", e);
            }
            if let Err(e) = daemon.shutdown() {
                debug!("mDNS daemon shutdown failed: {:?}", e);
            }
        }

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Discovery thread panicked");
            }
        }
    }
}

/// Thread body. Returns early only if browsing cannot be started.
fn browse(
    mdns: &ServiceDaemon,
    config: &DiscoveryConfig,
    table: &DeviceTable,
    stop: &AtomicBool,
) -> Result<()> {
    let receiver = mdns
        .browse(&config.service_type)
        .map_err(|e| DiscoveryError::Mdns(e.to_string()))?;

    info!("Starting mDNS discovery for {}", config.service_type);

    while !stop.load(Ordering::SeqCst) {
        match receiver.recv_timeout(config.poll_timeout) {
            Ok(ServiceEvent::ServiceResolved(info)) => {
                debug!("mDNS resolved: {:?}", info);
                record_service(table, &info);
            }
            Ok(ServiceEvent::ServiceRemoved(_, fullname)) => {
                // Entries outlive their announcements
                debug!("mDNS removed: {}", fullname);
            }
            Ok(ServiceEvent::SearchStarted(_)) => {
                debug!("mDNS search started");
            }
            Ok(ServiceEvent::SearchStopped(_)) => {
                debug!("mDNS search stopped");
                break;
            }
            Ok(_) => {}
            Err(_) if receiver.is_disconnected() => {
                if !stop.load(Ordering::SeqCst) {
                    warn!("mDNS daemon went away");
                }
                break;
            }
            // Poll timeout
            Err(_) => {}
        }

        if let Some(ttl) = config.device_ttl {
            table.evict_stale(ttl);
        }
    }

    Ok(())
}

/// Store a resolved service under its host record name
fn record_service(table: &DeviceTable, info: &ServiceInfo) {
    let name = info.get_hostname().trim_end_matches('.');
    let name = if name.is_empty() {
        info.get_fullname()
    } else {
        name
    };

    match preferred_address(info.get_addresses().iter()) {
        Some(address) => table.record(name, &address),
        None => debug!("{} resolved without an address", name),
    }
}
