//! Device registry: liveness tracking for discovered peripherals.
//!
//! Discovery listeners (mDNS/UDP, out of scope here) feed the registry
//! through [`DeviceRegistry::record_sighting`] and
//! [`DeviceRegistry::mark_offline`]; the rest of the hub only reads from it.
//! Staleness is re-evaluated on every read, so a device that stopped
//! advertising goes invisible within one staleness window without any
//! background work. The registry is the only structure in the hub mutated
//! from multiple tasks; a single mutex serializes sightings, overrides, and
//! staleness-checking reads.

use crate::config::DiscoveryConfig;
use crate::error::{HubError, Result};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The fixed set of peripheral types in the glasses ecosystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// The Pi that drives the 4-line display.
    Pi,
    /// Smart light.
    Light,
    /// Smart fan.
    Fan,
    /// Motion sensor (pushes interrupts when alerts are enabled).
    Motion,
    /// Distance sensor (polled live stream).
    Distance,
    /// The second glasses unit.
    Glasses,
}

impl DeviceType {
    /// All device types, in registry iteration order.
    pub const ALL: [DeviceType; 6] = [
        DeviceType::Light,
        DeviceType::Fan,
        DeviceType::Distance,
        DeviceType::Motion,
        DeviceType::Pi,
        DeviceType::Glasses,
    ];

    /// Stable lowercase identifier used in config files and wire payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Pi => "pi",
            DeviceType::Light => "light",
            DeviceType::Fan => "fan",
            DeviceType::Motion => "motion",
            DeviceType::Distance => "distance",
            DeviceType::Glasses => "glasses",
        }
    }

    /// Parse the stable identifier back into a type.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pi" => Some(DeviceType::Pi),
            "light" => Some(DeviceType::Light),
            "fan" => Some(DeviceType::Fan),
            "motion" => Some(DeviceType::Motion),
            "distance" => Some(DeviceType::Distance),
            "glasses" => Some(DeviceType::Glasses),
            _ => None,
        }
    }

    /// Human-readable name shown on the device list screen.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            DeviceType::Pi => "Pi Display",
            DeviceType::Light => "Lights",
            DeviceType::Fan => "Smart Fan",
            DeviceType::Motion => "Motion Sensor",
            DeviceType::Distance => "Distance Sensor",
            DeviceType::Glasses => "Glasses 2",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A peripheral the discovery layer has seen at least once.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Which peripheral this is. The registry holds at most one record per type.
    pub device_type: DeviceType,
    /// Human-readable name for screens and logs.
    pub name: String,
    /// Resolved IPv4 address.
    pub host: String,
    /// Service port.
    pub port: u16,
    /// Last time any discovery mechanism sighted this device.
    pub last_seen: Instant,
    /// Availability flag. May be stale until the next read re-evaluates it.
    pub online: bool,
    /// Advertised hostname (e.g. `iris-light.local`).
    pub hostname: String,
}

impl DiscoveredDevice {
    /// `host:port` form for building request URLs.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared, lock-protected registry of discovered peripherals.
///
/// Never hard-deletes: devices that go away are flagged offline and remain
/// queryable for diagnostics.
pub struct DeviceRegistry {
    inner: Mutex<HashMap<DeviceType, DiscoveredDevice>>,
    stale_window: Duration,
}

impl DeviceRegistry {
    /// Create an empty registry with the given staleness window.
    #[must_use]
    pub fn new(stale_window: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            stale_window,
        }
    }

    /// Record a discovery sighting. Idempotent upsert: always refreshes
    /// `last_seen` and forces `online = true`. Never fails.
    pub fn record_sighting(&self, device_type: DeviceType, host: &str, port: u16, hostname: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let is_new = !inner.contains_key(&device_type);
        let hostname = if hostname.is_empty() {
            format!("iris-{device_type}.local")
        } else {
            hostname.to_owned()
        };
        inner.insert(
            device_type,
            DiscoveredDevice {
                device_type,
                name: device_type.display_name().to_owned(),
                host: host.to_owned(),
                port,
                last_seen: Instant::now(),
                online: true,
                hostname,
            },
        );
        if is_new {
            info!("discovered {} at {host}:{port}", device_type.display_name());
        } else {
            debug!("refreshed {} at {host}:{port}", device_type.display_name());
        }
    }

    /// Flag a device offline. Used when its remove-advertisement fires or a
    /// communication attempt against its cached address fails.
    pub fn mark_offline(&self, device_type: DeviceType) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(device) = inner.get_mut(&device_type)
            && device.online
        {
            device.online = false;
            info!("{} marked offline", device.name);
        }
    }

    /// Look up a device, re-evaluating staleness first so every read
    /// self-heals visibility.
    #[must_use]
    pub fn get(&self, device_type: DeviceType) -> Option<DiscoveredDevice> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let stale_window = self.stale_window;
        let device = inner.get_mut(&device_type)?;
        if device.online && device.last_seen.elapsed() > stale_window {
            device.online = false;
            info!("{} marked offline (stale)", device.name);
        }
        Some(device.clone())
    }

    /// Whether a device is currently considered online.
    #[must_use]
    pub fn is_online(&self, device_type: DeviceType) -> bool {
        self.get(device_type).is_some_and(|d| d.online)
    }

    /// Staleness-checked snapshot of every online device.
    #[must_use]
    pub fn all_online(&self) -> Vec<DiscoveredDevice> {
        DeviceType::ALL
            .iter()
            .filter_map(|&t| self.get(t))
            .filter(|d| d.online)
            .collect()
    }

    /// All known devices in the fixed UI order: light, fan, distance,
    /// motion, then anything else. Includes offline entries so the device
    /// list can render them as such. This ordering is a display contract,
    /// not a registry property.
    #[must_use]
    pub fn display_order(&self) -> Vec<DiscoveredDevice> {
        // DeviceType::ALL is already in preferred-then-rest order.
        DeviceType::ALL.iter().filter_map(|&t| self.get(t)).collect()
    }

    /// Block until `device_type` appears online, re-polling every second.
    ///
    /// # Errors
    ///
    /// `HubError::DeviceNotFound` if the device does not come online within
    /// `timeout`.
    pub async fn wait_for(
        &self,
        device_type: DeviceType,
        timeout: Duration,
    ) -> Result<DiscoveredDevice> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(device) = self.get(device_type)
                && device.online
            {
                return Ok(device);
            }
            if Instant::now() >= deadline {
                return Err(HubError::DeviceNotFound(format!(
                    "{} not found within {}s",
                    device_type.display_name(),
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(Duration::from_secs(1).min(timeout)).await;
        }
    }

    /// Load static fallback devices from config.
    ///
    /// Entries are skipped when the device was already discovered live, and
    /// rejected (with a log line, never silently used) when the address is
    /// empty, a placeholder, or not a valid IPv4 address.
    pub fn load_manual_devices(&self, config: &DiscoveryConfig) {
        let mut loaded = 0usize;
        let mut skipped = 0usize;

        for (type_name, entry) in &config.manual_devices {
            let Some(device_type) = DeviceType::from_name(type_name) else {
                warn!("manual device '{type_name}' has unknown type, skipping");
                skipped += 1;
                continue;
            };
            if self.get(device_type).is_some_and(|d| d.online) {
                debug!("manual device '{type_name}' already discovered live, skipping");
                continue;
            }
            if !is_valid_ipv4(&entry.host) {
                warn!(
                    "manual device '{type_name}' has invalid or placeholder address '{}', skipping",
                    entry.host
                );
                skipped += 1;
                continue;
            }
            let port = if entry.port == 0 {
                warn!("manual device '{type_name}' has port 0, using 80");
                80
            } else {
                entry.port
            };

            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let name = entry
                .name
                .clone()
                .unwrap_or_else(|| device_type.display_name().to_owned());
            info!("loaded manual device {name} at {}:{port}", entry.host);
            inner.insert(
                device_type,
                DiscoveredDevice {
                    device_type,
                    name,
                    host: entry.host.clone(),
                    port,
                    last_seen: Instant::now(),
                    online: true,
                    hostname: format!("iris-{device_type}.local"),
                },
            );
            loaded += 1;
        }

        if loaded > 0 || skipped > 0 {
            info!("manual devices: {loaded} loaded, {skipped} skipped");
        }
    }

    /// Sweep every record and flag stale entries offline. The rescan task
    /// calls this on its cadence; reads do the same lazily per device.
    pub fn sweep_stale(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for device in inner.values_mut() {
            if device.online && device.last_seen.elapsed() > self.stale_window {
                device.online = false;
                info!("{} marked offline (stale)", device.name);
            }
        }
    }
}

/// Re-runs a discovery round on behalf of the background rescan task.
///
/// The wire mechanics (mDNS browse, UDP broadcast) live behind this seam;
/// implementations report findings through `record_sighting`.
#[async_trait::async_trait]
pub trait DeviceScanner: Send + Sync {
    /// Run one discovery round against the given registry.
    async fn scan(&self, registry: &DeviceRegistry);
}

/// Spawn the periodic rescan task: re-runs discovery (when a scanner is
/// provided) and flags stale entries offline. Stops promptly on cancel.
pub fn spawn_rescan(
    registry: Arc<DeviceRegistry>,
    scanner: Option<Arc<dyn DeviceScanner>>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("background device rescan started ({}s cadence)", interval.as_secs());
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            if let Some(scanner) = &scanner {
                scanner.scan(&registry).await;
            }
            registry.sweep_stale();
        }
        info!("background device rescan stopped");
    })
}

/// IPv4 validity check for manual config entries. Rejects empty strings,
/// known placeholder values, and anything that does not parse as a dotted
/// quad.
#[must_use]
pub fn is_valid_ipv4(address: &str) -> bool {
    let address = address.trim();
    let placeholders = ["", "0.0.0.0", "CHANGE_ME", "change_me", "placeholder"];
    if placeholders.contains(&address) {
        return false;
    }
    address.parse::<Ipv4Addr>().is_ok()
}
