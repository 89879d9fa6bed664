//! HTTP client for the IoT peripherals.
//!
//! Resolves device addresses through the registry at call time; nothing is
//! hardcoded, and a transport failure flags the registry entry offline so
//! the cached address is not retried until rediscovery. Commands are plain
//! GETs against the device's command endpoint (`/on`, `/off`, `/low`,
//! `/high`, `/status`, `/distance`); the glasses display takes a POSTed
//! JSON body.

use crate::error::{HubError, Result};
use crate::registry::{DeviceRegistry, DeviceType};
use crate::screens::{CHARS_PER_LINE, MAX_LINES, fit_line};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a cached device status stays valid.
const STATUS_CACHE_TTL: Duration = Duration::from_secs(5);

/// HTTP client for peripheral commands, backed by the device registry.
pub struct IoTClient {
    registry: Arc<DeviceRegistry>,
    http: reqwest::Client,
    status_cache: HashMap<DeviceType, (serde_json::Value, Instant)>,
}

impl IoTClient {
    /// Build a client with the given per-request timeout.
    pub fn new(registry: Arc<DeviceRegistry>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HubError::Transport(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            registry,
            http,
            status_cache: HashMap::new(),
        })
    }

    /// Send a command to a device and return its JSON response.
    ///
    /// # Errors
    ///
    /// `HubError::DeviceOffline` when the device is unknown, flagged
    /// offline, or the request fails at the transport level (which also
    /// flags it offline in the registry); `HubError::Protocol` when the
    /// response is not JSON.
    pub async fn send_command(
        &mut self,
        device_type: DeviceType,
        command: &str,
    ) -> Result<serde_json::Value> {
        let device = self
            .registry
            .get(device_type)
            .filter(|d| d.online)
            .ok_or_else(|| HubError::DeviceOffline(format!("{device_type} is not available")))?;

        let url = format!("http://{}/{command}", device.address());
        debug!("sending command to {}: GET {url}", device.name);

        let response = match self.http.get(&url).send().await.and_then(|r| r.error_for_status()) {
            Ok(response) => response,
            Err(e) => {
                warn!("command to {device_type} failed: {e}");
                // Observed transport failure means the cached address is bad.
                self.registry.mark_offline(device_type);
                return Err(HubError::DeviceOffline(format!(
                    "communication failed with {device_type}: {e}"
                )));
            }
        };

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HubError::Protocol(format!("bad response from {device_type}: {e}")))?;

        self.status_cache.insert(device_type, (body.clone(), Instant::now()));
        debug!("{} responded: {body}", device.name);
        Ok(body)
    }

    /// Current status of a device, served from a short-lived cache when
    /// fresh enough.
    pub async fn get_device_status(&mut self, device_type: DeviceType) -> Result<serde_json::Value> {
        if let Some((cached, at)) = self.status_cache.get(&device_type)
            && at.elapsed() < STATUS_CACHE_TTL
        {
            return Ok(cached.clone());
        }
        self.send_command(device_type, "status").await
    }

    /// Latest distance reading in centimeters, or `None` when the sensor is
    /// unreachable or answered without one.
    pub async fn get_distance_reading(&mut self) -> Option<i64> {
        match self.send_command(DeviceType::Distance, "distance").await {
            Ok(body) => body.get("distance_cm").and_then(serde_json::Value::as_i64),
            Err(_) => None,
        }
    }

    /// Push up to four display lines to the second glasses unit.
    ///
    /// Lines are padded/truncated to the 4x21 display contract. Returns
    /// whether the glasses accepted the frame; transport failures flag the
    /// device offline and report `false` rather than erroring.
    pub async fn send_to_glasses(&mut self, lines: &[String]) -> bool {
        let Some(device) = self.registry.get(DeviceType::Glasses).filter(|d| d.online) else {
            warn!("glasses are not available");
            return false;
        };

        let mut display_lines: Vec<String> = lines
            .iter()
            .take(MAX_LINES)
            .map(|l| fit_line(l))
            .collect();
        display_lines.resize(MAX_LINES, String::new());
        debug_assert!(display_lines.iter().all(|l| l.chars().count() <= CHARS_PER_LINE));

        let url = format!("http://{}/display", device.address());
        let payload = serde_json::json!({ "lines": display_lines });
        info!("sending display to {}: {payload}", device.name);

        match self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => match response.json::<serde_json::Value>().await {
                Ok(body) => body.get("success").and_then(serde_json::Value::as_bool).unwrap_or(true),
                Err(e) => {
                    warn!("glasses answered with a bad payload: {e}");
                    false
                }
            },
            Err(e) => {
                warn!("failed to send display to glasses: {e}");
                self.registry.mark_offline(DeviceType::Glasses);
                false
            }
        }
    }

    /// Quick health probe against a device's `/health` endpoint.
    pub async fn ping(&self, device_type: DeviceType) -> bool {
        let Some(device) = self.registry.get(device_type) else {
            return false;
        };
        let url = format!("http://{}/health", device.address());
        match self
            .http
            .get(&url)
            .timeout(Duration::from_secs(1))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Drop all cached statuses.
    pub fn clear_cache(&mut self) {
        self.status_cache.clear();
        debug!("device status cache cleared");
    }
}
