//! Configuration types for the hub.
//!
//! Loaded from a TOML file (`$IRIS_HUB_CONFIG` or the platform config dir).
//! Every section has serde defaults so a missing or partial file still yields
//! a runnable configuration; API keys come from the environment, never from
//! the file.

use crate::error::{HubError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the glasses hub.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Voice command loop settings.
    pub voice: VoiceConfig,
    /// Device discovery and registry settings.
    pub discovery: DiscoveryConfig,
    /// Interrupt receiver (HTTP) settings.
    pub receiver: ReceiverConfig,
    /// Todo list storage settings.
    pub todo: TodoConfig,
    /// Live translation settings.
    pub translation: TranslationConfig,
    /// Weather settings for the idle screen.
    pub weather: WeatherConfig,
}

/// Voice command loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Idle timeout for menu states, in seconds.
    pub timeout_seconds: f64,
    /// Upper bound on a single listen call, in milliseconds.
    ///
    /// This is the main loop's only suspension point; it must stay sub-second
    /// so interrupts and timeouts remain responsive.
    pub listen_timeout_ms: u64,
    /// How long the transient "not recognized" message stays up, in ms.
    pub unrecognized_flash_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10.0,
            listen_timeout_ms: 500,
            unrecognized_flash_ms: 1500,
        }
    }
}

/// Device discovery and registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// A device not re-sighted within this window is considered offline.
    pub stale_window_secs: u64,
    /// Cadence of the background rescan task.
    pub rescan_interval_secs: u64,
    /// How long to wait for the mandatory display device at startup.
    pub display_wait_secs: u64,
    /// Static fallback devices, keyed by device type name
    /// (`light`, `fan`, `motion`, `distance`, `pi`, `glasses`).
    ///
    /// Entries are only used when the device was not discovered live, and
    /// only when the address passes IPv4 validation.
    pub manual_devices: std::collections::BTreeMap<String, ManualDevice>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            stale_window_secs: 120,
            rescan_interval_secs: 30,
            display_wait_secs: 30,
            manual_devices: std::collections::BTreeMap::new(),
        }
    }
}

/// A statically configured fallback device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualDevice {
    /// IPv4 address. Placeholder values (`0.0.0.0`, `CHANGE_ME`, empty)
    /// are rejected at load time.
    pub host: String,
    /// Service port; out-of-range values fall back to 80.
    pub port: u16,
    /// Optional display name override.
    pub name: Option<String>,
}

impl Default for ManualDevice {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 80,
            name: None,
        }
    }
}

/// Interrupt receiver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Bind host for the receiver.
    pub host: String,
    /// Bind port for the receiver.
    pub port: u16,
    /// Interrupt queue capacity. Pushes beyond this are dropped.
    pub queue_capacity: usize,
    /// How long a motion overlay stays on screen, in seconds.
    pub motion_overlay_secs: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 5000,
            queue_capacity: 100,
            motion_overlay_secs: 3,
        }
    }
}

/// Todo list storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoConfig {
    /// Path to the JSON store. `None` uses the platform data dir.
    pub file: Option<PathBuf>,
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self { file: None }
    }
}

/// Live translation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Source language code (e.g. "en").
    pub source_lang: String,
    /// Target language code (e.g. "fr").
    pub target_lang: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: "en".to_owned(),
            target_lang: "fr".to_owned(),
        }
    }
}

/// Weather configuration for the idle screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Latitude for the weather lookup.
    pub latitude: f64,
    /// Longitude for the weather lookup.
    pub longitude: f64,
    /// Human-readable place name shown in logs.
    pub city: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            latitude: 30.6280,
            longitude: -96.3344,
            city: "College Station, TX".to_owned(),
        }
    }
}

impl HubConfig {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the default configuration; a present but
    /// unparseable file is a hard error, so typos never silently fall back.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(HubError::Io(e)),
        };

        toml::from_str(&raw)
            .map_err(|e| HubError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Resolve the config file path: `$IRIS_HUB_CONFIG` if set, otherwise
    /// `<config dir>/iris-hub/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Ok(p) = std::env::var("IRIS_HUB_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("iris-hub")
            .join("config.toml")
    }

    /// Resolve the todo store path from config or the platform data dir.
    #[must_use]
    pub fn todo_store_path(&self) -> PathBuf {
        if let Some(p) = &self.todo.file {
            return p.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("iris-hub")
            .join("todos.json")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = HubConfig::default();
        assert!((config.voice.timeout_seconds - 10.0).abs() < f64::EPSILON);
        assert!(config.voice.listen_timeout_ms < 1000);
        assert_eq!(config.discovery.stale_window_secs, 120);
        assert_eq!(config.receiver.queue_capacity, 100);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: HubConfig = toml::from_str(
            r#"
            [voice]
            timeout_seconds = 4.5

            [discovery.manual_devices.light]
            host = "192.168.1.40"
            "#,
        )
        .unwrap();

        assert!((config.voice.timeout_seconds - 4.5).abs() < f64::EPSILON);
        assert_eq!(config.voice.listen_timeout_ms, 500);
        let light = config.discovery.manual_devices.get("light").unwrap();
        assert_eq!(light.host, "192.168.1.40");
        assert_eq!(light.port, 80);
    }

    #[test]
    fn missing_file_is_defaults() {
        let config = HubConfig::load(Path::new("/nonexistent/iris-hub.toml")).unwrap();
        assert_eq!(config.receiver.port, 5000);
    }
}
