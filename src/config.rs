//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - DeviceConfig: device id and the remote API endpoints.
//!     - PinsConfig: BCM pin numbers for buttons, LEDs, fan, modem reset, DHT.
//!     - TimingConfig: loop cadence, intervals, debounce, reset policy, timeouts.
//!     - ThresholdsConfig: default min/max per measured quantity.
//!     - SensorsConfig: where the gas reading comes from.
//!     - LoggingConfig: default log filter and sample verbosity.
//!
//! ==============================================================================

use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config search path.
pub const CONFIG_ENV: &str = "AIRSENSE_CONFIG";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub pins: PinsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceConfig {
    pub id: u16,
    pub base_url: String,
    pub settings_path: String,
    pub data_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PinsConfig {
    pub send_button: u8,
    pub stop_button: u8,
    pub led_module: u8,
    pub led_network: u8,
    pub led_service: u8,
    pub led_low: u8,
    pub led_normal: u8,
    pub led_high: u8,
    pub led_override: u8,
    pub fan: u8,
    pub modem_reset: u8,
    pub dht: u8,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_ms: u64,
    pub update_interval_ms: u64,
    pub display_interval_ms: u64,
    pub debounce_ms: u64,
    pub reset_grace_secs: u64,
    pub reset_pulse_ms: u64,
    pub request_timeout_ms: u64,
    pub settings_timeout_ms: u64,
    /// hard reset fires once the error counter exceeds this
    pub max_errors: u8,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: u8,
    pub max: u8,
}

impl Default for Bounds {
    fn default() -> Self {
        Self { min: 20, max: 80 }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub co2: Bounds,
    pub humidity: Bounds,
    pub temperature: Bounds,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GasSource {
    /// random placeholder, no gas sensor fitted yet
    #[default]
    Synthetic,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SensorsConfig {
    pub gas: GasSource,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: 1,
            base_url: "https://www.europe-west1-arduino-sensors-754e5.cloudfunctions.net".to_string(),
            settings_path: "/api/settings/1".to_string(),
            data_path: "/api/data".to_string(),
        }
    }
}

impl Default for PinsConfig {
    fn default() -> Self {
        Self {
            send_button: 2,
            stop_button: 3,
            led_high: 4,
            led_normal: 5,
            led_low: 6,
            led_override: 7,
            led_service: 8,
            led_network: 9,
            led_module: 10,
            dht: 14,
            fan: 15,
            modem_reset: 16,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            update_interval_ms: 10_000,
            display_interval_ms: 1_000,
            debounce_ms: 50,
            reset_grace_secs: 10,
            reset_pulse_ms: 100,
            request_timeout_ms: 1_000,
            settings_timeout_ms: 20_000,
            max_errors: 2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: HostConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback
    ///
    /// runs before the log subscriber exists, so it reports on stdout.
    pub fn load_or_default() -> Self {
        let mut paths = Vec::new();
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from("config").join("host.toml"));
        paths.push(PathBuf::from("..").join("config").join("host.toml"));

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Reject values the control loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (name, b) in [
            ("co2", self.thresholds.co2),
            ("humidity", self.thresholds.humidity),
            ("temperature", self.thresholds.temperature),
        ] {
            if b.min > b.max {
                bail!("thresholds.{}: min {} exceeds max {}", name, b.min, b.max);
            }
        }
        let t = &self.timing;
        if t.tick_ms == 0 || t.update_interval_ms == 0 || t.display_interval_ms == 0 {
            bail!("timing: tick, update and display intervals must be non-zero");
        }
        Ok(())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            device = self.device.id,
            api = %self.device.base_url,
            update_ms = self.timing.update_interval_ms,
            tick_ms = self.timing.tick_ms,
            gas = ?self.sensors.gas,
            "host configuration"
        );
    }
}
