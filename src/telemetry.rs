//! ==============================================================================
//! telemetry.rs - settings fetch and telemetry post
//! ==============================================================================
//!
//! purpose:
//!     the two halves of an update cycle, usable on their own:
//!     - fetch_and_apply_settings: GET the remote settings document and apply
//!       every recognized key that is present. missing keys leave the current
//!       value alone.
//!     - post_if_changed: sample the sensors, refresh the status leds, and POST
//!       the sample unless it equals the last one posted (or `force` is set).
//!
//! relationships:
//!     - used by: scheduler.rs
//!     - uses: connectivity.rs (Link), sensor.rs, scan.rs, indicator.rs
//!
//! ==============================================================================

use std::time::Duration;

use crate::config::HostConfig;
use crate::connectivity::Link;
use crate::domain::{PostOutcome, Quantity, Reading, Settings};
use crate::error::{SyncError, SyncResult};
use crate::hal::{Board, Output};
use crate::indicator;
use crate::scan::{find_int_after, find_int_after_within};
use crate::sensor::SensorProbe;

pub struct Synchronizer {
    device_id: u16,
    settings_path: String,
    data_path: String,
    settings_timeout: Duration,
    show_sensor_data: bool,
}

impl Synchronizer {
    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            device_id: config.device.id,
            settings_path: config.device.settings_path.clone(),
            data_path: config.device.data_path.clone(),
            settings_timeout: Duration::from_millis(config.timing.settings_timeout_ms),
            show_sensor_data: config.logging.show_sensor_data,
        }
    }

    pub fn fetch_and_apply_settings(
        &self,
        board: &Board,
        link: &mut Link,
        settings: &mut Settings,
        apply: bool,
    ) -> SyncResult<()> {
        link.ensure_ready(board)?;

        let body = match link.transport().http_get(&self.settings_path, self.settings_timeout) {
            Ok(body) => body,
            Err(e) => {
                link.invalidate();
                return Err(SyncError::SettingsFetch(e));
            }
        };

        if apply {
            apply_settings(&body, board, settings)?;
        }
        Ok(())
    }

    pub fn post_if_changed(
        &self,
        board: &Board,
        link: &mut Link,
        probe: &mut SensorProbe,
        settings: &mut Settings,
        force: bool,
    ) -> SyncResult<PostOutcome> {
        let sample = probe.read_sample(board).map_err(SyncError::Sensor)?;
        settings.record_sample(sample);
        if self.show_sensor_data {
            tracing::info!(co2 = sample.co2, humidity = sample.humidity, temperature = sample.temperature, "sample");
        } else {
            tracing::debug!(co2 = sample.co2, humidity = sample.humidity, temperature = sample.temperature, "sample");
        }
        indicator::render_status(board, indicator::classify(settings));

        link.ensure_ready(board)?;

        if !force && !settings.changed_since_post() {
            tracing::debug!("readings unchanged, skipping post");
            return Ok(PostOutcome::Unchanged);
        }

        let point = settings.data_point(self.device_id);
        if let Err(e) = link.transport().http_post(&self.data_path, &point) {
            link.invalidate();
            return Err(SyncError::Transmit(e));
        }

        settings.commit_posted();
        tracing::info!(force, "telemetry posted");
        Ok(PostOutcome::Posted)
    }
}

/// Apply every recognized key found in `body`.
///
/// Fails only when the document carries none of them. Keys that are present
/// but unusable are skipped with a warning.
pub fn apply_settings(body: &str, board: &Board, settings: &mut Settings) -> SyncResult<()> {
    let mut recognized = 0;

    if let Some(v) = find_int_after(body, "led\":") {
        recognized += 1;
        settings.indicator_override = v != 0;
        board.set(Output::Override, settings.indicator_override);
    }

    if let Some(v) = find_int_after(body, "fan\":") {
        recognized += 1;
        settings.fan = v != 0;
        board.set(Output::Fan, settings.fan);
    }

    if let Some(v) = find_int_after(body, "updateInterval\":") {
        recognized += 1;
        if v > 0 {
            settings.update_interval_ms = u64::from(v.unsigned_abs()) * 1000;
        } else {
            tracing::warn!(value = v, "ignoring non-positive update interval");
        }
    }

    for quantity in Quantity::ALL {
        let block = format!("{}\":", quantity.key());
        let min = find_int_after_within(body, &block, "min\":");
        let max = find_int_after_within(body, &block, "max\":");
        recognized += usize::from(min.is_some()) + usize::from(max.is_some());
        apply_bounds(settings.reading_mut(quantity), quantity, min, max);
    }

    if recognized == 0 {
        return Err(SyncError::SettingsParse);
    }

    tracing::debug!(
        led = settings.indicator_override,
        fan = settings.fan,
        update_ms = settings.update_interval_ms,
        co2 = ?(settings.co2.min, settings.co2.max),
        humidity = ?(settings.humidity.min, settings.humidity.max),
        temperature = ?(settings.temperature.min, settings.temperature.max),
        "settings applied"
    );
    Ok(())
}

/// Update a threshold pair, keeping the old pair if the result would be unusable.
fn apply_bounds(reading: &mut Reading, quantity: Quantity, min: Option<i16>, max: Option<i16>) {
    if min.is_none() && max.is_none() {
        return;
    }

    let resolve = |value: Option<i16>, current: u8| match value {
        Some(v) => u8::try_from(v).ok(),
        None => Some(current),
    };
    let (Some(new_min), Some(new_max)) = (resolve(min, reading.min), resolve(max, reading.max)) else {
        tracing::warn!(?quantity, ?min, ?max, "threshold out of range, keeping previous pair");
        return;
    };
    if new_min > new_max {
        tracing::warn!(?quantity, new_min, new_max, "min above max, keeping previous pair");
        return;
    }

    reading.min = new_min;
    reading.max = new_max;
}
