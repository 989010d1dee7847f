use serde::Serialize;

use crate::config::{Bounds, HostConfig};

/// One measured quantity with its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub current: u8,
    /// value at the last successful post; `None` until the first one
    pub previous: Option<u8>,
    pub min: u8,
    pub max: u8,
}

impl Reading {
    pub fn new(bounds: Bounds) -> Self {
        Self { current: 0, previous: None, min: bounds.min, max: bounds.max }
    }

    pub fn below_min(&self) -> bool {
        self.current < self.min
    }

    pub fn above_max(&self) -> bool {
        self.current > self.max
    }

    pub fn changed(&self) -> bool {
        self.previous != Some(self.current)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Co2,
    Humidity,
    Temperature,
}

impl Quantity {
    pub const ALL: [Quantity; 3] = [Quantity::Co2, Quantity::Humidity, Quantity::Temperature];

    /// key of the quantity's block in the remote settings document
    pub fn key(self) -> &'static str {
        match self {
            Quantity::Co2 => "co2",
            Quantity::Humidity => "humidity",
            Quantity::Temperature => "temperature",
        }
    }
}

/// One calibrated sample from the sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub co2: u8,
    pub humidity: u8,
    pub temperature: u8,
}

/// Body of a telemetry post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataPoint {
    pub device: u16,
    pub co2: u8,
    pub humidity: u8,
    pub temperature: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Posted,
    Unchanged,
}

/// Everything the control loop knows. Owned by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// consecutive failed cycles since the last success or hard reset
    pub errors: u8,
    pub paused: bool,
    pub indicator_override: bool,
    pub fan: bool,
    pub update_interval_ms: u64,
    pub display_interval_ms: u64,
    pub co2: Reading,
    pub humidity: Reading,
    pub temperature: Reading,
    pub update_start_ms: u64,
    pub display_start_ms: u64,
}

impl Settings {
    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            errors: 0,
            paused: false,
            indicator_override: false,
            fan: false,
            update_interval_ms: config.timing.update_interval_ms,
            display_interval_ms: config.timing.display_interval_ms,
            co2: Reading::new(config.thresholds.co2),
            humidity: Reading::new(config.thresholds.humidity),
            temperature: Reading::new(config.thresholds.temperature),
            update_start_ms: 0,
            display_start_ms: 0,
        }
    }

    pub fn reading(&self, quantity: Quantity) -> &Reading {
        match quantity {
            Quantity::Co2 => &self.co2,
            Quantity::Humidity => &self.humidity,
            Quantity::Temperature => &self.temperature,
        }
    }

    pub fn reading_mut(&mut self, quantity: Quantity) -> &mut Reading {
        match quantity {
            Quantity::Co2 => &mut self.co2,
            Quantity::Humidity => &mut self.humidity,
            Quantity::Temperature => &mut self.temperature,
        }
    }

    pub fn record_sample(&mut self, sample: Sample) {
        self.co2.current = sample.co2;
        self.humidity.current = sample.humidity;
        self.temperature.current = sample.temperature;
    }

    /// True when any quantity differs from what was last posted.
    pub fn changed_since_post(&self) -> bool {
        Quantity::ALL.iter().any(|&q| self.reading(q).changed())
    }

    pub fn commit_posted(&mut self) {
        for q in Quantity::ALL {
            let r = self.reading_mut(q);
            r.previous = Some(r.current);
        }
    }

    pub fn data_point(&self, device: u16) -> DataPoint {
        DataPoint {
            device,
            co2: self.co2.current,
            humidity: self.humidity.current,
            temperature: self.temperature.current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::from_config(&HostConfig::default())
    }

    #[test]
    fn fresh_settings_count_as_changed() {
        let s = settings();
        assert!(s.changed_since_post());
        assert_eq!(s.co2.min, 20);
        assert_eq!(s.temperature.max, 80);
        assert_eq!(s.update_interval_ms, 10_000);
    }

    #[test]
    fn commit_clears_change() {
        let mut s = settings();
        s.record_sample(Sample { co2: 30, humidity: 40, temperature: 21 });
        s.commit_posted();
        assert!(!s.changed_since_post());

        s.record_sample(Sample { co2: 30, humidity: 41, temperature: 21 });
        assert!(s.changed_since_post());
        assert!(!s.co2.changed());
        assert!(s.humidity.changed());
    }

    #[test]
    fn data_point_serializes_flat() {
        let mut s = settings();
        s.record_sample(Sample { co2: 33, humidity: 50, temperature: 22 });
        let body = serde_json::to_value(s.data_point(1)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"device": 1, "co2": 33, "humidity": 50, "temperature": 22})
        );
    }
}
