//! Sensor sampling.
//!
//! Humidity and temperature come from the DHT sensor. No gas sensor is fitted
//! yet, so the gas concentration is a random stand-in in `20..60`.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::GasSource;
use crate::domain::Sample;
use crate::hal::Board;

pub struct SensorProbe {
    gas: StdRng,
}

impl SensorProbe {
    pub fn new(source: GasSource) -> Self {
        match source {
            GasSource::Synthetic => {
                tracing::warn!("no gas sensor fitted, co2 readings are synthetic");
            }
        }
        Self { gas: StdRng::from_entropy() }
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self { gas: StdRng::seed_from_u64(seed) }
    }

    /// One blocking read of all three quantities.
    pub fn read_sample(&mut self, board: &Board) -> Result<Sample> {
        let (temperature, humidity) = board.read_dht()?;
        Ok(Sample {
            co2: self.gas.gen_range(20..60),
            humidity: calibrated(humidity)?,
            temperature: calibrated(temperature)?,
        })
    }
}

/// Rounded into the `u8` range the rest of the loop works in.
fn calibrated(value: f32) -> Result<u8> {
    if !value.is_finite() {
        bail!("sensor returned {}", value);
    }
    Ok(value.round().clamp(0.0, u8::MAX as f32) as u8)
}
