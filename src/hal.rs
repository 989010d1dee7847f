//! ==============================================================================
//! hal.rs - Hardware Abstraction Layer
//! ==============================================================================
//!
//! purpose:
//!     provides a unified interface for the appliance's hardware: digital pins
//!     (buttons, leds, fan relay, modem reset line), the DHT sensor and the clock.
//!     abstracts away the difference between running on a real Raspberry Pi
//!     (using `rppal`) and a development machine (using mocks).
//!
//! design philosophy:
//!     - "Compile Anywhere": The host should compile on Windows/Mac/Linux.
//!     - Named signals: the control loop talks about `Output::Fan`, never pin 15.
//!     - Pin writes never fail the loop. A failed write is logged and skipped.
//!
//! relationships:
//!     - used by: indicator.rs, connectivity.rs, sensor.rs, scheduler.rs
//!     - uses: rppal (on feature="hardware")
//!     - uses: std::process::Command (for the Python DHT driver)
//!
//! ==============================================================================

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::PinsConfig;

pub trait HardwareProvider: Send + Sync {
    fn read_gpio(&self, pin: u8) -> Result<bool>;
    fn write_gpio(&self, pin: u8, level: bool) -> Result<()>;
    /// returns (temperature °C, relative humidity %)
    fn read_dht(&self, pin: u8) -> Result<(f32, f32)>;
}

/// Monotonic time source for the control loop.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ==============================================================================================
// NAMED SIGNALS
// ==============================================================================================

/// Digital outputs driven by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    ModuleStage,
    NetworkStage,
    ServiceStage,
    StatusLow,
    StatusNormal,
    StatusHigh,
    Override,
    Fan,
    /// active low
    ModemReset,
}

impl Output {
    /// indicator and actuator outputs; the reset line is managed separately
    pub const SIGNALS: [Output; 8] = [
        Output::ModuleStage,
        Output::NetworkStage,
        Output::ServiceStage,
        Output::StatusLow,
        Output::StatusNormal,
        Output::StatusHigh,
        Output::Override,
        Output::Fan,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    SendButton,
    StopButton,
}

/// A hardware provider bound to the appliance's pin map.
#[derive(Clone)]
pub struct Board {
    hal: Arc<dyn HardwareProvider>,
    pins: PinsConfig,
}

impl Board {
    pub fn new(hal: Arc<dyn HardwareProvider>, pins: PinsConfig) -> Self {
        Self { hal, pins }
    }

    pub fn output_pin(&self, output: Output) -> u8 {
        match output {
            Output::ModuleStage => self.pins.led_module,
            Output::NetworkStage => self.pins.led_network,
            Output::ServiceStage => self.pins.led_service,
            Output::StatusLow => self.pins.led_low,
            Output::StatusNormal => self.pins.led_normal,
            Output::StatusHigh => self.pins.led_high,
            Output::Override => self.pins.led_override,
            Output::Fan => self.pins.fan,
            Output::ModemReset => self.pins.modem_reset,
        }
    }

    pub fn input_pin(&self, input: Input) -> u8 {
        match input {
            Input::SendButton => self.pins.send_button,
            Input::StopButton => self.pins.stop_button,
        }
    }

    pub fn set(&self, output: Output, level: bool) {
        let pin = self.output_pin(output);
        if let Err(e) = self.hal.write_gpio(pin, level) {
            tracing::warn!(?output, pin, "gpio write failed: {:#}", e);
        }
    }

    /// Raw level of an input; a failed read reads as low.
    pub fn read(&self, input: Input) -> bool {
        let pin = self.input_pin(input);
        match self.hal.read_gpio(pin) {
            Ok(level) => level,
            Err(e) => {
                tracing::warn!(?input, pin, "gpio read failed: {:#}", e);
                false
            }
        }
    }

    pub fn read_dht(&self) -> Result<(f32, f32)> {
        self.hal.read_dht(self.pins.dht)
    }

    pub fn all_off(&self) {
        for output in Output::SIGNALS {
            self.set(output, false);
        }
    }
}

// ==============================================================================================
// MOCK IMPLEMENTATION (For WSL / Non-Hardware Build)
// ==============================================================================================
#[cfg(not(feature = "hardware"))]
pub struct Hal {
    levels: std::sync::Mutex<std::collections::HashMap<u8, bool>>,
}

#[cfg(not(feature = "hardware"))]
impl Hal {
    pub fn new() -> Result<Self> {
        tracing::info!("Using MOCK HAL (No hardware access)");
        Ok(Self { levels: std::sync::Mutex::new(std::collections::HashMap::new()) })
    }
}

#[cfg(not(feature = "hardware"))]
impl HardwareProvider for Hal {
    fn read_gpio(&self, pin: u8) -> Result<bool> {
        let levels = self.levels.lock().map_err(|_| anyhow::anyhow!("mock gpio poisoned"))?;
        Ok(levels.get(&pin).copied().unwrap_or(false))
    }

    fn write_gpio(&self, pin: u8, level: bool) -> Result<()> {
        tracing::trace!("[MOCK GPIO] Pin {} write {}", pin, level);
        let mut levels = self.levels.lock().map_err(|_| anyhow::anyhow!("mock gpio poisoned"))?;
        levels.insert(pin, level);
        Ok(())
    }

    fn read_dht(&self, pin: u8) -> Result<(f32, f32)> {
        tracing::debug!("[MOCK DHT] Reading pin {}", pin);
        Ok((24.0, 45.0))
    }
}

// ==============================================================================================
// REAL IMPLEMENTATION (For Raspberry Pi)
// ==============================================================================================
#[cfg(feature = "hardware")]
pub struct Hal {
    gpio: rppal::gpio::Gpio,
    // output handles must outlive the write, otherwise rppal resets the pin on drop
    outputs: std::sync::Mutex<std::collections::HashMap<u8, rppal::gpio::OutputPin>>,
    inputs: std::sync::Mutex<std::collections::HashMap<u8, rppal::gpio::InputPin>>,
}

#[cfg(feature = "hardware")]
impl Hal {
    pub fn new() -> Result<Self> {
        tracing::info!("Using REAL HARDWARE HAL (rppal)");
        Ok(Self {
            gpio: rppal::gpio::Gpio::new()?,
            outputs: std::sync::Mutex::new(std::collections::HashMap::new()),
            inputs: std::sync::Mutex::new(std::collections::HashMap::new()),
        })
    }
}

#[cfg(feature = "hardware")]
impl HardwareProvider for Hal {
    fn read_gpio(&self, pin: u8) -> Result<bool> {
        let mut inputs = self.inputs.lock().map_err(|_| anyhow::anyhow!("gpio inputs poisoned"))?;
        if !inputs.contains_key(&pin) {
            let input = self.gpio.get(pin)?.into_input();
            inputs.insert(pin, input);
        }
        match inputs.get(&pin) {
            Some(input) => Ok(input.is_high()),
            None => anyhow::bail!("gpio {} not configured", pin),
        }
    }

    fn write_gpio(&self, pin: u8, level: bool) -> Result<()> {
        let mut outputs = self.outputs.lock().map_err(|_| anyhow::anyhow!("gpio outputs poisoned"))?;
        if !outputs.contains_key(&pin) {
            let mut output = self.gpio.get(pin)?.into_output();
            output.set_reset_on_drop(false);
            outputs.insert(pin, output);
        }
        if let Some(output) = outputs.get_mut(&pin) {
            if level {
                output.set_high();
            } else {
                output.set_low();
            }
        }
        Ok(())
    }

    fn read_dht(&self, pin: u8) -> Result<(f32, f32)> {
        // NOTE: DHT11 bit-banging is unreliable from userspace, so the
        // adafruit driver does the timing in a subprocess.
        use std::process::Command;
        let script = format!(
            r#"
import adafruit_dht, board, json, sys
try:
    dht = adafruit_dht.DHT11(board.D{})
    print(json.dumps({{"t": dht.temperature, "h": dht.humidity}}))
    dht.exit()
except Exception:
    print("null")
"#,
            pin
        );
        let output = Command::new("python3").args(["-c", &script]).output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || stdout.trim() == "null" {
            anyhow::bail!("DHT read failed");
        }
        let v: serde_json::Value = serde_json::from_str(stdout.trim())?;
        let t = v["t"].as_f64().ok_or_else(|| anyhow::anyhow!("Missing temp"))?;
        let h = v["h"].as_f64().ok_or_else(|| anyhow::anyhow!("Missing humidity"))?;
        Ok((t as f32, h as f32))
    }
}
