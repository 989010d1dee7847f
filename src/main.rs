//! ==============================================================================
//! main.rs - airsense host entry point
//! ==============================================================================
//!
//! purpose:
//!     control firmware for a standalone environmental-sensor appliance.
//!     samples humidity/temperature (plus a placeholder gas reading), classifies
//!     them against remotely configured thresholds, drives the status leds and
//!     keeps the remote api in sync over the modem's data link.
//!
//! responsibilities:
//!     - load host.toml and set up logging
//!     - build the hardware, clock and transport seams
//!     - run the control loop on a blocking thread
//!     - stop the loop cleanly on ctrl-c
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                   control loop (scheduler.rs)                │
//!     │   buttons ──► update cycle ──► heartbeat ──► sleep(tick)     │
//!     │  (debounce)   (telemetry)                                    │
//!     └──────┬──────────────┬──────────────────────┬─────────────────┘
//!            │              │                      │
//!      ┌─────┴─────┐  ┌─────┴──────┐        ┌──────┴──────┐
//!      │  hal.rs   │  │connectivity│        │ indicator   │
//!      │ gpio, dht │  │ + transport│        │ status/stage│
//!      └───────────┘  └────────────┘        └─────────────┘
//!
//! ==============================================================================

mod config;
mod connectivity;
mod debounce;
mod domain;
mod error;
mod hal;
mod indicator;
mod scan;
mod scheduler;
mod sensor;
mod telemetry;
#[cfg(test)]
mod testutil;
mod transport;

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::connectivity::Link;
use crate::hal::{Board, Hal, SystemClock};
use crate::scheduler::Controller;
use crate::sensor::SensorProbe;
use crate::transport::HttpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let config = config::HostConfig::load_or_default();

    // step 2: logging (RUST_LOG overrides the configured level)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();
    config.log_summary();

    // step 3: hardware, link and sensors
    let hal = Arc::new(Hal::new().context("failed to open gpio")?);
    let board = Board::new(hal, config.pins.clone());
    let transport = HttpTransport::new(
        &config.device.base_url,
        Duration::from_millis(config.timing.request_timeout_ms),
    )?;
    let link = Link::new(Box::new(transport), Duration::from_millis(config.timing.reset_pulse_ms));
    let probe = SensorProbe::new(config.sensors.gas);
    let controller = Controller::new(&config, board, link, probe, Arc::new(SystemClock::new()));

    // step 4: control loop, on its own thread since every call in it blocks
    let shutdown = Arc::new(AtomicBool::new(false));
    let loop_shutdown = shutdown.clone();
    let mut control = tokio::task::spawn_blocking(move || controller.run(loop_shutdown));

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::error!("failed to listen for ctrl-c: {}", e);
            }
            tracing::info!("shutting down");
            shutdown.store(true, Ordering::SeqCst);
            control.await.context("control loop panicked")?;
        }
        res = &mut control => {
            res.context("control loop panicked")?;
        }
    }

    Ok(())
}
