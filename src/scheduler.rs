//! ==============================================================================
//! scheduler.rs - the control loop
//! ==============================================================================
//!
//! purpose:
//!     owns the device state and runs one tick every `tick_ms`:
//!
//!     1. escalate: more than `max_errors` failed cycles -> pulse the modem
//!        reset line, wait out the grace period, bring the link up again,
//!        clear the counter and restart the update timer.
//!     2. buttons: send forces a telemetry post, stop toggles pause.
//!     3. update cycle, when due and not paused: fetch settings, then post.
//!        a failure counts one error and retries bring-up straight away.
//!        a fully successful cycle clears the counter.
//!     4. heartbeat on its own interval.
//!
//!     everything runs on one thread and every collaborator call blocks, so
//!     steps never overlap and the counter has a single writer.
//!
//! relationships:
//!     - used by: main.rs
//!     - uses: debounce.rs, telemetry.rs, connectivity.rs
//!
//! ==============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::HostConfig;
use crate::connectivity::Link;
use crate::debounce::Button;
use crate::domain::Settings;
use crate::error::SyncResult;
use crate::hal::{Board, Clock, Input, Output};
use crate::sensor::SensorProbe;
use crate::telemetry::Synchronizer;

pub struct Controller {
    board: Board,
    link: Link,
    probe: SensorProbe,
    clock: Arc<dyn Clock>,
    sync: Synchronizer,
    settings: Settings,
    send: Button,
    stop: Button,
    tick_period: Duration,
    reset_grace: Duration,
    max_errors: u8,
}

impl Controller {
    pub fn new(
        config: &HostConfig,
        board: Board,
        link: Link,
        probe: SensorProbe,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let timing = &config.timing;
        Self {
            board,
            link,
            probe,
            clock,
            sync: Synchronizer::from_config(config),
            settings: Settings::from_config(config),
            send: Button::new(Input::SendButton, timing.debounce_ms),
            stop: Button::new(Input::StopButton, timing.debounce_ms),
            tick_period: Duration::from_millis(timing.tick_ms),
            reset_grace: Duration::from_secs(timing.reset_grace_secs),
            max_errors: timing.max_errors,
        }
    }

    #[cfg(test)]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Put every output in a known state and make the first bring-up attempt.
    /// Status leds stay dark until the first sample.
    pub fn startup(&mut self) {
        self.board.all_off();
        self.board.set(Output::ModemReset, true);

        if let Err(e) = self.link.bring_up(&self.board) {
            tracing::warn!("initial bring-up failed: {}", e);
            self.record_failure();
        }

        let now = self.clock.now_ms();
        self.settings.update_start_ms = now;
        self.settings.display_start_ms = now;
    }

    pub fn tick(&mut self) {
        self.escalate_if_needed();
        self.poll_buttons();
        self.run_cycle_if_due();
        self.heartbeat();
    }

    /// Loop until `shutdown` is raised, then switch everything off.
    pub fn run(mut self, shutdown: Arc<AtomicBool>) {
        self.startup();
        tracing::info!(tick_ms = self.tick_period.as_millis() as u64, "control loop running");

        while !shutdown.load(Ordering::SeqCst) {
            self.tick();
            self.clock.sleep(self.tick_period);
        }

        self.board.all_off();
        tracing::info!("control loop stopped");
    }

    fn escalate_if_needed(&mut self) {
        if self.settings.errors <= self.max_errors {
            return;
        }

        tracing::warn!(errors = self.settings.errors, "too many failed cycles");
        self.link.reset(&self.board, self.clock.as_ref());
        tracing::info!(grace_secs = self.reset_grace.as_secs(), "waiting for modem after reset");
        self.clock.sleep(self.reset_grace);

        if let Err(e) = self.link.bring_up(&self.board) {
            tracing::warn!("bring-up after reset failed: {}", e);
        }
        self.settings.errors = 0;
        self.settings.update_start_ms = self.clock.now_ms();
    }

    fn poll_buttons(&mut self) {
        let now = self.clock.now_ms();

        if self.send.pressed(&self.board, now) {
            tracing::info!("send button: forcing telemetry post");
            let result = self.sync.post_if_changed(
                &self.board,
                &mut self.link,
                &mut self.probe,
                &mut self.settings,
                true,
            );
            if let Err(e) = result {
                tracing::warn!("manual post failed: {}", e);
                self.record_failure();
            }
        }

        if self.stop.pressed(&self.board, now) {
            self.settings.paused = !self.settings.paused;
            tracing::info!(paused = self.settings.paused, "stop button");
        }
    }

    fn run_cycle_if_due(&mut self) {
        let elapsed = self.clock.now_ms().saturating_sub(self.settings.update_start_ms);
        if self.settings.paused || elapsed <= self.settings.update_interval_ms {
            return;
        }

        match self.update_cycle() {
            Ok(()) => self.settings.errors = 0,
            Err(e) => {
                tracing::warn!("update cycle failed: {}", e);
                self.record_failure();
                if let Err(e) = self.link.bring_up(&self.board) {
                    tracing::warn!("bring-up retry failed: {}", e);
                }
            }
        }

        self.settings.update_start_ms = self.clock.now_ms();
    }

    fn update_cycle(&mut self) -> SyncResult<()> {
        self.sync.fetch_and_apply_settings(&self.board, &mut self.link, &mut self.settings, true)?;
        let outcome = self.sync.post_if_changed(
            &self.board,
            &mut self.link,
            &mut self.probe,
            &mut self.settings,
            false,
        )?;
        tracing::debug!(?outcome, "update cycle done");
        Ok(())
    }

    fn heartbeat(&mut self) {
        let now = self.clock.now_ms();
        if now.saturating_sub(self.settings.display_start_ms) > self.settings.display_interval_ms {
            tracing::debug!(uptime_ms = now, "heartbeat");
            self.settings.display_start_ms = now;
        }
    }

    fn record_failure(&mut self) {
        self.settings.errors = self.settings.errors.saturating_add(1);
        tracing::debug!(errors = self.settings.errors, "failure recorded");
    }
}
