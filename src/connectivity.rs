//! ==============================================================================
//! connectivity.rs - modem bring-up and reset
//! ==============================================================================
//!
//! purpose:
//!     runs the three-step bring-up (module -> network -> data service) against
//!     a transport, lights the matching stage led for every step that succeeds,
//!     and stops at the first step that fails. earlier steps are not rolled back.
//!
//!     there is no retry here. the scheduler decides when to try again and
//!     when to escalate to a hard reset.
//!
//! relationships:
//!     - used by: telemetry.rs (ensure_ready), scheduler.rs (bring_up, reset)
//!     - uses: transport.rs, indicator.rs (stage leds), hal.rs (reset line)
//!
//! ==============================================================================

use std::time::Duration;

use crate::error::StageFailure;
use crate::hal::{Board, Clock, Output};
use crate::indicator::{self, ConnectivityStage};
use crate::transport::Transport;

pub struct Link {
    transport: Box<dyn Transport>,
    stage: ConnectivityStage,
    reset_pulse: Duration,
}

impl Link {
    pub fn new(transport: Box<dyn Transport>, reset_pulse: Duration) -> Self {
        Self { transport, stage: ConnectivityStage::Uninitialized, reset_pulse }
    }

    #[cfg(test)]
    pub fn stage(&self) -> ConnectivityStage {
        self.stage
    }

    pub fn transport(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    pub fn bring_up(&mut self, board: &Board) -> Result<(), StageFailure> {
        indicator::clear_stages(board);
        self.stage = ConnectivityStage::Uninitialized;

        self.transport.init_module().map_err(|e| {
            tracing::warn!("module error: {:#}", e);
            StageFailure::Module(e)
        })?;
        self.advance(board, ConnectivityStage::ModuleReady, Output::ModuleStage);

        self.transport.init_network().map_err(|e| {
            tracing::warn!("network error: {:#}", e);
            StageFailure::Network(e)
        })?;
        self.advance(board, ConnectivityStage::NetworkReady, Output::NetworkStage);

        self.transport.init_service().map_err(|e| {
            tracing::warn!("data service error: {:#}", e);
            StageFailure::Service(e)
        })?;
        self.advance(board, ConnectivityStage::ServiceReady, Output::ServiceStage);

        tracing::info!("link up");
        Ok(())
    }

    fn advance(&mut self, board: &Board, stage: ConnectivityStage, led: Output) {
        self.stage = stage;
        board.set(led, true);
        tracing::debug!(?stage, "bring-up step done");
    }

    /// Bring the link up unless the data service is already live.
    pub fn ensure_ready(&mut self, board: &Board) -> Result<(), StageFailure> {
        if self.stage == ConnectivityStage::ServiceReady {
            return Ok(());
        }
        self.bring_up(board)
    }

    /// Forget the live stage after a transport failure; leds are left as-is
    /// until the next bring-up clears them.
    pub fn invalidate(&mut self) {
        self.stage = ConnectivityStage::Uninitialized;
    }

    /// Pulse the active-low reset line and drop all link state.
    pub fn reset(&mut self, board: &Board, clock: &dyn Clock) {
        tracing::warn!("resetting modem");
        board.set(Output::ModemReset, false);
        clock.sleep(self.reset_pulse);
        board.set(Output::ModemReset, true);
        self.transport.reset_module();
        self.stage = ConnectivityStage::Uninitialized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PinsConfig;
    use crate::testutil::{FakeHal, ManualClock, ScriptedTransport};
    use std::sync::Arc;

    fn setup() -> (Arc<FakeHal>, Board, ScriptedTransport, Link) {
        let hal = Arc::new(FakeHal::default());
        let board = Board::new(hal.clone(), PinsConfig::default());
        let transport = ScriptedTransport::default();
        let link = Link::new(Box::new(transport.clone()), Duration::from_millis(100));
        (hal, board, transport, link)
    }

    fn lit(hal: &FakeHal, board: &Board, output: Output) -> bool {
        hal.level(board.output_pin(output)) == Some(true)
    }

    #[test]
    fn full_bring_up_lights_all_stages() {
        let (hal, board, _t, mut link) = setup();
        link.bring_up(&board).unwrap();
        assert_eq!(link.stage(), ConnectivityStage::ServiceReady);
        assert!(lit(&hal, &board, Output::ModuleStage));
        assert!(lit(&hal, &board, Output::NetworkStage));
        assert!(lit(&hal, &board, Output::ServiceStage));
    }

    #[test]
    fn network_failure_stops_and_keeps_module() {
        let (hal, board, t, mut link) = setup();
        t.fail_network(true);

        let err = link.bring_up(&board).unwrap_err();

        assert!(matches!(err, StageFailure::Network(_)));
        assert_eq!(link.stage(), ConnectivityStage::ModuleReady);
        assert!(lit(&hal, &board, Output::ModuleStage));
        assert!(!lit(&hal, &board, Output::NetworkStage));
        assert!(!lit(&hal, &board, Output::ServiceStage));
        assert_eq!(t.service_inits(), 0);
    }

    #[test]
    fn retry_clears_stage_leds_first() {
        let (hal, board, t, mut link) = setup();
        link.bring_up(&board).unwrap();
        t.fail_module(true);

        assert!(matches!(link.bring_up(&board), Err(StageFailure::Module(_))));
        assert!(!lit(&hal, &board, Output::ModuleStage));
        assert!(!lit(&hal, &board, Output::ServiceStage));
    }

    #[test]
    fn ensure_ready_skips_live_link() {
        let (_hal, board, t, mut link) = setup();
        link.ensure_ready(&board).unwrap();
        link.ensure_ready(&board).unwrap();
        assert_eq!(t.module_inits(), 1);

        link.invalidate();
        link.ensure_ready(&board).unwrap();
        assert_eq!(t.module_inits(), 2);
    }

    #[test]
    fn reset_is_idempotent() {
        let (hal, board, t, mut link) = setup();
        let clock = ManualClock::default();
        let reset_pin = board.output_pin(Output::ModemReset);

        link.reset(&board, &clock);
        let once = hal.snapshot();
        link.reset(&board, &clock);

        assert_eq!(hal.snapshot(), once);
        assert_eq!(hal.level(reset_pin), Some(true));
        assert_eq!(hal.writes_to(reset_pin), vec![false, true, false, true]);
        assert_eq!(t.resets(), 2);
        assert_eq!(link.stage(), ConnectivityStage::Uninitialized);
        assert_eq!(clock.now_ms(), 200);
    }
}
