//! ==============================================================================
//! indicator.rs - status and connectivity leds
//! ==============================================================================
//!
//! purpose:
//!     turns classified readings and the modem bring-up stage into led levels.
//!
//!     status leds: exactly one of low / normal / high is lit.
//!     stage leds: module, network, service; each set independently as its
//!     bring-up step succeeds, all cleared together when bring-up restarts.
//!
//! relationships:
//!     - used by: connectivity.rs (stage leds), telemetry.rs, scheduler.rs
//!     - uses: hal.rs (Board)
//!
//! ==============================================================================

use crate::domain::{Quantity, Settings};
use crate::hal::{Board, Output};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Low,
    Normal,
    High,
}

impl Classification {
    fn output(self) -> Output {
        match self {
            Classification::Low => Output::StatusLow,
            Classification::Normal => Output::StatusNormal,
            Classification::High => Output::StatusHigh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectivityStage {
    Uninitialized,
    ModuleReady,
    NetworkReady,
    ServiceReady,
}

/// A breach of any minimum wins over a breach of any maximum.
pub fn classify(settings: &Settings) -> Classification {
    let readings = Quantity::ALL.map(|q| settings.reading(q));
    if readings.iter().any(|r| r.below_min()) {
        Classification::Low
    } else if readings.iter().any(|r| r.above_max()) {
        Classification::High
    } else {
        Classification::Normal
    }
}

pub fn render_status(board: &Board, classification: Classification) {
    for c in [Classification::Low, Classification::Normal, Classification::High] {
        if c != classification {
            board.set(c.output(), false);
        }
    }
    board.set(classification.output(), true);
}

/// Stage leds reflect every step reached so far.
pub fn render_stage(board: &Board, stage: ConnectivityStage) {
    board.set(Output::ModuleStage, stage >= ConnectivityStage::ModuleReady);
    board.set(Output::NetworkStage, stage >= ConnectivityStage::NetworkReady);
    board.set(Output::ServiceStage, stage >= ConnectivityStage::ServiceReady);
}

pub fn clear_stages(board: &Board) {
    render_stage(board, ConnectivityStage::Uninitialized);
}
