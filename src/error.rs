use thiserror::Error;

/// Which step of modem bring-up failed.
#[derive(Error, Debug)]
pub enum StageFailure {
    #[error("module init failed: {0:#}")]
    Module(anyhow::Error),

    #[error("network init failed: {0:#}")]
    Network(anyhow::Error),

    #[error("data service init failed: {0:#}")]
    Service(anyhow::Error),
}

/// Failures of one telemetry synchronization step.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("connectivity: {0}")]
    Stage(#[from] StageFailure),

    #[error("sensor read failed: {0:#}")]
    Sensor(anyhow::Error),

    #[error("settings fetch failed: {0:#}")]
    SettingsFetch(anyhow::Error),

    /// the document carried none of the recognized keys
    #[error("settings document has no recognized keys")]
    SettingsParse,

    #[error("telemetry post failed: {0:#}")]
    Transmit(anyhow::Error),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
