use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PumpError {
    #[error("unknown motor id {0}")]
    UnknownMotor(u8),
    #[error("motor {0} is already running")]
    Busy(u8),
    #[error("dose volume must be non-zero")]
    ZeroVolume,
    #[error("hardware error: {0}")]
    Hardware(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing bus transport")]
    MissingBus,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
