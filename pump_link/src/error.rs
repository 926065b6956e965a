//! Frame classification and link failure types.
//!
//! The bus traits in `pump_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to `LinkError`, with an optional feature-gated path
//! for `pump_hardware::HwError` downcasting.

use thiserror::Error;

/// Why an inbound frame or response was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short ({0} bytes)")]
    TooShort(usize),
    #[error("checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    BadChecksum { expected: u8, actual: u8 },
    #[error("unknown command {0:#04x}")]
    UnknownCommand(u8),
    #[error("motor id {0} out of range")]
    MotorOutOfRange(u8),
    #[error("payload too short for command {cmd:#04x} ({len} bytes)")]
    PayloadTooShort { cmd: u8, len: usize },
    #[error("unexpected length {actual}, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("frame of {0} bytes exceeds the receive buffer")]
    TooLarge(usize),
    #[error("bad magic bytes")]
    BadMagic,
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
}

/// Failure of a master-side link operation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkError {
    #[error("link disabled")]
    Disabled,
    #[error("link disconnected")]
    Disconnected,
    #[error("unknown remote motor {0}")]
    UnknownMotor(u8),
    #[error("bus timeout")]
    Timeout,
    #[error("bus transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(#[from] FrameError),
    #[error("no peer answered discovery")]
    NoPeer,
}

impl LinkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Map a transport-boundary error to a typed `LinkError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_bus_error(e: &(dyn std::error::Error + 'static)) -> LinkError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<pump_hardware::error::HwError>() {
            return match hw {
                pump_hardware::error::HwError::Timeout => LinkError::Timeout,
                other => LinkError::Transport(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        LinkError::Timeout
    } else {
        LinkError::Transport(s)
    }
}
