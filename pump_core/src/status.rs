//! Externally visible run state of one motor.

/// Collapsed view of `running` and `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// Not running; realized speed may still be ramping down.
    Stopped,
    /// Running continuously at the target speed.
    RunningFlow,
    /// Running until the requested volume has been delivered.
    RunningDosing,
}

impl PumpStatus {
    pub fn is_running(self) -> bool {
        !matches!(self, Self::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::RunningFlow => "flow",
            Self::RunningDosing => "dosing",
        }
    }
}

impl std::fmt::Display for PumpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
