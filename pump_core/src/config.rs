//! Runtime configuration types for the pump controller.
//!
//! These are the structs the controller and step output read on every tick.
//! They are separate from the TOML-deserialized config in `pump_config`.

/// Per-motor configuration (rarely changed).
#[derive(Debug, Clone, PartialEq)]
pub struct PumpCfg {
    /// Largest permitted speed magnitude (rev/min).
    pub max_speed: f32,
    /// Below this magnitude the motor is considered stopped.
    pub min_speed: f32,
    /// Ramp rate toward a non-zero target (speed units per second).
    pub accel_per_sec: f32,
    /// Ramp rate toward zero (speed units per second). Normally faster than accel.
    pub halt_per_sec: f32,
    /// Calibration: millilitres per clockwise (forward) revolution.
    pub ml_per_rev_cw: f32,
    /// Calibration: millilitres per counter-clockwise (reverse) revolution.
    pub ml_per_rev_ccw: f32,
    /// Initial dosing speed magnitude.
    pub dosing_speed: f32,
    /// Speed used by `start()` when no meaningful manual speed was recorded.
    pub default_start_speed: f32,
}

impl Default for PumpCfg {
    fn default() -> Self {
        Self {
            max_speed: 450.0,
            min_speed: 0.01,
            accel_per_sec: 50.0,
            halt_per_sec: 200.0,
            ml_per_rev_cw: 2.6,
            ml_per_rev_ccw: 2.6,
            dosing_speed: 180.0,
            default_start_speed: 120.0,
        }
    }
}

/// Step output geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveCfg {
    pub microstepping: u16,
    pub step_angle_deg: f32,
    /// Frequencies below this disable the driver instead of pulsing.
    pub min_frequency_hz: f32,
}

impl Default for DriveCfg {
    fn default() -> Self {
        Self {
            microstepping: 8,
            step_angle_deg: 1.8,
            min_frequency_hz: 1.0,
        }
    }
}

impl DriveCfg {
    /// Microsteps per full output revolution.
    #[inline]
    pub fn steps_per_rev(&self) -> f32 {
        (360.0 / self.step_angle_deg) * f32::from(self.microstepping)
    }
}

/// Control loop pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCfg {
    /// Minimum period between controller ticks in milliseconds.
    pub tick_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self { tick_ms: 10 }
    }
}
