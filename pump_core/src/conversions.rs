//! `From` implementations bridging `pump_config` sections to runtime structs.

use crate::config::{ControlCfg, DriveCfg, PumpCfg};

// ── PumpCfg ──────────────────────────────────────────────────────────────────

impl From<&pump_config::Pump> for PumpCfg {
    fn from(c: &pump_config::Pump) -> Self {
        Self {
            max_speed: c.max_speed,
            min_speed: c.min_speed,
            accel_per_sec: c.accel_per_sec,
            halt_per_sec: c.halt_per_sec,
            ml_per_rev_cw: c.ml_per_rev_cw,
            ml_per_rev_ccw: c.ml_per_rev_ccw,
            dosing_speed: c.dosing_speed,
            default_start_speed: c.default_start_speed,
        }
    }
}

// ── DriveCfg ─────────────────────────────────────────────────────────────────

impl From<&pump_config::Drive> for DriveCfg {
    fn from(c: &pump_config::Drive) -> Self {
        Self {
            microstepping: c.microstepping,
            step_angle_deg: c.step_angle_deg,
            min_frequency_hz: c.min_frequency_hz,
        }
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&pump_config::Control> for ControlCfg {
    fn from(c: &pump_config::Control) -> Self {
        Self { tick_ms: c.tick_ms }
    }
}
