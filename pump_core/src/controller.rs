//! Per-motor speed ramp and volume dosing state machine (`PumpController`).
//!
//! The controller never touches hardware. A control loop feeds elapsed time
//! into [`PumpController::tick`], which moves the realized speed toward the
//! target at a bounded rate, integrates pumped volume and uptime, and ends a
//! dose once its volume has been delivered.
//!
//! Speeds are in rev/min (sign = direction, positive = clockwise/forward).

use crate::config::PumpCfg;
use crate::status::PumpStatus;
use crate::util::{MILLIS_PER_SEC, flow_to_speed, reference_ml_per_rev};

/// Smallest accepted value for `set_max_speed`.
pub const MIN_MAX_SPEED: f32 = 1.0;

/// Operating mode of a motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Run continuously at the target speed.
    #[default]
    Flow,
    /// Run until `dosing_remaining_ml` has been delivered, then stop.
    Dosing,
}

/// Mutable per-motor state, updated by commands and by every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MotorState {
    pub mode: Mode,
    pub target_speed: f32,
    pub current_speed: f32,
    /// Last meaningful speed requested through `set_speed`; resumed by `start()`.
    pub last_manual_speed: f32,
    pub ml_per_rev_cw: f32,
    pub ml_per_rev_ccw: f32,
    /// Dosing speed magnitude; the sign is applied when a dose starts.
    pub dosing_speed: f32,
    pub running: bool,
    pub dosing_remaining_ml: f32,
    pub total_uptime_sec: u32,
    /// Lifetime pumped volume in litres.
    pub total_volume_l: f64,
    /// Pumped volume since the last hose replacement, in litres.
    pub hose_volume_l: f64,
}

impl MotorState {
    /// Fresh state seeded from configuration defaults.
    pub fn from_cfg(cfg: &PumpCfg) -> Self {
        Self {
            mode: Mode::Flow,
            target_speed: 0.0,
            current_speed: 0.0,
            last_manual_speed: cfg.default_start_speed,
            ml_per_rev_cw: cfg.ml_per_rev_cw,
            ml_per_rev_ccw: cfg.ml_per_rev_ccw,
            dosing_speed: cfg.dosing_speed,
            running: false,
            dosing_remaining_ml: 0.0,
            total_uptime_sec: 0,
            total_volume_l: 0.0,
            hose_volume_l: 0.0,
        }
    }

    /// Calibration for the direction implied by `speed`.
    #[inline]
    pub fn ml_per_rev_for(&self, speed: f32) -> f32 {
        if speed >= 0.0 {
            self.ml_per_rev_cw
        } else {
            self.ml_per_rev_ccw
        }
    }

    /// State-machine view of this state.
    pub fn status(&self) -> PumpStatus {
        match (self.running, self.mode) {
            (false, _) => PumpStatus::Stopped,
            (true, Mode::Flow) => PumpStatus::RunningFlow,
            (true, Mode::Dosing) => PumpStatus::RunningDosing,
        }
    }
}

impl Default for MotorState {
    fn default() -> Self {
        Self::from_cfg(&PumpCfg::default())
    }
}

#[inline]
fn clamp_symmetric(v: f32, limit: f32) -> f32 {
    v.max(-limit).min(limit)
}

#[inline]
fn clamp_range(v: f32, lo: f32, hi: f32) -> f32 {
    v.max(lo).min(hi)
}

/// Ramp/dosing controller for one motor.
#[derive(Debug, Clone)]
pub struct PumpController {
    cfg: PumpCfg,
    state: MotorState,
    uptime_remainder_ms: u32,
}

impl Default for PumpController {
    fn default() -> Self {
        Self::new(PumpCfg::default())
    }
}

impl PumpController {
    pub fn new(cfg: PumpCfg) -> Self {
        let state = MotorState::from_cfg(&cfg);
        Self {
            cfg,
            state,
            uptime_remainder_ms: 0,
        }
    }

    pub fn config(&self) -> &PumpCfg {
        &self.cfg
    }

    pub fn state(&self) -> &MotorState {
        &self.state
    }

    pub fn status(&self) -> PumpStatus {
        self.state.status()
    }

    #[inline]
    fn is_meaningful(&self, speed: f32) -> bool {
        speed.abs() >= self.cfg.min_speed
    }

    /// Request a signed target speed in the given mode.
    ///
    /// The request is clamped to `[-max_speed, max_speed]`. A magnitude below
    /// `min_speed` is a stop request.
    pub fn set_speed(&mut self, speed: f32, mode: Mode) {
        let speed = if speed.is_nan() { 0.0 } else { speed };
        let clamped = clamp_symmetric(speed, self.cfg.max_speed);

        if !self.is_meaningful(clamped) {
            self.state.target_speed = 0.0;
            self.state.mode = Mode::Flow;
            self.state.running = false;
            return;
        }

        self.state.target_speed = clamped;
        self.state.mode = mode;
        self.state.running = true;
        self.state.last_manual_speed = clamped;
    }

    /// Resume the last manual speed (or the configured default) in flow mode.
    pub fn start(&mut self) {
        let mut speed = self.state.last_manual_speed;
        if !self.is_meaningful(speed) {
            speed = self.cfg.default_start_speed;
        }
        self.set_speed(speed, Mode::Flow);
    }

    /// Stop the motor. With `emergency`, the realized speed drops to zero at once.
    pub fn stop(&mut self, emergency: bool) {
        self.state.target_speed = 0.0;
        self.state.mode = Mode::Flow;
        self.state.running = false;
        if emergency {
            self.state.current_speed = 0.0;
        }
    }

    /// Dose `volume_ml` millilitres; negative volumes run in reverse. Zero stops.
    pub fn start_dosing(&mut self, volume_ml: i32) {
        if volume_ml == 0 {
            self.stop(false);
            return;
        }

        self.state.mode = Mode::Dosing;
        self.state.dosing_remaining_ml = volume_ml.unsigned_abs() as f32;
        let magnitude = self.state.dosing_speed.abs();
        let speed = if volume_ml > 0 { magnitude } else { -magnitude };
        tracing::info!(volume_ml, speed, "dose start");
        self.set_speed(speed, Mode::Dosing);
    }

    /// Update calibration; non-positive values leave the corresponding side unchanged.
    pub fn set_ml_per_rev(&mut self, cw: f32, ccw: f32) {
        if cw > 0.0 {
            self.state.ml_per_rev_cw = cw;
        }
        if ccw > 0.0 {
            self.state.ml_per_rev_ccw = ccw;
        }
    }

    /// Store a dosing speed magnitude clamped to `[min_speed, max_speed]`.
    pub fn set_dosing_speed(&mut self, speed: f32) {
        if speed.is_nan() || !self.is_meaningful(speed) {
            return;
        }
        self.state.dosing_speed = clamp_range(speed.abs(), self.cfg.min_speed, self.cfg.max_speed);
    }

    /// Change the speed ceiling and re-clamp every stored speed against it.
    pub fn set_max_speed(&mut self, speed: f32) {
        if speed.is_nan() || speed < MIN_MAX_SPEED {
            return;
        }
        let max = speed;
        self.cfg.max_speed = max;
        self.state.target_speed = clamp_symmetric(self.state.target_speed, max);
        self.state.current_speed = clamp_symmetric(self.state.current_speed, max);
        self.state.last_manual_speed = clamp_symmetric(self.state.last_manual_speed, max);
        self.state.dosing_speed = clamp_range(self.state.dosing_speed.abs(), self.cfg.min_speed, max);
    }

    /// Run at `lph` litres/hour using the calibration for the requested direction.
    pub fn set_flow(&mut self, lph: f32, reverse: bool) {
        let ml_per_rev = if reverse {
            self.state.ml_per_rev_ccw
        } else {
            self.state.ml_per_rev_cw
        };
        self.set_speed(flow_to_speed(lph, ml_per_rev, reverse), Mode::Flow);
    }

    /// Apply a settings update expressed in flow units. Zero (or negative) leaves a field unchanged.
    ///
    /// Dosing and max flow are converted to speed with the CW calibration as it stands
    /// after the ml/rev update.
    pub fn apply_settings(
        &mut self,
        ml_per_rev_cw: f32,
        ml_per_rev_ccw: f32,
        dosing_flow_lph: f32,
        max_flow_lph: f32,
    ) {
        if ml_per_rev_cw > 0.0 || ml_per_rev_ccw > 0.0 {
            self.set_ml_per_rev(ml_per_rev_cw, ml_per_rev_ccw);
        }
        if dosing_flow_lph > 0.0 {
            let reference = reference_ml_per_rev(self.state.ml_per_rev_cw);
            self.set_dosing_speed(flow_to_speed(dosing_flow_lph, reference, false));
        }
        if max_flow_lph > 0.0 {
            let reference = reference_ml_per_rev(self.state.ml_per_rev_cw);
            self.set_max_speed(flow_to_speed(max_flow_lph, reference, false));
        }
    }

    /// Replace the whole state, e.g. with a shadow copy read from a peer or a
    /// persisted snapshot. Stored speeds are clamped to the current ceiling.
    pub fn restore_state(&mut self, state: MotorState) {
        let max = self.cfg.max_speed;
        self.state = state;
        self.state.target_speed = clamp_symmetric(self.state.target_speed, max);
        self.state.current_speed = clamp_symmetric(self.state.current_speed, max);
        self.state.last_manual_speed = clamp_symmetric(self.state.last_manual_speed, max);
        self.state.dosing_speed = self.state.dosing_speed.abs().min(max);
        self.state.dosing_remaining_ml = self.state.dosing_remaining_ml.max(0.0);
        self.uptime_remainder_ms = 0;
    }

    /// Advance the controller by `delta_ms` milliseconds.
    pub fn tick(&mut self, delta_ms: u32) {
        if delta_ms == 0 {
            return;
        }

        let dt_sec = delta_ms as f32 / MILLIS_PER_SEC as f32;
        let target_is_stop = !self.is_meaningful(self.state.target_speed);
        let rate = if target_is_stop {
            self.cfg.halt_per_sec
        } else {
            self.cfg.accel_per_sec
        };
        let step = rate * dt_sec;

        let st = &mut self.state;
        if st.current_speed < st.target_speed {
            st.current_speed = (st.current_speed + step).min(st.target_speed);
        } else if st.current_speed > st.target_speed {
            st.current_speed = (st.current_speed - step).max(st.target_speed);
        }

        if target_is_stop && st.current_speed.abs() < self.cfg.min_speed {
            st.current_speed = 0.0;
            st.running = false;
        }

        let moving = st.current_speed.abs() >= self.cfg.min_speed;
        let delta_ml = if moving {
            st.current_speed.abs() / 60.0 * st.ml_per_rev_for(st.current_speed) * dt_sec
        } else {
            0.0
        };

        if delta_ml > 0.0 {
            let delta_l = f64::from(delta_ml) / 1000.0;
            st.total_volume_l += delta_l;
            st.hose_volume_l += delta_l;
        }

        if moving {
            let carried = self.uptime_remainder_ms + delta_ms % MILLIS_PER_SEC;
            st.total_uptime_sec = st
                .total_uptime_sec
                .saturating_add(delta_ms / MILLIS_PER_SEC)
                .saturating_add(carried / MILLIS_PER_SEC);
            self.uptime_remainder_ms = carried % MILLIS_PER_SEC;
        }

        if st.mode == Mode::Dosing && st.dosing_remaining_ml > 0.0 {
            st.dosing_remaining_ml -= delta_ml;
            if st.dosing_remaining_ml <= 0.0 {
                st.dosing_remaining_ml = 0.0;
                tracing::info!("dose complete");
                self.stop(false);
            }
        }
    }
}
