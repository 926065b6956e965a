//! Speed to step-pulse output.
//!
//! A motor channel is driven by a step frequency proportional to the realized
//! speed plus a direction line. Speeds too slow to produce a useful pulse train
//! disable the driver instead.

use crate::config::DriveCfg;
use crate::error::PumpError;
use pump_traits::StepDriver;

/// What the step output was told to do for one motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutput {
    Disabled,
    Running { hz: f32, reverse: bool },
}

/// Step frequency for `speed` rev/min: `|speed| * steps_per_rev / 60`.
#[inline]
pub fn speed_to_frequency(speed: f32, drive: &DriveCfg) -> f32 {
    if !speed.is_finite() {
        return 0.0;
    }
    speed.abs() * drive.steps_per_rev() / 60.0
}

/// Decide the output for `speed` without touching hardware.
pub fn plan_output(speed: f32, min_speed: f32, drive: &DriveCfg) -> StepOutput {
    if speed.is_nan() || speed.abs() < min_speed {
        return StepOutput::Disabled;
    }
    let hz = speed_to_frequency(speed, drive);
    if hz < drive.min_frequency_hz {
        return StepOutput::Disabled;
    }
    StepOutput::Running {
        hz,
        reverse: speed < 0.0,
    }
}

/// Apply `speed` to `driver`, returning what was commanded.
pub fn apply_speed<D: StepDriver + ?Sized>(
    driver: &mut D,
    speed: f32,
    min_speed: f32,
    drive: &DriveCfg,
) -> Result<StepOutput, PumpError> {
    let out = plan_output(speed, min_speed, drive);
    let res = match out {
        StepOutput::Disabled => driver.disable(),
        StepOutput::Running { hz, reverse } => driver.run(hz, reverse),
    };
    res.map_err(|e| PumpError::Hardware(e.to_string()))?;
    Ok(out)
}
