//! Flow/speed unit conversions and time constants.

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u32 = 1_000;

/// Calibration used when a stored ml/rev value is unusable.
pub const FALLBACK_ML_PER_REV: f32 = 2.6;

/// Convert a flow in litres/hour to a signed speed in rev/min.
///
/// `speed = (lph * 1000 / 60) / ml_per_rev`, negated for reverse.
/// A non-positive calibration yields 0 (stop) rather than a division blow-up.
#[inline]
pub fn flow_to_speed(lph: f32, ml_per_rev: f32, reverse: bool) -> f32 {
    if ml_per_rev.is_nan() || ml_per_rev <= 0.0 {
        return 0.0;
    }
    let speed = (lph.abs() * 1000.0 / 60.0) / ml_per_rev;
    if reverse { -speed } else { speed }
}

/// Convert a speed in rev/min to an unsigned flow in litres/hour.
#[inline]
pub fn speed_to_flow(speed: f32, ml_per_rev: f32) -> f32 {
    speed.abs() * ml_per_rev.max(0.0) * 60.0 / 1000.0
}

/// Calibration to use for flow-rate settings: CW value, or the fallback when unusable.
#[inline]
pub fn reference_ml_per_rev(ml_per_rev_cw: f32) -> f32 {
    if ml_per_rev_cw > 0.0 {
        ml_per_rev_cw
    } else {
        FALLBACK_ML_PER_REV
    }
}
