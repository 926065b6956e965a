//! Fixed-point quantisation helpers for the wire format.
//!
//! Every field on the secondary bus is an integer: speeds x10, flow rates x10,
//! ml/rev x100, volumes in whole ml, litre counters x1000. These helpers round
//! to nearest and saturate at the integer range. Non-finite input maps to 0.

/// Quantize `value * scale` to a signed 16-bit integer.
#[inline]
pub fn quantize_i16(value: f32, scale: f32) -> i16 {
    let scaled = (value * scale).round();
    if !scaled.is_finite() {
        return 0;
    }
    if scaled >= f32::from(i16::MAX) {
        i16::MAX
    } else if scaled <= f32::from(i16::MIN) {
        i16::MIN
    } else {
        scaled as i16
    }
}

/// Quantize `value * scale` to an unsigned 16-bit integer; negatives map to 0.
#[inline]
pub fn quantize_u16(value: f32, scale: f32) -> u16 {
    let scaled = (value * scale).round();
    if !scaled.is_finite() || scaled <= 0.0 {
        return 0;
    }
    if scaled >= f32::from(u16::MAX) {
        u16::MAX
    } else {
        scaled as u16
    }
}

/// Quantize a double-precision counter to an unsigned 32-bit integer.
#[inline]
pub fn quantize_u32(value: f64, scale: f64) -> u32 {
    let scaled = (value * scale).round();
    if !scaled.is_finite() || scaled <= 0.0 {
        return 0;
    }
    if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Undo a fixed-point scale.
#[inline]
pub fn dequantize(raw: impl Into<f64>, scale: f64) -> f64 {
    raw.into() / scale
}
