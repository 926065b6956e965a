//! Fixed-size response records: discovery hello and motor state.

use bytes::{BufMut, Bytes, BytesMut};
use pump_core::fixed_point::{dequantize, quantize_i16, quantize_u16, quantize_u32};
use pump_core::{Mode, MotorState, PumpController};

use crate::error::FrameError;
use crate::fields::{read_i16, read_u8, read_u16, read_u32};
use crate::frame;

/// "PX"
pub const MAGIC: [u8; 2] = [0x50, 0x58];
pub const PROTOCOL_VERSION: u8 = 1;

/// Hello response length, checksum included.
pub const HELLO_LEN: usize = 6;
/// State response length, checksum included.
pub const STATE_LEN: usize = 29;

/// Discovery reply: who is there and how many motors it drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloRecord {
    pub version: u8,
    pub motor_count: u8,
}

impl HelloRecord {
    pub fn new(motor_count: u8) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            motor_count,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HELLO_LEN);
        buf.put_slice(&MAGIC);
        buf.put_u8(self.version);
        buf.put_u8(self.motor_count);
        buf.put_u8(0); // reserved
        frame::seal(&mut buf);
        buf.freeze()
    }

    /// Validate length, checksum, magic and protocol version.
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        let content = frame::open_exact(frame, HELLO_LEN)?;
        if content.get(..2) != Some(&MAGIC[..]) {
            return Err(FrameError::BadMagic);
        }
        let version = read_u8(content, 2).ok_or(FrameError::TooShort(frame.len()))?;
        if version != PROTOCOL_VERSION {
            return Err(FrameError::UnsupportedVersion(version));
        }
        let motor_count = read_u8(content, 3).ok_or(FrameError::TooShort(frame.len()))?;
        Ok(Self {
            version,
            motor_count,
        })
    }
}

// Byte offsets inside the state record.
const OFF_MODE: usize = 0;
const OFF_RUNNING: usize = 1;
const OFF_TARGET: usize = 2;
const OFF_CURRENT: usize = 4;
const OFF_REMAINING: usize = 6;
const OFF_UPTIME: usize = 8;
const OFF_TOTAL: usize = 12;
const OFF_HOSE: usize = 16;
const OFF_ML_CW: usize = 20;
const OFF_ML_CCW: usize = 22;
const OFF_DOSING_SPEED: usize = 24;
const OFF_MAX_SPEED: usize = 26;

const MODE_DOSING: u8 = 1;

/// One motor's state in wire units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateRecord {
    pub dosing: bool,
    pub running: bool,
    pub target_speed_x10: i16,
    pub current_speed_x10: i16,
    pub dosing_remaining_ml: u16,
    pub uptime_sec: u32,
    pub total_volume_ml: u32,
    pub hose_volume_ml: u32,
    pub ml_per_rev_cw_x100: u16,
    pub ml_per_rev_ccw_x100: u16,
    pub dosing_speed_x10: u16,
    pub max_speed_x10: u16,
}

impl StateRecord {
    /// Snapshot a controller.
    pub fn capture(ctrl: &PumpController) -> Self {
        let st = ctrl.state();
        Self {
            dosing: st.mode == Mode::Dosing,
            running: st.running,
            target_speed_x10: quantize_i16(st.target_speed, 10.0),
            current_speed_x10: quantize_i16(st.current_speed, 10.0),
            dosing_remaining_ml: quantize_u16(st.dosing_remaining_ml, 1.0),
            uptime_sec: st.total_uptime_sec,
            total_volume_ml: quantize_u32(st.total_volume_l, 1000.0),
            hose_volume_ml: quantize_u32(st.hose_volume_l, 1000.0),
            ml_per_rev_cw_x100: quantize_u16(st.ml_per_rev_cw, 100.0),
            ml_per_rev_ccw_x100: quantize_u16(st.ml_per_rev_ccw, 100.0),
            dosing_speed_x10: quantize_u16(st.dosing_speed, 10.0),
            max_speed_x10: quantize_u16(ctrl.config().max_speed, 10.0),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(STATE_LEN);
        buf.put_u8(if self.dosing { MODE_DOSING } else { 0 });
        buf.put_u8(u8::from(self.running));
        buf.put_i16_le(self.target_speed_x10);
        buf.put_i16_le(self.current_speed_x10);
        buf.put_u16_le(self.dosing_remaining_ml);
        buf.put_u32_le(self.uptime_sec);
        buf.put_u32_le(self.total_volume_ml);
        buf.put_u32_le(self.hose_volume_ml);
        buf.put_u16_le(self.ml_per_rev_cw_x100);
        buf.put_u16_le(self.ml_per_rev_ccw_x100);
        buf.put_u16_le(self.dosing_speed_x10);
        buf.put_u16_le(self.max_speed_x10);
        frame::seal(&mut buf);
        buf.freeze()
    }

    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        let c = frame::open_exact(frame, STATE_LEN)?;
        let short = FrameError::TooShort(frame.len());
        Ok(Self {
            dosing: read_u8(c, OFF_MODE).ok_or(short)? == MODE_DOSING,
            running: read_u8(c, OFF_RUNNING).ok_or(short)? != 0,
            target_speed_x10: read_i16(c, OFF_TARGET).ok_or(short)?,
            current_speed_x10: read_i16(c, OFF_CURRENT).ok_or(short)?,
            dosing_remaining_ml: read_u16(c, OFF_REMAINING).ok_or(short)?,
            uptime_sec: read_u32(c, OFF_UPTIME).ok_or(short)?,
            total_volume_ml: read_u32(c, OFF_TOTAL).ok_or(short)?,
            hose_volume_ml: read_u32(c, OFF_HOSE).ok_or(short)?,
            ml_per_rev_cw_x100: read_u16(c, OFF_ML_CW).ok_or(short)?,
            ml_per_rev_ccw_x100: read_u16(c, OFF_ML_CCW).ok_or(short)?,
            dosing_speed_x10: read_u16(c, OFF_DOSING_SPEED).ok_or(short)?,
            max_speed_x10: read_u16(c, OFF_MAX_SPEED).ok_or(short)?,
        })
    }

    /// Overwrite a shadow controller with this record.
    ///
    /// The max-speed field goes through `set_max_speed` first, so the restored
    /// speeds are clamped against the new ceiling. The resume speed is local to
    /// the shadow and kept.
    pub fn apply_to(&self, shadow: &mut PumpController) {
        let previous = shadow.state();
        let state = MotorState {
            mode: if self.dosing { Mode::Dosing } else { Mode::Flow },
            running: self.running,
            target_speed: dequantize(self.target_speed_x10, 10.0) as f32,
            current_speed: dequantize(self.current_speed_x10, 10.0) as f32,
            last_manual_speed: previous.last_manual_speed,
            dosing_remaining_ml: f32::from(self.dosing_remaining_ml),
            total_uptime_sec: self.uptime_sec,
            total_volume_l: dequantize(self.total_volume_ml, 1000.0),
            hose_volume_l: dequantize(self.hose_volume_ml, 1000.0),
            ml_per_rev_cw: dequantize(self.ml_per_rev_cw_x100, 100.0) as f32,
            ml_per_rev_ccw: dequantize(self.ml_per_rev_ccw_x100, 100.0) as f32,
            dosing_speed: dequantize(self.dosing_speed_x10, 10.0) as f32,
        };
        shadow.set_max_speed(dequantize(self.max_speed_x10, 10.0) as f32);
        shadow.restore_state(state);
    }
}
