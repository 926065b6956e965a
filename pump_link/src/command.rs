//! Command table and request encoding/decoding.
//!
//! | Code | Command      | Body after code                                  | Reply        |
//! |------|--------------|--------------------------------------------------|--------------|
//! | 0x01 | Hello        | none                                             | hello record |
//! | 0x10 | GetState     | motor                                            | state record |
//! | 0x20 | SetFlow      | motor, l/h x10 (u16), reverse (u8)               | none         |
//! | 0x21 | StartDosing  | motor, volume ml (u16), reverse (u8)             | none         |
//! | 0x22 | Stop         | motor                                            | none         |
//! | 0x23 | Start        | motor                                            | none         |
//! | 0x24 | SetSettings  | motor, cw x100, ccw x100, dose l/h x10, max l/h x10 | none      |

use bytes::{BufMut, Bytes, BytesMut};
use pump_core::fixed_point::{dequantize, quantize_u16};

use crate::error::FrameError;
use crate::fields::{read_u8, read_u16};
use crate::frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandCode {
    Hello = 0x01,
    GetState = 0x10,
    SetFlow = 0x20,
    StartDosing = 0x21,
    Stop = 0x22,
    Start = 0x23,
    SetSettings = 0x24,
}

impl CommandCode {
    /// Minimum body length (code through checksum) the subordinate accepts.
    pub const fn min_len(self) -> usize {
        match self {
            Self::Hello => 2,
            Self::GetState | Self::Stop | Self::Start => 3,
            Self::SetFlow | Self::StartDosing => 6,
            Self::SetSettings => 11,
        }
    }

    /// Whether the subordinate answers this command.
    pub const fn has_response(self) -> bool {
        matches!(self, Self::Hello | Self::GetState)
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = FrameError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0x01 => Self::Hello,
            0x10 => Self::GetState,
            0x20 => Self::SetFlow,
            0x21 => Self::StartDosing,
            0x22 => Self::Stop,
            0x23 => Self::Start,
            0x24 => Self::SetSettings,
            other => return Err(FrameError::UnknownCommand(other)),
        })
    }
}

/// Settings update in wire units. A zero field leaves that value unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireSettings {
    pub ml_per_rev_cw_x100: u16,
    pub ml_per_rev_ccw_x100: u16,
    pub dosing_flow_x10: u16,
    pub max_flow_x10: u16,
}

impl WireSettings {
    /// Quantize engineering units; negative inputs become 0 (unchanged).
    pub fn from_units(ml_per_rev_cw: f32, ml_per_rev_ccw: f32, dosing_lph: f32, max_lph: f32) -> Self {
        Self {
            ml_per_rev_cw_x100: quantize_u16(ml_per_rev_cw, 100.0),
            ml_per_rev_ccw_x100: quantize_u16(ml_per_rev_ccw, 100.0),
            dosing_flow_x10: quantize_u16(dosing_lph, 10.0),
            max_flow_x10: quantize_u16(max_lph, 10.0),
        }
    }

    pub fn ml_per_rev_cw(&self) -> f32 {
        dequantize(self.ml_per_rev_cw_x100, 100.0) as f32
    }

    pub fn ml_per_rev_ccw(&self) -> f32 {
        dequantize(self.ml_per_rev_ccw_x100, 100.0) as f32
    }

    pub fn dosing_flow_lph(&self) -> f32 {
        dequantize(self.dosing_flow_x10, 10.0) as f32
    }

    pub fn max_flow_lph(&self) -> f32 {
        dequantize(self.max_flow_x10, 10.0) as f32
    }
}

/// A decoded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Hello,
    GetState { motor: u8 },
    SetFlow { motor: u8, flow_x10: u16, reverse: bool },
    StartDosing { motor: u8, volume_ml: u16, reverse: bool },
    Stop { motor: u8 },
    Start { motor: u8 },
    SetSettings { motor: u8, settings: WireSettings },
}

impl Command {
    /// Set-flow from litres/hour; the magnitude is sent, direction travels in the flag.
    pub fn set_flow(motor: u8, lph: f32, reverse: bool) -> Self {
        Self::SetFlow {
            motor,
            flow_x10: quantize_u16(lph.abs(), 10.0),
            reverse,
        }
    }

    pub const fn code(&self) -> CommandCode {
        match self {
            Self::Hello => CommandCode::Hello,
            Self::GetState { .. } => CommandCode::GetState,
            Self::SetFlow { .. } => CommandCode::SetFlow,
            Self::StartDosing { .. } => CommandCode::StartDosing,
            Self::Stop { .. } => CommandCode::Stop,
            Self::Start { .. } => CommandCode::Start,
            Self::SetSettings { .. } => CommandCode::SetSettings,
        }
    }

    /// Target motor, `None` for the discovery probe.
    pub const fn motor(&self) -> Option<u8> {
        match *self {
            Self::Hello => None,
            Self::GetState { motor }
            | Self::SetFlow { motor, .. }
            | Self::StartDosing { motor, .. }
            | Self::Stop { motor }
            | Self::Start { motor }
            | Self::SetSettings { motor, .. } => Some(motor),
        }
    }

    /// Encode to a sealed body (code, fields, checksum).
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.code().min_len());
        buf.put_u8(self.code() as u8);
        match *self {
            Self::Hello => {}
            Self::GetState { motor } | Self::Stop { motor } | Self::Start { motor } => {
                buf.put_u8(motor);
            }
            Self::SetFlow {
                motor,
                flow_x10: value,
                reverse,
            }
            | Self::StartDosing {
                motor,
                volume_ml: value,
                reverse,
            } => {
                buf.put_u8(motor);
                buf.put_u16_le(value);
                buf.put_u8(u8::from(reverse));
            }
            Self::SetSettings { motor, settings } => {
                buf.put_u8(motor);
                buf.put_u16_le(settings.ml_per_rev_cw_x100);
                buf.put_u16_le(settings.ml_per_rev_ccw_x100);
                buf.put_u16_le(settings.dosing_flow_x10);
                buf.put_u16_le(settings.max_flow_x10);
            }
        }
        frame::seal(&mut buf);
        buf.freeze()
    }

    /// Decode and validate a request body addressed to a unit with `motor_count` motors.
    ///
    /// Checks run in order: minimum length, checksum, known command, motor id
    /// range, per-command payload length. Trailing bytes past a command's
    /// fields are tolerated.
    pub fn decode(body: &[u8], motor_count: usize) -> Result<Self, FrameError> {
        let content = frame::open(body)?;
        let raw = read_u8(content, 0).ok_or(FrameError::TooShort(body.len()))?;
        let code = CommandCode::try_from(raw)?;
        if code == CommandCode::Hello {
            return Ok(Self::Hello);
        }

        let motor = read_u8(content, 1).ok_or(FrameError::PayloadTooShort {
            cmd: raw,
            len: body.len(),
        })?;
        if usize::from(motor) >= motor_count {
            return Err(FrameError::MotorOutOfRange(motor));
        }
        if body.len() < code.min_len() {
            return Err(FrameError::PayloadTooShort {
                cmd: raw,
                len: body.len(),
            });
        }

        let short = FrameError::PayloadTooShort {
            cmd: raw,
            len: body.len(),
        };
        let u16_at = |pos: usize| read_u16(content, pos).ok_or(short);
        let flag_at = |pos: usize| read_u8(content, pos).map(|b| b != 0).ok_or(short);

        Ok(match code {
            CommandCode::Hello => Self::Hello,
            CommandCode::GetState => Self::GetState { motor },
            CommandCode::Stop => Self::Stop { motor },
            CommandCode::Start => Self::Start { motor },
            CommandCode::SetFlow => Self::SetFlow {
                motor,
                flow_x10: u16_at(2)?,
                reverse: flag_at(4)?,
            },
            CommandCode::StartDosing => Self::StartDosing {
                motor,
                volume_ml: u16_at(2)?,
                reverse: flag_at(4)?,
            },
            CommandCode::SetSettings => Self::SetSettings {
                motor,
                settings: WireSettings {
                    ml_per_rev_cw_x100: u16_at(2)?,
                    ml_per_rev_ccw_x100: u16_at(4)?,
                    dosing_flow_x10: u16_at(6)?,
                    max_flow_x10: u16_at(8)?,
                },
            },
        })
    }
}
