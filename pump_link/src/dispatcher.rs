//! Subordinate-side request handling.
//!
//! Every inbound body is validated in full before any controller is touched.
//! Invalid frames are dropped with no reply and no state change.

use bytes::{Bytes, BytesMut};
use pump_core::MotorRegistry;

use crate::command::Command;
use crate::error::FrameError;
use crate::frame;
use crate::record::{HelloRecord, StateRecord};

/// Handled/dropped counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub handled: u64,
    pub dropped: u64,
    pub last_drop: Option<FrameError>,
}

/// Maps validated commands onto the local motor registry.
#[derive(Debug, Default)]
pub struct Dispatcher {
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Handle one body; returns the reply body for hello and get-state.
    pub fn handle(&mut self, registry: &mut MotorRegistry, body: &[u8]) -> Option<Bytes> {
        let cmd = match Command::decode(body, registry.len()) {
            Ok(cmd) => cmd,
            Err(reason) => {
                tracing::debug!(%reason, len = body.len(), "dropped frame");
                self.stats.dropped += 1;
                self.stats.last_drop = Some(reason);
                return None;
            }
        };
        self.stats.handled += 1;
        tracing::trace!(?cmd, "dispatch");
        apply(registry, cmd)
    }

    /// Handle a body from a byte stream and wrap any reply as `[len][body]`.
    pub fn handle_stream(&mut self, registry: &mut MotorRegistry, body: &[u8]) -> Option<Bytes> {
        let reply = self.handle(registry, body)?;
        let mut out = BytesMut::with_capacity(reply.len() + 1);
        // Replies are at most a state record, well inside the frame limit.
        frame::encode_stream(&reply, &mut out).ok()?;
        Some(out.freeze())
    }
}

fn apply(registry: &mut MotorRegistry, cmd: Command) -> Option<Bytes> {
    if let Command::Hello = cmd {
        let count = u8::try_from(registry.len()).unwrap_or(u8::MAX);
        return Some(HelloRecord::new(count).encode());
    }

    // Motor range was checked during decode.
    let ctrl = registry.get_mut(cmd.motor()?)?;
    match cmd {
        Command::Hello => None,
        Command::GetState { .. } => Some(StateRecord::capture(ctrl).encode()),
        Command::SetFlow {
            flow_x10, reverse, ..
        } => {
            ctrl.set_flow(f32::from(flow_x10) / 10.0, reverse);
            None
        }
        Command::StartDosing {
            volume_ml, reverse, ..
        } => {
            let volume = i32::from(volume_ml);
            ctrl.start_dosing(if reverse { -volume } else { volume });
            None
        }
        Command::Stop { .. } => {
            ctrl.stop(false);
            None
        }
        Command::Start { .. } => {
            ctrl.start();
            None
        }
        Command::SetSettings { settings, .. } => {
            ctrl.apply_settings(
                settings.ml_per_rev_cw(),
                settings.ml_per_rev_ccw(),
                settings.dosing_flow_lph(),
                settings.max_flow_lph(),
            );
            None
        }
    }
}
