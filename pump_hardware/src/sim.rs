//! Host-side stand-ins for the step outputs.

use std::sync::{Arc, Mutex};

use pump_traits::{BoxError, StepDriver};

/// What a step channel is currently doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelOutput {
    Disabled,
    Pulsing { hz: f32, reverse: bool },
}

#[derive(Debug)]
struct Channel {
    output: ChannelOutput,
    changes: u64,
}

/// Step driver that records its output instead of toggling pins.
///
/// Clones share one channel, so a monitor can observe what the control loop
/// commanded.
#[derive(Debug, Clone)]
pub struct SimulatedStepper {
    channel: Arc<Mutex<Channel>>,
}

impl Default for SimulatedStepper {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedStepper {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(Mutex::new(Channel {
                output: ChannelOutput::Disabled,
                changes: 0,
            })),
        }
    }

    pub fn output(&self) -> ChannelOutput {
        self.channel
            .lock()
            .map(|c| c.output)
            .unwrap_or(ChannelOutput::Disabled)
    }

    /// Number of times the output actually changed.
    pub fn changes(&self) -> u64 {
        self.channel.lock().map(|c| c.changes).unwrap_or(0)
    }

    fn set(&self, output: ChannelOutput) -> Result<(), BoxError> {
        let mut ch = self
            .channel
            .lock()
            .map_err(|_| crate::error::HwError::Gpio("simulated channel poisoned".into()))?;
        if ch.output != output {
            tracing::trace!(?output, "step output");
            ch.output = output;
            ch.changes += 1;
        }
        Ok(())
    }
}

impl StepDriver for SimulatedStepper {
    fn run(&mut self, hz: f32, reverse: bool) -> Result<(), BoxError> {
        self.set(ChannelOutput::Pulsing { hz, reverse })
    }

    fn disable(&mut self) -> Result<(), BoxError> {
        self.set(ChannelOutput::Disabled)
    }
}
