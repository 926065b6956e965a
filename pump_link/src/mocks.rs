//! In-process bus peer for tests and host simulation.

use std::time::Duration;

use pump_core::{MotorRegistry, PumpCfg};
use pump_traits::{BoxError, BusTransport, ManualClock};
use thiserror::Error;

use crate::dispatcher::Dispatcher;

#[derive(Debug, Error)]
pub enum LoopbackError {
    #[error("timed out waiting for {0:#04x}")]
    TimedOut(u8),
    #[error("reply of {actual} bytes, caller expected {expected}")]
    ReplyLength { expected: usize, actual: usize },
}

/// A subordinate answering at one address, backed by a real `Dispatcher`.
///
/// Latency is simulated by advancing a shared `ManualClock`, so link timing
/// is observable without sleeping.
#[derive(Debug)]
pub struct LoopbackBus {
    address: u8,
    registry: MotorRegistry,
    dispatcher: Dispatcher,
    clock: Option<ManualClock>,
    latency: Duration,
    silent: bool,
    corrupt_replies: bool,
    fail_exchanges: usize,
    sends: usize,
    exchanges: usize,
}

impl LoopbackBus {
    pub fn new(address: u8, registry: MotorRegistry) -> Self {
        Self {
            address,
            registry,
            dispatcher: Dispatcher::new(),
            clock: None,
            latency: Duration::ZERO,
            silent: false,
            corrupt_replies: false,
            fail_exchanges: 0,
            sends: 0,
            exchanges: 0,
        }
    }

    /// Peer with `motors` default controllers.
    pub fn with_motors(address: u8, motors: usize) -> Result<Self, pump_core::BuildError> {
        Ok(Self::new(address, MotorRegistry::new(motors, &PumpCfg::default())?))
    }

    /// Advance `clock` by `latency` on every transaction.
    pub fn with_latency(mut self, clock: ManualClock, latency: Duration) -> Self {
        self.clock = Some(clock);
        self.latency = latency;
        self
    }

    pub fn registry(&self) -> &MotorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MotorRegistry {
        &mut self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Stop answering entirely.
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Flip the checksum byte of every reply.
    pub fn set_corrupt_replies(&mut self, corrupt: bool) {
        self.corrupt_replies = corrupt;
    }

    /// Time out the next `n` exchanges while still accepting plain sends.
    pub fn fail_next_exchanges(&mut self, n: usize) {
        self.fail_exchanges = n;
    }

    pub fn sends(&self) -> usize {
        self.sends
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges
    }

    fn reach(&self, address: u8, timeout: Duration) -> Result<(), BoxError> {
        if let Some(clock) = &self.clock {
            clock.advance(self.latency.min(timeout));
        }
        if self.silent || address != self.address || self.latency > timeout {
            return Err(Box::new(LoopbackError::TimedOut(address)));
        }
        Ok(())
    }
}

impl BusTransport for LoopbackBus {
    fn send(&mut self, address: u8, frame: &[u8], timeout: Duration) -> Result<(), BoxError> {
        self.sends += 1;
        self.reach(address, timeout)?;
        self.dispatcher.handle(&mut self.registry, frame);
        Ok(())
    }

    fn exchange(
        &mut self,
        address: u8,
        frame: &[u8],
        reply: &mut [u8],
        timeout: Duration,
    ) -> Result<(), BoxError> {
        self.exchanges += 1;
        self.reach(address, timeout)?;
        if self.fail_exchanges > 0 {
            self.fail_exchanges -= 1;
            return Err(Box::new(LoopbackError::TimedOut(address)));
        }
        let Some(answer) = self.dispatcher.handle(&mut self.registry, frame) else {
            return Err(Box::new(LoopbackError::TimedOut(address)));
        };
        if answer.len() != reply.len() {
            return Err(Box::new(LoopbackError::ReplyLength {
                expected: reply.len(),
                actual: answer.len(),
            }));
        }
        reply.copy_from_slice(&answer);
        if self.corrupt_replies
            && let Some(last) = reply.last_mut()
        {
            *last ^= 0xFF;
        }
        Ok(())
    }
}
