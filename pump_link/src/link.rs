//! Master-side link driver: discovery, polling and two-phase commands.
//!
//! The driver owns one shadow controller per remote motor. Polling copies the
//! subordinate's state records into the shadows; every mutating command is a
//! write followed by a read-back of the same motor, both inside one timeout
//! budget. Any failed exchange marks the link disconnected so the next
//! `service` call rediscovers the peer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pump_core::error::{BuildError, Result};
use pump_core::{MAX_MOTORS, MotorState, PumpCfg, PumpController};
use pump_traits::BusTransport;
use pump_traits::clock::{Clock, MonotonicClock};

use crate::command::{Command, WireSettings};
use crate::error::{FrameError, LinkError, map_bus_error};
use crate::record::{HELLO_LEN, HelloRecord, STATE_LEN, StateRecord};

/// Runtime link settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCfg {
    pub enabled: bool,
    pub address_from: u8,
    pub address_to: u8,
    pub max_remote_motors: u8,
    pub discovery_interval: Duration,
    pub poll_interval: Duration,
    /// Budget for one exchange; a command's write and read-back share it.
    pub timeout: Duration,
    pub readback_delay: Duration,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            address_from: 0x20,
            address_to: 0x2F,
            max_remote_motors: 4,
            discovery_interval: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(300),
            timeout: Duration::from_millis(120),
            readback_delay: Duration::from_millis(2),
        }
    }
}

impl From<&pump_config::Link> for LinkCfg {
    fn from(c: &pump_config::Link) -> Self {
        Self {
            enabled: c.enabled,
            address_from: c.address_from,
            address_to: c.address_to,
            max_remote_motors: u8::try_from(c.max_remote_motors).unwrap_or(u8::MAX),
            discovery_interval: Duration::from_millis(c.discovery_interval_ms),
            poll_interval: Duration::from_millis(c.poll_interval_ms),
            timeout: Duration::from_millis(c.timeout_ms),
            readback_delay: Duration::from_millis(c.readback_delay_ms),
        }
    }
}

/// The subordinate found by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub address: u8,
    pub motor_count: u8,
}

/// What one `service` call did.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Idle,
    Connected(Peer),
    DiscoveryFailed,
    Polled,
    Lost(LinkError),
}

pub struct LinkDriver<B> {
    bus: B,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: LinkCfg,
    enabled: bool,
    connected: bool,
    address: u8,
    motor_count: u8,
    shadow_cfg: PumpCfg,
    shadows: Vec<PumpController>,
    last_discovery: Option<Instant>,
    last_poll: Option<Instant>,
}

impl<B> std::fmt::Debug for LinkDriver<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkDriver")
            .field("enabled", &self.enabled)
            .field("connected", &self.connected)
            .field("address", &self.address)
            .field("motor_count", &self.motor_count)
            .finish_non_exhaustive()
    }
}

/// Builder for `LinkDriver`. The bus is required; everything else has defaults.
pub struct LinkDriverBuilder<B> {
    bus: Option<B>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    cfg: LinkCfg,
    shadow_cfg: PumpCfg,
}

impl<B> Default for LinkDriverBuilder<B> {
    fn default() -> Self {
        Self {
            bus: None,
            clock: None,
            cfg: LinkCfg::default(),
            shadow_cfg: PumpCfg::default(),
        }
    }
}

impl<B: BusTransport> LinkDriverBuilder<B> {
    pub fn bus(mut self, bus: B) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, cfg: LinkCfg) -> Self {
        self.cfg = cfg;
        self
    }

    /// Configuration the shadow controllers start from.
    pub fn shadow_config(mut self, cfg: PumpCfg) -> Self {
        self.shadow_cfg = cfg;
        self
    }

    pub fn try_build(self) -> Result<LinkDriver<B>> {
        let bus = self
            .bus
            .ok_or_else(|| eyre::Report::new(BuildError::MissingBus))?;
        let cfg = self.cfg;
        if cfg.address_from > cfg.address_to {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "address_from must be <= address_to",
            )));
        }
        if cfg.max_remote_motors == 0 || usize::from(cfg.max_remote_motors) > MAX_MOTORS {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_remote_motors must be in 1..=4",
            )));
        }
        if cfg.timeout.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "timeout must be > 0",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let shadows = (0..cfg.max_remote_motors)
            .map(|_| PumpController::new(self.shadow_cfg.clone()))
            .collect();

        Ok(LinkDriver {
            bus,
            clock,
            enabled: cfg.enabled,
            cfg,
            connected: false,
            address: 0,
            motor_count: 0,
            shadow_cfg: self.shadow_cfg,
            shadows,
            last_discovery: None,
            last_poll: None,
        })
    }
}

#[inline]
fn due(last: Option<Instant>, interval: Duration, now: Instant) -> bool {
    last.is_none_or(|t| now.saturating_duration_since(t) >= interval)
}

impl<B: BusTransport> LinkDriver<B> {
    pub fn builder() -> LinkDriverBuilder<B> {
        LinkDriverBuilder::default()
    }

    pub fn config(&self) -> &LinkCfg {
        &self.cfg
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_connected(&self) -> bool {
        self.enabled && self.connected
    }

    /// Connected peer, if any.
    pub fn peer(&self) -> Option<Peer> {
        self.is_connected().then_some(Peer {
            address: self.address,
            motor_count: self.motor_count,
        })
    }

    /// Remote motors reported by the last successful discovery.
    pub fn motor_count(&self) -> u8 {
        self.motor_count
    }

    /// Last known state of a remote motor.
    pub fn shadow(&self, remote: u8) -> Option<&PumpController> {
        if remote >= self.motor_count {
            return None;
        }
        self.shadows.get(usize::from(remote))
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Turn the link on or off. Enabling triggers an immediate discovery.
    pub fn set_enabled(&mut self, enabled: bool) -> std::result::Result<(), LinkError> {
        if !enabled {
            if self.enabled {
                tracing::info!("link disabled");
            }
            self.enabled = false;
            self.connected = false;
            return Ok(());
        }
        self.enabled = true;
        if self.connected {
            return Ok(());
        }
        self.discover().map(|_| ())
    }

    fn mark_disconnected(&mut self, reason: &LinkError) {
        if self.connected {
            tracing::info!(address = self.address, %reason, "link disconnected");
        }
        self.connected = false;
    }

    /// Fails unless the link is enabled, connected and `remote` exists on the peer.
    pub fn ensure_ready(&self, remote: u8) -> std::result::Result<(), LinkError> {
        if !self.enabled {
            return Err(LinkError::Disabled);
        }
        if !self.connected {
            return Err(LinkError::Disconnected);
        }
        if remote >= self.motor_count {
            return Err(LinkError::UnknownMotor(remote));
        }
        Ok(())
    }

    /// Probe the configured address range; the first valid hello wins.
    pub fn discover(&mut self) -> std::result::Result<Peer, LinkError> {
        if !self.enabled {
            return Err(LinkError::Disabled);
        }
        self.last_discovery = Some(self.clock.now());
        let probe = Command::Hello.encode();

        for address in self.cfg.address_from..=self.cfg.address_to {
            let mut reply = [0u8; HELLO_LEN];
            if let Err(e) = self.bus.exchange(address, &probe, &mut reply, self.cfg.timeout) {
                tracing::trace!(address, error = %map_bus_error(&*e), "no answer");
                continue;
            }
            let hello = match HelloRecord::decode(&reply) {
                Ok(h) => h,
                Err(reason) => {
                    tracing::debug!(address, %reason, "ignored hello");
                    continue;
                }
            };
            if hello.motor_count == 0 {
                tracing::debug!(address, "peer reports no motors");
                continue;
            }

            let motors = hello.motor_count.min(self.cfg.max_remote_motors);
            let fresh = !self.connected || self.address != address || self.motor_count != motors;
            if fresh {
                for shadow in &mut self.shadows {
                    *shadow = PumpController::new(self.shadow_cfg.clone());
                }
            }
            self.address = address;
            self.motor_count = motors;
            self.connected = true;
            self.last_poll = None;
            tracing::info!(address, motors, "link connected");
            return Ok(Peer {
                address,
                motor_count: motors,
            });
        }

        self.connected = false;
        Err(LinkError::NoPeer)
    }

    fn fetch_state(&mut self, remote: u8, timeout: Duration) -> std::result::Result<(), LinkError> {
        let request = Command::GetState { motor: remote }.encode();
        let mut reply = [0u8; STATE_LEN];
        self.bus
            .exchange(self.address, &request, &mut reply, timeout)
            .map_err(|e| map_bus_error(&*e))?;
        let record = StateRecord::decode(&reply)?;
        let shadow = self
            .shadows
            .get_mut(usize::from(remote))
            .ok_or(LinkError::UnknownMotor(remote))?;
        record.apply_to(shadow);
        Ok(())
    }

    /// Refresh one shadow from the subordinate.
    pub fn read_state(&mut self, remote: u8) -> std::result::Result<&MotorState, LinkError> {
        self.ensure_ready(remote)?;
        if let Err(e) = self.fetch_state(remote, self.cfg.timeout) {
            self.mark_disconnected(&e);
            return Err(e);
        }
        self.shadow_state(remote)
    }

    fn shadow_state(&self, remote: u8) -> std::result::Result<&MotorState, LinkError> {
        self.shadows
            .get(usize::from(remote))
            .map(PumpController::state)
            .ok_or(LinkError::UnknownMotor(remote))
    }

    /// Read every remote motor; the first failure disconnects and ends the pass.
    pub fn poll(&mut self) -> std::result::Result<(), LinkError> {
        if !self.enabled {
            return Err(LinkError::Disabled);
        }
        if !self.connected {
            return Err(LinkError::Disconnected);
        }
        self.last_poll = Some(self.clock.now());
        for remote in 0..self.motor_count {
            if let Err(e) = self.fetch_state(remote, self.cfg.timeout) {
                tracing::warn!(remote, error = %e, "poll failed");
                self.mark_disconnected(&e);
                return Err(e);
            }
        }
        tracing::trace!(motors = self.motor_count, "poll pass");
        Ok(())
    }

    /// Run whatever discovery or polling is due. Call once per loop iteration.
    pub fn service(&mut self) -> LinkEvent {
        if !self.enabled {
            self.connected = false;
            return LinkEvent::Idle;
        }
        let now = self.clock.now();
        let mut event = LinkEvent::Idle;

        if !self.connected && due(self.last_discovery, self.cfg.discovery_interval, now) {
            match self.discover() {
                Ok(peer) => event = LinkEvent::Connected(peer),
                Err(_) => return LinkEvent::DiscoveryFailed,
            }
        }
        if !self.connected {
            return event;
        }
        if due(self.last_poll, self.cfg.poll_interval, now) {
            if let Err(e) = self.poll() {
                return LinkEvent::Lost(e);
            }
            if event == LinkEvent::Idle {
                event = LinkEvent::Polled;
            }
        }
        event
    }

    /// Write a command, then read the motor back inside one timeout budget.
    fn transact(&mut self, cmd: Command) -> std::result::Result<&MotorState, LinkError> {
        let Some(remote) = cmd.motor() else {
            return Err(LinkError::Malformed(FrameError::UnknownCommand(
                cmd.code() as u8,
            )));
        };
        self.ensure_ready(remote)?;

        let deadline = self.clock.now() + self.cfg.timeout;
        let frame = cmd.encode();

        if let Err(e) = self.bus.send(self.address, &frame, self.cfg.timeout) {
            let err = map_bus_error(&*e);
            tracing::warn!(remote, error = %err, "command write failed");
            self.mark_disconnected(&err);
            return Err(err);
        }

        if !self.cfg.readback_delay.is_zero() {
            self.clock.sleep(self.cfg.readback_delay);
        }
        let remaining = deadline.saturating_duration_since(self.clock.now());
        if remaining.is_zero() {
            tracing::warn!(remote, "no budget left for read-back");
            self.mark_disconnected(&LinkError::Timeout);
            return Err(LinkError::Timeout);
        }

        if let Err(e) = self.fetch_state(remote, remaining) {
            tracing::warn!(remote, error = %e, "read-back failed");
            self.mark_disconnected(&e);
            return Err(e);
        }
        self.shadow_state(remote)
    }

    pub fn set_flow(
        &mut self,
        remote: u8,
        lph: f32,
        reverse: bool,
    ) -> std::result::Result<&MotorState, LinkError> {
        self.transact(Command::set_flow(remote, lph, reverse))
    }

    pub fn start_dosing(
        &mut self,
        remote: u8,
        volume_ml: u16,
        reverse: bool,
    ) -> std::result::Result<&MotorState, LinkError> {
        self.transact(Command::StartDosing {
            motor: remote,
            volume_ml,
            reverse,
        })
    }

    pub fn start(&mut self, remote: u8) -> std::result::Result<&MotorState, LinkError> {
        self.transact(Command::Start { motor: remote })
    }

    pub fn stop(&mut self, remote: u8) -> std::result::Result<&MotorState, LinkError> {
        self.transact(Command::Stop { motor: remote })
    }

    pub fn set_settings(
        &mut self,
        remote: u8,
        settings: WireSettings,
    ) -> std::result::Result<&MotorState, LinkError> {
        self.transact(Command::SetSettings {
            motor: remote,
            settings,
        })
    }
}
