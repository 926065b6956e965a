//! Motor-id routing across local controllers and the remote peer.
//!
//! Ids `0..local` address the local registry; the next `motor_count` ids map
//! to remote motors while the link is enabled. This is the surface an API
//! layer talks to.

use pump_core::{MotorRegistry, MotorState, PumpError};
use pump_traits::BusTransport;
use thiserror::Error;

use crate::command::WireSettings;
use crate::error::LinkError;
use crate::link::{LinkDriver, LinkEvent};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BankError {
    #[error(transparent)]
    Pump(#[from] PumpError),
    #[error(transparent)]
    Link(#[from] LinkError),
}

impl BankError {
    /// True when the failure came from the bus rather than the request.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, Self::Link(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Local(u8),
    Remote(u8),
}

#[derive(Debug)]
pub struct MotorBank<B> {
    local: MotorRegistry,
    link: Option<LinkDriver<B>>,
    preferred_reverse: Vec<bool>,
}

impl<B: BusTransport> MotorBank<B> {
    pub fn new(local: MotorRegistry, link: Option<LinkDriver<B>>) -> Self {
        let slots = local.len() + pump_core::MAX_MOTORS;
        Self {
            local,
            link,
            preferred_reverse: vec![false; slots],
        }
    }

    pub fn local(&self) -> &MotorRegistry {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut MotorRegistry {
        &mut self.local
    }

    pub fn link(&self) -> Option<&LinkDriver<B>> {
        self.link.as_ref()
    }

    pub fn link_mut(&mut self) -> Option<&mut LinkDriver<B>> {
        self.link.as_mut()
    }

    fn remote_count(&self) -> u8 {
        self.link
            .as_ref()
            .filter(|l| l.is_enabled())
            .map_or(0, LinkDriver::motor_count)
    }

    /// Local motors plus the discovered remote motors when the link is enabled.
    pub fn active_motor_count(&self) -> usize {
        self.local.len() + usize::from(self.remote_count())
    }

    fn route(&self, id: u8) -> Result<Route, BankError> {
        let local = self.local.len();
        if usize::from(id) < local {
            return Ok(Route::Local(id));
        }
        let remote = usize::from(id) - local;
        if remote < usize::from(self.remote_count()) {
            // remote < remote_count() <= u8::MAX
            return Ok(Route::Remote(u8::try_from(remote).unwrap_or(u8::MAX)));
        }
        Err(PumpError::UnknownMotor(id).into())
    }

    fn link_for_remote(&mut self) -> Result<&mut LinkDriver<B>, BankError> {
        self.link
            .as_mut()
            .ok_or_else(|| BankError::Link(LinkError::Disabled))
    }

    /// Current (local) or last polled (remote) state.
    pub fn state(&self, id: u8) -> Result<&MotorState, BankError> {
        let ctrl = match self.route(id)? {
            Route::Local(i) => self.local.get(i),
            Route::Remote(r) => self.link.as_ref().and_then(|l| l.shadow(r)),
        };
        ctrl.map(pump_core::PumpController::state)
            .ok_or_else(|| PumpError::UnknownMotor(id).into())
    }

    /// Remembered direction of the last flow or dosing request.
    pub fn preferred_reverse(&self, id: u8) -> bool {
        self.preferred_reverse
            .get(usize::from(id))
            .copied()
            .unwrap_or(false)
    }

    fn set_preferred(&mut self, id: u8, reverse: bool) -> bool {
        match self.preferred_reverse.get_mut(usize::from(id)) {
            Some(slot) => std::mem::replace(slot, reverse),
            None => false,
        }
    }

    /// Run a remote command after storing the requested direction; restore the
    /// previous direction if the write or the read-back fails.
    fn remote_directed<F>(&mut self, id: u8, reverse: bool, op: F) -> Result<(), BankError>
    where
        F: FnOnce(&mut LinkDriver<B>) -> Result<(), LinkError>,
    {
        let previous = self.set_preferred(id, reverse);
        let result = self.link_for_remote().and_then(|link| op(link).map_err(Into::into));
        if result.is_err() {
            self.set_preferred(id, previous);
        }
        result
    }

    pub fn set_flow(&mut self, id: u8, lph: f32, reverse: bool) -> Result<(), BankError> {
        match self.route(id)? {
            Route::Local(i) => {
                let ctrl = self.local.get_mut(i).ok_or(PumpError::UnknownMotor(id))?;
                ctrl.set_flow(lph, reverse);
                self.set_preferred(id, reverse);
                Ok(())
            }
            Route::Remote(r) => self.remote_directed(id, reverse, |link| {
                link.set_flow(r, lph, reverse).map(|_| ())
            }),
        }
    }

    /// Start a dose. Refuses a zero volume and a motor that is already running.
    pub fn start_dosing(&mut self, id: u8, volume_ml: u16, reverse: bool) -> Result<(), BankError> {
        if volume_ml == 0 {
            return Err(PumpError::ZeroVolume.into());
        }
        let route = self.route(id)?;
        if let Route::Remote(r) = route {
            // A disconnected shadow may still read as running.
            self.link
                .as_ref()
                .ok_or(LinkError::Disabled)?
                .ensure_ready(r)?;
        }
        if self.state(id)?.running {
            return Err(PumpError::Busy(id).into());
        }
        match route {
            Route::Local(i) => {
                let ctrl = self.local.get_mut(i).ok_or(PumpError::UnknownMotor(id))?;
                let volume = i32::from(volume_ml);
                ctrl.start_dosing(if reverse { -volume } else { volume });
                self.set_preferred(id, reverse);
                Ok(())
            }
            Route::Remote(r) => self.remote_directed(id, reverse, |link| {
                link.start_dosing(r, volume_ml, reverse).map(|_| ())
            }),
        }
    }

    pub fn start(&mut self, id: u8) -> Result<(), BankError> {
        match self.route(id)? {
            Route::Local(i) => {
                self.local
                    .get_mut(i)
                    .ok_or(PumpError::UnknownMotor(id))?
                    .start();
                Ok(())
            }
            Route::Remote(r) => {
                self.link_for_remote()?.start(r)?;
                Ok(())
            }
        }
    }

    pub fn stop(&mut self, id: u8) -> Result<(), BankError> {
        match self.route(id)? {
            Route::Local(i) => {
                self.local
                    .get_mut(i)
                    .ok_or(PumpError::UnknownMotor(id))?
                    .stop(false);
                Ok(())
            }
            Route::Remote(r) => {
                self.link_for_remote()?.stop(r)?;
                Ok(())
            }
        }
    }

    /// Settings in wire units; zero fields are left unchanged on either side.
    pub fn set_settings(&mut self, id: u8, settings: WireSettings) -> Result<(), BankError> {
        match self.route(id)? {
            Route::Local(i) => {
                self.local
                    .get_mut(i)
                    .ok_or(PumpError::UnknownMotor(id))?
                    .apply_settings(
                        settings.ml_per_rev_cw(),
                        settings.ml_per_rev_ccw(),
                        settings.dosing_flow_lph(),
                        settings.max_flow_lph(),
                    );
                Ok(())
            }
            Route::Remote(r) => {
                self.link_for_remote()?.set_settings(r, settings)?;
                Ok(())
            }
        }
    }

    pub fn set_link_enabled(&mut self, enabled: bool) -> Result<(), BankError> {
        match self.link.as_mut() {
            Some(link) => link.set_enabled(enabled).map_err(Into::into),
            None if enabled => Err(LinkError::Disabled.into()),
            None => Ok(()),
        }
    }

    /// Advance every local controller by one shared delta.
    pub fn tick(&mut self, delta_ms: u32) {
        self.local.tick_all(delta_ms);
    }

    pub fn service_link(&mut self) -> LinkEvent {
        self.link.as_mut().map_or(LinkEvent::Idle, LinkDriver::service)
    }
}
