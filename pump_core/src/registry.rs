//! Owned, fixed-capacity set of local motor controllers indexed by motor id.

use crate::config::PumpCfg;
use crate::controller::PumpController;
use crate::error::BuildError;

/// Upper bound on motors driven by one unit.
pub const MAX_MOTORS: usize = 4;

/// Local controllers, ids `0..len()`.
///
/// Every controller is ticked with the same delta so all motors stay in lock-step.
#[derive(Debug, Clone)]
pub struct MotorRegistry {
    motors: Vec<PumpController>,
}

impl MotorRegistry {
    /// Create `count` controllers sharing one configuration.
    pub fn new(count: usize, cfg: &PumpCfg) -> Result<Self, BuildError> {
        if count == 0 || count > MAX_MOTORS {
            return Err(BuildError::InvalidConfig("motor count must be in 1..=4"));
        }
        let motors = (0..count).map(|_| PumpController::new(cfg.clone())).collect();
        Ok(Self { motors })
    }

    pub fn len(&self) -> usize {
        self.motors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motors.is_empty()
    }

    pub fn contains(&self, id: u8) -> bool {
        usize::from(id) < self.motors.len()
    }

    pub fn get(&self, id: u8) -> Option<&PumpController> {
        self.motors.get(usize::from(id))
    }

    pub fn get_mut(&mut self, id: u8) -> Option<&mut PumpController> {
        self.motors.get_mut(usize::from(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PumpController> {
        self.motors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PumpController> {
        self.motors.iter_mut()
    }

    /// Advance every controller by the same `delta_ms`.
    pub fn tick_all(&mut self, delta_ms: u32) {
        for motor in &mut self.motors {
            motor.tick(delta_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Mode;

    #[test]
    fn rejects_out_of_range_counts() {
        assert!(MotorRegistry::new(0, &PumpCfg::default()).is_err());
        assert!(MotorRegistry::new(MAX_MOTORS + 1, &PumpCfg::default()).is_err());
        assert_eq!(MotorRegistry::new(MAX_MOTORS, &PumpCfg::default()).map(|r| r.len()).ok(), Some(4));
    }

    #[test]
    fn ids_past_the_end_are_absent() {
        let mut reg = MotorRegistry::new(2, &PumpCfg::default()).unwrap();
        assert!(reg.contains(1));
        assert!(!reg.contains(2));
        assert!(reg.get(2).is_none());
        assert!(reg.get_mut(200).is_none());
    }

    #[test]
    fn tick_all_keeps_motors_in_lock_step() {
        let mut reg = MotorRegistry::new(3, &PumpCfg::default()).unwrap();
        for m in reg.iter_mut() {
            m.set_speed(100.0, Mode::Flow);
        }
        reg.tick_all(100);
        let speeds: Vec<f32> = reg.iter().map(|m| m.state().current_speed).collect();
        assert!(speeds.iter().all(|s| (s - 5.0).abs() < 1e-4), "{speeds:?}");
    }
}
