//! Hardware backends for the pump traits.
//!
//! Host builds get the simulated step driver only. The `hardware` feature adds
//! Raspberry Pi I2C, UART and GPIO backends.

pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod hardware;

pub use sim::{ChannelOutput, SimulatedStepper};

#[cfg(test)]
mod tests {
    use super::*;
    use pump_traits::StepDriver;

    #[test]
    fn simulated_stepper_records_output() {
        let mut stepper = SimulatedStepper::new();
        let monitor = stepper.clone();
        assert_eq!(monitor.output(), ChannelOutput::Disabled);

        stepper.run(800.0, true).unwrap();
        assert_eq!(
            monitor.output(),
            ChannelOutput::Pulsing {
                hz: 800.0,
                reverse: true
            }
        );

        stepper.run(800.0, true).unwrap();
        stepper.disable().unwrap();
        assert_eq!(monitor.output(), ChannelOutput::Disabled);
        assert_eq!(monitor.changes(), 2);
    }
}
