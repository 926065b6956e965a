use pump_core::{MotorRegistry, PumpCfg};
use pump_link::{Command, Dispatcher, WireSettings};
use proptest::prelude::*;

const MOTORS: usize = 4;

fn command() -> impl Strategy<Value = Command> {
    let motor = 0u8..MOTORS as u8;
    prop_oneof![
        motor.clone().prop_map(|motor| Command::GetState { motor }),
        motor.clone().prop_map(|motor| Command::Start { motor }),
        motor.clone().prop_map(|motor| Command::Stop { motor }),
        (motor.clone(), any::<u16>(), any::<bool>()).prop_map(|(motor, flow_x10, reverse)| {
            Command::SetFlow {
                motor,
                flow_x10,
                reverse,
            }
        }),
        (motor.clone(), 1u16.., any::<bool>()).prop_map(|(motor, volume_ml, reverse)| {
            Command::StartDosing {
                motor,
                volume_ml,
                reverse,
            }
        }),
        (motor, any::<[u16; 4]>()).prop_map(|(motor, f)| Command::SetSettings {
            motor,
            settings: WireSettings {
                ml_per_rev_cw_x100: f[0],
                ml_per_rev_ccw_x100: f[1],
                dosing_flow_x10: f[2],
                max_flow_x10: f[3],
            },
        }),
    ]
}

fn snapshot(reg: &MotorRegistry) -> Vec<pump_core::MotorState> {
    reg.iter().map(|c| c.state().clone()).collect()
}

proptest! {
    #[test]
    fn encoded_commands_decode_to_themselves(cmd in command()) {
        let body = cmd.encode();
        prop_assert_eq!(Command::decode(&body, MOTORS), Ok(cmd));
    }

    #[test]
    fn any_single_byte_corruption_is_dropped(
        cmd in command(),
        pos in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let mut body = cmd.encode().to_vec();
        let i = pos.index(body.len());
        body[i] ^= mask;

        let mut reg = MotorRegistry::new(MOTORS, &PumpCfg::default()).unwrap();
        let before = snapshot(&reg);
        let mut dispatcher = Dispatcher::new();

        prop_assert!(dispatcher.handle(&mut reg, &body).is_none());
        prop_assert_eq!(dispatcher.stats().dropped, 1);
        prop_assert_eq!(snapshot(&reg), before);
    }
}
