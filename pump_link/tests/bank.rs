use std::sync::Arc;

use pump_core::{Mode, MotorRegistry, PumpCfg, PumpError};
use pump_link::mocks::LoopbackBus;
use pump_link::{BankError, LinkCfg, LinkDriver, LinkError, MotorBank, WireSettings};
use pump_traits::ManualClock;
use rstest::rstest;

const PEER: u8 = 0x20;

/// Two local motors plus a peer with `remote` motors, link connected.
fn bank(remote: usize) -> MotorBank<LoopbackBus> {
    let clock = ManualClock::new();
    let bus = LoopbackBus::with_motors(PEER, remote).unwrap();
    let link = LinkDriver::builder()
        .bus(bus)
        .clock(Arc::new(clock))
        .config(LinkCfg {
            enabled: true,
            ..LinkCfg::default()
        })
        .try_build()
        .unwrap();
    let local = MotorRegistry::new(2, &PumpCfg::default()).unwrap();
    let mut bank = MotorBank::new(local, Some(link));
    bank.service_link();
    bank
}

fn peer_state(bank: &MotorBank<LoopbackBus>, remote: u8) -> pump_core::MotorState {
    bank.link()
        .unwrap()
        .bus()
        .registry()
        .get(remote)
        .unwrap()
        .state()
        .clone()
}

#[test]
fn active_count_includes_remote_only_while_enabled() {
    let mut bank = bank(3);
    assert_eq!(bank.active_motor_count(), 5);

    bank.set_link_enabled(false).unwrap();
    assert_eq!(bank.active_motor_count(), 2);
    assert_eq!(
        bank.state(2).unwrap_err(),
        BankError::Pump(PumpError::UnknownMotor(2))
    );
}

#[test]
fn bank_without_link_is_local_only() {
    let local = MotorRegistry::new(1, &PumpCfg::default()).unwrap();
    let mut bank: MotorBank<LoopbackBus> = MotorBank::new(local, None);
    assert_eq!(bank.active_motor_count(), 1);
    assert!(bank.set_link_enabled(false).is_ok());
    assert_eq!(
        bank.set_link_enabled(true).unwrap_err(),
        BankError::Link(LinkError::Disabled)
    );
}

#[rstest]
#[case::local(0, false)]
#[case::remote(3, true)]
fn ids_route_to_the_right_side(#[case] id: u8, #[case] remote: bool) {
    let mut bank = bank(2);
    bank.set_flow(id, 4.0, false).unwrap();
    assert!(bank.state(id).unwrap().running);
    // Global id 3 is the peer's motor 1.
    assert_eq!(peer_state(&bank, 1).running, remote);
}

#[test]
fn out_of_range_id_is_unknown() {
    let mut bank = bank(1);
    assert_eq!(
        bank.start(3).unwrap_err(),
        BankError::Pump(PumpError::UnknownMotor(3))
    );
}

#[rstest]
#[case::local(1)]
#[case::remote(2)]
fn zero_volume_dose_is_refused(#[case] id: u8) {
    let mut bank = bank(1);
    assert_eq!(
        bank.start_dosing(id, 0, false).unwrap_err(),
        BankError::Pump(PumpError::ZeroVolume)
    );
    assert!(!bank.state(id).unwrap().running);
}

#[rstest]
#[case::local(0)]
#[case::remote(2)]
fn dose_on_running_motor_is_busy(#[case] id: u8) {
    let mut bank = bank(1);
    bank.start(id).unwrap();
    assert_eq!(
        bank.start_dosing(id, 10, false).unwrap_err(),
        BankError::Pump(PumpError::Busy(id))
    );
}

#[test]
fn local_dose_runs_and_remembers_direction() {
    let mut bank = bank(1);
    bank.start_dosing(1, 5, true).unwrap();
    let st = bank.state(1).unwrap();
    assert_eq!(st.mode, Mode::Dosing);
    assert!(st.target_speed < 0.0);
    assert!(bank.preferred_reverse(1));
}

#[test]
fn remote_success_keeps_preferred_direction() {
    let mut bank = bank(1);
    bank.set_flow(2, 3.0, true).unwrap();
    assert!(bank.preferred_reverse(2));
    assert!(bank.state(2).unwrap().target_speed < 0.0);
}

#[test]
fn failed_read_back_rolls_back_preferred_direction() {
    let mut bank = bank(1);
    bank.link_mut().unwrap().bus_mut().fail_next_exchanges(1);

    let err = bank.start_dosing(2, 20, true).unwrap_err();
    assert!(err.is_link_failure());
    assert!(!bank.preferred_reverse(2));
    // The write itself reached the peer; the shadow catches up after rediscovery.
    assert!(peer_state(&bank, 0).running);
    assert!(!bank.link().unwrap().is_connected());
}

#[test]
fn failed_write_rolls_back_preferred_direction() {
    let mut bank = bank(1);
    bank.set_flow(2, 3.0, true).unwrap();
    bank.link_mut().unwrap().bus_mut().set_silent(true);

    assert!(bank.set_flow(2, 3.0, false).is_err());
    assert!(bank.preferred_reverse(2));
}

#[test]
fn disconnected_remote_reports_link_failure() {
    let mut bank = bank(1);
    bank.link_mut().unwrap().bus_mut().set_silent(true);
    bank.link_mut().unwrap().poll().unwrap_err();

    assert_eq!(
        bank.stop(2).unwrap_err(),
        BankError::Link(LinkError::Disconnected)
    );
}

#[test]
fn dose_on_disconnected_remote_is_a_link_failure_not_busy() {
    let mut bank = bank(1);
    bank.set_flow(2, 3.0, false).unwrap();
    assert!(bank.state(2).unwrap().running);
    bank.link_mut().unwrap().bus_mut().set_silent(true);
    bank.link_mut().unwrap().poll().unwrap_err();

    assert_eq!(
        bank.start_dosing(2, 20, true).unwrap_err(),
        BankError::Link(LinkError::Disconnected)
    );
    assert!(!bank.preferred_reverse(2));
}

#[test]
fn settings_apply_locally() {
    let mut bank = bank(1);
    bank.set_settings(0, WireSettings::from_units(0.0, 3.3, 0.0, 0.0))
        .unwrap();
    let st = bank.state(0).unwrap();
    assert!((st.ml_per_rev_ccw - 3.3).abs() < 0.01);
    assert!((st.ml_per_rev_cw - 2.6).abs() < 0.01);
}

#[test]
fn tick_moves_local_motors_only() {
    let mut bank = bank(1);
    bank.set_flow(0, 6.0, false).unwrap();
    bank.set_flow(2, 6.0, false).unwrap();
    bank.tick(100);
    assert!(bank.state(0).unwrap().current_speed > 0.0);
    assert_eq!(peer_state(&bank, 0).current_speed, 0.0);
}
