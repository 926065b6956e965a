use pump_core::{Mode, MotorRegistry, PumpCfg, PumpController, PumpStatus};
use rstest::rstest;

fn ctrl() -> PumpController {
    PumpController::new(PumpCfg::default())
}

fn run_ticks(ctrl: &mut PumpController, n: usize, ms: u32) {
    for _ in 0..n {
        ctrl.tick(ms);
    }
}

#[rstest]
#[case(999.0, 450.0)]
#[case(-999.0, -450.0)]
#[case(200.0, 200.0)]
#[case(-0.5, -0.5)]
fn target_is_clamped(#[case] requested: f32, #[case] expected: f32) {
    let mut c = ctrl();
    c.set_speed(requested, Mode::Flow);
    assert!((c.state().target_speed - expected).abs() < 1e-4);
}

#[test]
fn lifecycle_stopped_flow_dosing_stopped() {
    let mut c = ctrl();
    assert_eq!(c.status(), PumpStatus::Stopped);
    assert_eq!(c.state().current_speed, 0.0);

    c.start();
    assert_eq!(c.status(), PumpStatus::RunningFlow);
    assert!((c.state().target_speed - 120.0).abs() < 1e-4);

    c.start_dosing(2);
    assert_eq!(c.status(), PumpStatus::RunningDosing);

    run_ticks(&mut c, 5_000, 10);
    assert_eq!(c.status(), PumpStatus::Stopped);
    assert_eq!(c.state().mode, Mode::Flow);
    assert_eq!(c.state().dosing_remaining_ml, 0.0);

    // Decelerates back to rest and snaps to zero.
    run_ticks(&mut c, 500, 10);
    assert_eq!(c.state().current_speed, 0.0);
}

#[test]
fn dose_volume_matches_counters() {
    let mut c = ctrl();
    c.start_dosing(10);
    while c.state().running {
        c.tick(10);
    }
    let delivered_ml = c.state().total_volume_l * 1000.0;
    assert!((delivered_ml - 10.0).abs() < 0.5, "delivered {delivered_ml}");
}

#[test]
fn reverse_flow_uses_ccw_calibration() {
    let mut c = ctrl();
    c.set_ml_per_rev(2.0, 4.0);
    c.set_speed(-60.0, Mode::Flow);
    // Ramp is 50 rev/min/s, so 60 rev/min is reached in 1.2 s.
    run_ticks(&mut c, 120, 10);
    let before = c.state().total_volume_l;
    run_ticks(&mut c, 100, 10);
    let ml = (c.state().total_volume_l - before) * 1000.0;
    // One second at 60 rev/min = one revolution = 4 ml.
    assert!((ml - 4.0).abs() < 0.01, "pumped {ml}");
}

#[test]
fn stopped_motor_does_not_accumulate() {
    let mut c = ctrl();
    run_ticks(&mut c, 1000, 10);
    assert_eq!(c.state().total_volume_l, 0.0);
    assert_eq!(c.state().total_uptime_sec, 0);
}

#[test]
fn registry_ticks_every_motor_with_same_delta() {
    let mut reg = MotorRegistry::new(2, &PumpCfg::default()).unwrap();
    reg.get_mut(0).unwrap().set_speed(100.0, Mode::Flow);
    reg.get_mut(1).unwrap().start_dosing(-3);
    reg.tick_all(10);
    assert!((reg.get(0).unwrap().state().current_speed - 0.5).abs() < 1e-4);
    assert!((reg.get(1).unwrap().state().current_speed + 0.5).abs() < 1e-4);
}
