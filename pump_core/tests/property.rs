use proptest::prelude::*;
use pump_core::{Mode, PumpCfg, PumpController};

#[derive(Debug, Clone)]
enum Op {
    Speed(f32),
    Stop,
    Dose(i32),
    Tick(u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-600.0f32..600.0).prop_map(Op::Speed),
        Just(Op::Stop),
        (-50i32..50).prop_map(Op::Dose),
        (0u32..250).prop_map(Op::Tick),
        (0u32..250).prop_map(Op::Tick),
        (0u32..250).prop_map(Op::Tick),
    ]
}

fn apply(ctrl: &mut PumpController, op: &Op) {
    match *op {
        Op::Speed(s) => ctrl.set_speed(s, Mode::Flow),
        Op::Stop => ctrl.stop(false),
        Op::Dose(v) => ctrl.start_dosing(v),
        Op::Tick(ms) => ctrl.tick(ms),
    }
}

proptest! {
    #[test]
    fn ramp_step_is_bounded_and_never_overshoots(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let cfg = PumpCfg::default();
        let mut ctrl = PumpController::new(cfg.clone());
        for op in &ops {
            let before = ctrl.state().clone();
            apply(&mut ctrl, op);
            let after = ctrl.state();
            prop_assert!(after.target_speed.abs() <= cfg.max_speed);

            if let Op::Tick(ms) = *op {
                let dt = ms as f32 / 1000.0;
                let rate = if before.target_speed.abs() < cfg.min_speed {
                    cfg.halt_per_sec
                } else {
                    cfg.accel_per_sec
                };
                let delta = (after.current_speed - before.current_speed).abs();
                prop_assert!(delta <= rate * dt + cfg.min_speed + 1e-3, "delta {} rate {} dt {}", delta, rate, dt);

                let target = before.target_speed;
                if before.current_speed <= target {
                    prop_assert!(after.current_speed <= target);
                }
                if before.current_speed >= target {
                    prop_assert!(after.current_speed >= target);
                }
            }
        }
    }

    #[test]
    fn counters_never_decrease(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let cfg = PumpCfg::default();
        let mut ctrl = PumpController::new(cfg.clone());
        for op in &ops {
            let before = ctrl.state().clone();
            apply(&mut ctrl, op);
            let after = ctrl.state();
            prop_assert!(after.total_volume_l >= before.total_volume_l);
            prop_assert!(after.hose_volume_l >= before.hose_volume_l);
            prop_assert!(after.total_uptime_sec >= before.total_uptime_sec);
            prop_assert!(after.dosing_remaining_ml >= 0.0);
            if after.current_speed.abs() < cfg.min_speed {
                prop_assert_eq!(after.total_volume_l, before.total_volume_l);
            }
        }
    }

    #[test]
    fn repeated_ticks_converge_exactly(target in -450.0f32..450.0, ms in 1u32..100) {
        let mut ctrl = PumpController::default();
        ctrl.set_speed(target, Mode::Flow);
        let goal = ctrl.state().target_speed;
        for _ in 0..20_000 {
            ctrl.tick(ms);
            if ctrl.state().current_speed == goal {
                break;
            }
        }
        prop_assert_eq!(ctrl.state().current_speed, goal);
    }

    #[test]
    fn any_dose_eventually_completes(volume in prop_oneof![-40i32..-1, 1i32..40]) {
        let mut ctrl = PumpController::default();
        ctrl.start_dosing(volume);
        let mut guard = 0;
        while ctrl.state().running && guard < 100_000 {
            ctrl.tick(10);
            guard += 1;
        }
        prop_assert!(!ctrl.state().running);
        prop_assert!(ctrl.state().dosing_remaining_ml.abs() < 0.1);
        prop_assert_eq!(ctrl.state().mode, Mode::Flow);
    }
}
