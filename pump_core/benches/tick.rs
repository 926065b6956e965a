use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use pump_core::{Mode, MotorRegistry, PumpCfg};

pub fn bench_tick(c: &mut Criterion) {
    let mut g = c.benchmark_group("controller_tick");
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p pump_core --bench tick
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    for &motors in &[1usize, 4] {
        g.bench_function(format!("tick_all_{motors}_motors_1000x"), |b| {
            b.iter_batched(
                || {
                    let mut reg = MotorRegistry::new(motors, &PumpCfg::default())
                        .unwrap_or_else(|e| panic!("registry: {e}"));
                    for (i, m) in reg.iter_mut().enumerate() {
                        if i % 2 == 0 {
                            m.set_speed(300.0, Mode::Flow);
                        } else {
                            m.start_dosing(25);
                        }
                    }
                    reg
                },
                |mut reg| {
                    for _ in 0..1000 {
                        reg.tick_all(black_box(10));
                    }
                    black_box(reg);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(tick, bench_tick);
criterion_main!(tick);
