#![no_main]
use libfuzzer_sys::fuzz_target;
use pump_core::{MotorRegistry, PumpCfg};
use pump_link::{Dispatcher, FrameAssembler};

fuzz_target!(|data: &[u8]| {
    let Ok(mut reg) = MotorRegistry::new(4, &PumpCfg::default()) else {
        return;
    };
    let mut dispatcher = Dispatcher::new();

    // Whole input as one body.
    let _ = dispatcher.handle(&mut reg, data);

    // Whole input as a byte stream.
    let now = std::time::Instant::now();
    let mut assembler = FrameAssembler::new(std::time::Duration::from_millis(120));
    let mut bodies = Vec::new();
    assembler.extend(data, now, &mut bodies);
    for body in &bodies {
        let _ = dispatcher.handle_stream(&mut reg, body);
    }
    reg.tick_all(10);
});
