//! Subcommand implementations: config loading, simulation, discovery, serving.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use eyre::{Result, WrapErr};
use pump_config::Config;
use pump_core::drive::apply_speed;
use pump_core::util::speed_to_flow;
use pump_core::{
    ControlCfg, DriveCfg, LoopTimer, Mode, MotorRegistry, MotorState, PumpCfg, PumpController,
};
use pump_hardware::SimulatedStepper;
use pump_link::mocks::LoopbackBus;
use pump_link::{Dispatcher, FrameAssembler, LinkCfg, LinkDriver, LinkEvent, MotorBank};
use pump_traits::{BusTransport, Clock, ManualClock, MonotonicClock};
use serde_json::{Value, json};

use crate::cli::{DEFAULT_CONFIG, Pace};
use crate::error_fmt::ConfigError;

/// What a command prints: a human line block and a JSON document.
pub struct Outcome {
    pub text: String,
    pub json: Value,
}

impl Outcome {
    /// Nothing for stdout (the stream is the output).
    pub fn silent() -> Self {
        Self {
            text: String::new(),
            json: Value::Null,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path: PathBuf = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            if !default.exists() {
                return Ok(Config::default());
            }
            default
        }
    };
    pump_config::load_file(&path).wrap_err(ConfigError { path })
}

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Flow => "flow",
        Mode::Dosing => "dosing",
    }
}

pub fn state_json(id: u8, st: &MotorState) -> Value {
    let flow = speed_to_flow(st.current_speed, st.ml_per_rev_for(st.current_speed));
    json!({
        "motor": id,
        "status": st.status().as_str(),
        "mode": mode_name(st.mode),
        "target_speed": st.target_speed,
        "current_speed": st.current_speed,
        "flow_lph": flow,
        "dosing_remaining_ml": st.dosing_remaining_ml,
        "uptime_sec": st.total_uptime_sec,
        "total_volume_l": st.total_volume_l,
        "hose_volume_l": st.hose_volume_l,
    })
}

fn state_line(id: u8, st: &MotorState) -> String {
    format!(
        "motor {id}: {} target={:.1} rpm current={:.1} rpm remaining={:.1} ml total={:.4} l",
        st.status(),
        st.target_speed,
        st.current_speed,
        st.dosing_remaining_ml,
        st.total_volume_l
    )
}

#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub motor: u8,
    pub flow: Option<f32>,
    pub dose: Option<u16>,
    pub reverse: bool,
    pub seconds: f32,
    pub peer_motors: u8,
    pub pace: Pace,
}

fn enabled_link_cfg(cfg: &Config) -> LinkCfg {
    let mut link: LinkCfg = (&cfg.link).into();
    link.enabled = true;
    link
}

pub fn simulate(cfg: &Config, args: &SimulateArgs, shutdown: &AtomicBool) -> Result<Outcome> {
    let pump: PumpCfg = (&cfg.pump).into();
    let drive: DriveCfg = (&cfg.drive).into();
    let control: ControlCfg = (&cfg.control).into();
    let duration = Duration::try_from_secs_f32(args.seconds)
        .map_err(|e| eyre::eyre!("invalid --seconds {}: {e}", args.seconds))?;
    let total_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

    let clock: Arc<dyn Clock + Send + Sync> = match args.pace {
        Pace::Fast => Arc::new(ManualClock::new()),
        Pace::Realtime => Arc::new(MonotonicClock::new()),
    };

    let local = MotorRegistry::new(cfg.motors.local_count, &pump)?;
    let link = if args.peer_motors > 0 {
        let peer = LoopbackBus::with_motors(cfg.subordinate.address, usize::from(args.peer_motors))?;
        Some(
            LinkDriver::builder()
                .bus(peer)
                .clock(clock.clone())
                .config(enabled_link_cfg(cfg))
                .shadow_config(pump.clone())
                .try_build()?,
        )
    } else {
        None
    };
    let mut bank = MotorBank::new(local, link);
    if let LinkEvent::DiscoveryFailed = bank.service_link() {
        tracing::warn!("simulated peer not found; remote ids are unavailable");
    }

    match (args.dose, args.flow) {
        (Some(ml), _) => bank.start_dosing(args.motor, ml, args.reverse)?,
        (None, Some(lph)) => bank.set_flow(args.motor, lph, args.reverse)?,
        (None, None) => bank.start(args.motor)?,
    }

    let mut steppers: Vec<SimulatedStepper> =
        (0..bank.local().len()).map(|_| SimulatedStepper::new()).collect();
    let mut timer = LoopTimer::new(clock, control.tick_ms);
    let mut elapsed_ms: u64 = 0;

    while elapsed_ms < total_ms {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!(elapsed_ms, "interrupted");
            break;
        }
        let delta = timer.wait();
        bank.tick(delta);
        if let Some(link) = bank.link_mut() {
            link.bus_mut().registry_mut().tick_all(delta);
        }
        for (ctrl, stepper) in bank.local().iter().zip(steppers.iter_mut()) {
            apply_speed(
                stepper,
                ctrl.state().current_speed,
                ctrl.config().min_speed,
                &drive,
            )?;
        }
        if let LinkEvent::Lost(e) = bank.service_link() {
            tracing::warn!(error = %e, "simulated link lost");
        }
        elapsed_ms += u64::from(delta);
    }

    let mut lines = vec![format!("simulated {elapsed_ms} ms")];
    let mut motors = Vec::new();
    for id in 0..bank.active_motor_count() {
        let id = u8::try_from(id).unwrap_or(u8::MAX);
        if let Ok(st) = bank.state(id) {
            lines.push(state_line(id, st));
            motors.push(state_json(id, st));
        }
    }
    Ok(Outcome {
        text: lines.join("\n"),
        json: json!({ "elapsed_ms": elapsed_ms, "motors": motors }),
    })
}

fn discover_on<B: BusTransport>(bus: B, cfg: &Config) -> Result<Outcome> {
    let pump: PumpCfg = (&cfg.pump).into();
    let mut link = LinkDriver::builder()
        .bus(bus)
        .config(enabled_link_cfg(cfg))
        .shadow_config(pump)
        .try_build()?;
    let peer = link.discover()?;
    link.poll()?;

    let mut lines = vec![format!(
        "peer at {:#04x} with {} motor(s)",
        peer.address, peer.motor_count
    )];
    let mut motors = Vec::new();
    for remote in 0..peer.motor_count {
        if let Some(shadow) = link.shadow(remote) {
            lines.push(state_line(remote, shadow.state()));
            motors.push(state_json(remote, shadow.state()));
        }
    }
    Ok(Outcome {
        text: lines.join("\n"),
        json: json!({
            "address": peer.address,
            "motor_count": peer.motor_count,
            "motors": motors,
        }),
    })
}

pub fn discover(cfg: &Config) -> Result<Outcome> {
    #[cfg(feature = "hardware")]
    {
        let bus = pump_hardware::hardware::I2cBus::open(cfg.hardware.i2c_bus)
            .wrap_err("open i2c bus")?;
        discover_on(bus, cfg)
    }
    #[cfg(not(feature = "hardware"))]
    {
        let peer = LoopbackBus::with_motors(cfg.subordinate.address, cfg.subordinate.motor_count)?;
        tracing::info!(address = cfg.subordinate.address, "probing simulated bus");
        discover_on(peer, cfg)
    }
}

/// Counters reported when a serve loop ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeStats {
    pub handled: u64,
    pub dropped: u64,
    pub abandoned: u64,
}

/// Answer `[len][body]` frames from `reader` until EOF or shutdown.
///
/// The reader runs on its own thread so the controllers keep ticking while
/// the stream is idle.
pub fn serve_stream<R, W>(
    reader: R,
    writer: &mut W,
    registry: &mut MotorRegistry,
    frame_timeout: Duration,
    tick_ms: u64,
    shutdown: &AtomicBool,
) -> Result<ServeStats>
where
    R: Read + Send + 'static,
    W: Write,
{
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let mut timer = LoopTimer::new(clock.clone(), tick_ms);
    let mut assembler = FrameAssembler::new(frame_timeout);
    let mut dispatcher = Dispatcher::new();
    let mut bodies = Vec::new();
    let chunks = spawn_reader(reader)?;

    while !shutdown.load(Ordering::Relaxed) {
        match chunks.recv_timeout(timer.period()) {
            Ok(chunk) => {
                let chunk = chunk.wrap_err("read frame stream")?;
                assembler.extend(&chunk, clock.now(), &mut bodies);
                for body in bodies.drain(..) {
                    if let Some(reply) = dispatcher.handle_stream(registry, &body) {
                        writer.write_all(&reply).wrap_err("write reply")?;
                        writer.flush().wrap_err("flush reply")?;
                    }
                }
            }
            Err(xch::RecvTimeoutError::Timeout) => {}
            // reader hit EOF
            Err(xch::RecvTimeoutError::Disconnected) => break,
        }
        assembler.expire(clock.now());
        if let Some(delta) = timer.poll() {
            registry.tick_all(delta);
        }
    }

    let stats = dispatcher.stats();
    Ok(ServeStats {
        handled: stats.handled,
        dropped: stats.dropped,
        abandoned: assembler.abandoned(),
    })
}

fn spawn_reader<R: Read + Send + 'static>(
    mut reader: R,
) -> Result<xch::Receiver<std::io::Result<Vec<u8>>>> {
    let (tx, rx) = xch::bounded(16);
    std::thread::Builder::new()
        .name("frame-reader".into())
        .spawn(move || {
            let mut buf = [0u8; 64];
            loop {
                let chunk = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => Ok(buf[..n].to_vec()),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => Err(e),
                };
                let failed = chunk.is_err();
                if tx.send(chunk).is_err() || failed {
                    break;
                }
            }
            tracing::trace!("frame reader exiting");
        })
        .wrap_err("spawn frame reader")?;
    Ok(rx)
}

pub fn serve(cfg: &Config, shutdown: &AtomicBool) -> Result<Outcome> {
    let pump: PumpCfg = (&cfg.pump).into();
    let mut registry = MotorRegistry::new(cfg.subordinate.motor_count, &pump)?;
    let frame_timeout = Duration::from_millis(cfg.subordinate.frame_timeout_ms);
    tracing::info!(motors = registry.len(), "serving");

    #[cfg(feature = "hardware")]
    let stats = hw::serve_uart(cfg, &mut registry, frame_timeout, shutdown)?;
    #[cfg(not(feature = "hardware"))]
    let stats = serve_stream(
        std::io::stdin(),
        &mut std::io::stdout().lock(),
        &mut registry,
        frame_timeout,
        cfg.control.tick_ms,
        shutdown,
    )?;

    tracing::info!(
        handled = stats.handled,
        dropped = stats.dropped,
        abandoned = stats.abandoned,
        "serve finished"
    );
    Ok(Outcome::silent())
}

pub fn self_check(cfg: &Config) -> Result<Outcome> {
    let pump: PumpCfg = (&cfg.pump).into();
    let drive: DriveCfg = (&cfg.drive).into();

    let mut ctrl = PumpController::new(pump.clone());
    ctrl.set_speed(pump.default_start_speed, Mode::Flow);
    ctrl.tick(100);
    let mut stepper = SimulatedStepper::new();
    let output = apply_speed(&mut stepper, ctrl.state().current_speed, pump.min_speed, &drive)?;
    tracing::debug!(?output, "step output check");

    let peer = LoopbackBus::with_motors(cfg.subordinate.address, 1)?;
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(ManualClock::new());
    let mut link_cfg = enabled_link_cfg(cfg);
    link_cfg.address_from = cfg.subordinate.address;
    link_cfg.address_to = cfg.subordinate.address;
    let mut link = LinkDriver::builder()
        .bus(peer)
        .clock(clock)
        .config(link_cfg)
        .shadow_config(pump)
        .try_build()?;
    link.discover().wrap_err("loopback discovery")?;
    let running = link.start(0).wrap_err("loopback command")?.running;
    if !running {
        eyre::bail!("loopback peer did not confirm start");
    }

    #[cfg(feature = "hardware")]
    hw::probe(cfg)?;

    Ok(Outcome {
        text: "self-check ok".into(),
        json: json!({ "ok": true }),
    })
}

#[cfg(feature = "hardware")]
mod hw {
    use super::*;
    use pump_hardware::hardware::{GpioStepper, I2cBus, UartPort};

    pub fn probe(cfg: &Config) -> Result<()> {
        I2cBus::open(cfg.hardware.i2c_bus).wrap_err("open i2c bus")?;
        steppers(cfg)?;
        Ok(())
    }

    fn steppers(cfg: &Config) -> Result<Vec<GpioStepper>> {
        let hw = &cfg.hardware;
        hw.step_pins
            .iter()
            .zip(&hw.dir_pins)
            .enumerate()
            .map(|(i, (&step, &dir))| {
                GpioStepper::new(step, dir, hw.enable_pins.get(i).copied())
                    .wrap_err_with(|| format!("open step pins for motor {i}"))
            })
            .collect()
    }

    pub fn serve_uart(
        cfg: &Config,
        registry: &mut MotorRegistry,
        frame_timeout: Duration,
        shutdown: &AtomicBool,
    ) -> Result<ServeStats> {
        let drive: DriveCfg = (&cfg.drive).into();
        let mut port = UartPort::open(&cfg.hardware.uart_path, cfg.hardware.uart_baud)
            .wrap_err("open uart")?;
        let mut outputs = steppers(cfg)?;
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
        let mut timer = LoopTimer::new(clock.clone(), cfg.control.tick_ms);
        let mut assembler = FrameAssembler::new(frame_timeout);
        let mut dispatcher = Dispatcher::new();
        let mut buf = [0u8; 64];
        let mut bodies = Vec::new();

        while !shutdown.load(Ordering::Relaxed) {
            let n = port.read_available(&mut buf)?;
            let now = clock.now();
            assembler.expire(now);
            assembler.extend(&buf[..n], now, &mut bodies);
            for body in bodies.drain(..) {
                if let Some(reply) = dispatcher.handle_stream(registry, &body) {
                    port.write_all(&reply)?;
                }
            }
            if let Some(delta) = timer.poll() {
                registry.tick_all(delta);
                for (ctrl, out) in registry.iter().zip(outputs.iter_mut()) {
                    apply_speed(out, ctrl.state().current_speed, ctrl.config().min_speed, &drive)?;
                }
            } else if n == 0 {
                std::thread::sleep(Duration::from_micros(500));
            }
        }
        for out in &mut outputs {
            apply_speed(out, 0.0, 1.0, &drive)?;
        }

        let stats = dispatcher.stats();
        Ok(ServeStats {
            handled: stats.handled,
            dropped: stats.dropped,
            abandoned: assembler.abandoned(),
        })
    }
}
