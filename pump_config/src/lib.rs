#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the pump firmware core.
//!
//! - `Config` and its sections are deserialized from TOML; every section is optional.
//! - `Config::validate` rejects values the controller or link could not run with.
use serde::Deserialize;
use std::path::Path;

/// Highest 7-bit bus address.
pub const MAX_BUS_ADDRESS: u8 = 0x7F;
/// Motors per unit, local or remote.
pub const MAX_MOTORS: usize = 4;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pump {
    pub max_speed: f32,
    pub min_speed: f32,
    pub accel_per_sec: f32,
    pub halt_per_sec: f32,
    pub ml_per_rev_cw: f32,
    pub ml_per_rev_ccw: f32,
    pub dosing_speed: f32,
    /// Speed used by `start` when no manual speed was recorded.
    pub default_start_speed: f32,
}

impl Default for Pump {
    fn default() -> Self {
        Self {
            max_speed: 450.0,
            min_speed: 0.01,
            accel_per_sec: 50.0,
            halt_per_sec: 200.0,
            ml_per_rev_cw: 2.6,
            ml_per_rev_ccw: 2.6,
            dosing_speed: 180.0,
            default_start_speed: 120.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Motors {
    pub local_count: usize,
}

impl Default for Motors {
    fn default() -> Self {
        Self { local_count: 1 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Control {
    pub tick_ms: u64,
}

impl Default for Control {
    fn default() -> Self {
        Self { tick_ms: 10 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Drive {
    pub microstepping: u16,
    pub step_angle_deg: f32,
    pub min_frequency_hz: f32,
}

impl Default for Drive {
    fn default() -> Self {
        Self {
            microstepping: 8,
            step_angle_deg: 1.8,
            min_frequency_hz: 1.0,
        }
    }
}

/// Master side of the secondary bus.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Link {
    pub enabled: bool,
    /// First address probed during discovery.
    pub address_from: u8,
    /// Last address probed (inclusive). Equal to `address_from` for a shared bus.
    pub address_to: u8,
    pub max_remote_motors: usize,
    pub discovery_interval_ms: u64,
    pub poll_interval_ms: u64,
    /// Budget for one bus transaction, both phases of a command included.
    pub timeout_ms: u64,
    /// Pause between a command write and its read-back.
    pub readback_delay_ms: u64,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            enabled: false,
            address_from: 0x20,
            address_to: 0x2F,
            max_remote_motors: 4,
            discovery_interval_ms: 2000,
            poll_interval_ms: 300,
            timeout_ms: 120,
            readback_delay_ms: 2,
        }
    }
}

/// Subordinate (serve) side of the secondary bus.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Subordinate {
    pub motor_count: usize,
    /// A partial frame older than this is abandoned.
    pub frame_timeout_ms: u64,
    /// Address answered on an addressed bus.
    pub address: u8,
}

impl Default for Subordinate {
    fn default() -> Self {
        Self {
            motor_count: 4,
            frame_timeout_ms: 120,
            address: 0x20,
        }
    }
}

/// Pin and device assignments for the `hardware` backends.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Hardware {
    pub i2c_bus: u8,
    pub uart_path: String,
    pub uart_baud: u32,
    /// One step pin per local motor.
    pub step_pins: Vec<u8>,
    /// One direction pin per local motor.
    pub dir_pins: Vec<u8>,
    /// Optional active-low enable pins, one per local motor when present.
    pub enable_pins: Vec<u8>,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            uart_path: "/dev/serial0".into(),
            uart_baud: 115_200,
            step_pins: vec![23],
            dir_pins: vec![24],
            enable_pins: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub pump: Pump,
    pub motors: Motors,
    pub control: Control,
    pub drive: Drive,
    pub link: Link,
    pub subordinate: Subordinate,
    pub hardware: Hardware,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pump
        let p = &self.pump;
        if !positive(p.max_speed) {
            eyre::bail!("pump.max_speed must be > 0");
        }
        if !(positive(p.min_speed) && p.min_speed < p.max_speed) {
            eyre::bail!("pump.min_speed must be in (0, max_speed)");
        }
        if !positive(p.accel_per_sec) {
            eyre::bail!("pump.accel_per_sec must be > 0");
        }
        if !positive(p.halt_per_sec) {
            eyre::bail!("pump.halt_per_sec must be > 0");
        }
        if !positive(p.ml_per_rev_cw) || !positive(p.ml_per_rev_ccw) {
            eyre::bail!("pump.ml_per_rev_cw and pump.ml_per_rev_ccw must be > 0");
        }
        if !p.dosing_speed.is_finite() || p.dosing_speed < 0.0 {
            eyre::bail!("pump.dosing_speed must be >= 0");
        }
        if !p.default_start_speed.is_finite() {
            eyre::bail!("pump.default_start_speed must be finite");
        }

        // Motors / control
        if self.motors.local_count == 0 || self.motors.local_count > MAX_MOTORS {
            eyre::bail!("motors.local_count must be in 1..=4");
        }
        if self.control.tick_ms == 0 {
            eyre::bail!("control.tick_ms must be >= 1");
        }

        // Drive
        if self.drive.microstepping == 0 {
            eyre::bail!("drive.microstepping must be >= 1");
        }
        if !positive(self.drive.step_angle_deg) || self.drive.step_angle_deg > 360.0 {
            eyre::bail!("drive.step_angle_deg must be in (0, 360]");
        }
        if !self.drive.min_frequency_hz.is_finite() || self.drive.min_frequency_hz < 0.0 {
            eyre::bail!("drive.min_frequency_hz must be >= 0");
        }

        // Link
        let l = &self.link;
        if l.address_from > l.address_to {
            eyre::bail!("link.address_from must be <= link.address_to");
        }
        if l.address_to > MAX_BUS_ADDRESS {
            eyre::bail!("link addresses must be <= 0x7F");
        }
        if l.max_remote_motors == 0 || l.max_remote_motors > MAX_MOTORS {
            eyre::bail!("link.max_remote_motors must be in 1..=4");
        }
        if l.discovery_interval_ms == 0 || l.poll_interval_ms == 0 {
            eyre::bail!("link intervals must be >= 1 ms");
        }
        if l.timeout_ms == 0 {
            eyre::bail!("link.timeout_ms must be >= 1");
        }
        if l.readback_delay_ms >= l.timeout_ms {
            eyre::bail!("link.readback_delay_ms must be < link.timeout_ms");
        }

        // Subordinate
        let s = &self.subordinate;
        if s.motor_count == 0 || s.motor_count > MAX_MOTORS {
            eyre::bail!("subordinate.motor_count must be in 1..=4");
        }
        if s.frame_timeout_ms == 0 {
            eyre::bail!("subordinate.frame_timeout_ms must be >= 1");
        }
        if s.address > MAX_BUS_ADDRESS {
            eyre::bail!("subordinate.address must be <= 0x7F");
        }

        // Hardware pins
        let h = &self.hardware;
        if h.step_pins.len() != h.dir_pins.len() {
            eyre::bail!("hardware.step_pins and hardware.dir_pins must have the same length");
        }
        if !h.enable_pins.is_empty() && h.enable_pins.len() != h.step_pins.len() {
            eyre::bail!("hardware.enable_pins must be empty or match hardware.step_pins");
        }
        if h.uart_baud == 0 {
            eyre::bail!("hardware.uart_baud must be > 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot}");
        }

        Ok(())
    }
}
