//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config file used when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG: &str = "etc/pump.toml";

#[derive(Parser, Debug)]
#[command(name = "pump", version, about = "Peristaltic pump controller")]
pub struct Cli {
    /// Path to config TOML (defaults to etc/pump.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and print results as JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG takes precedence
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Pace {
    /// Advance a simulated clock; runs as fast as the host allows
    Fast,
    /// Follow wall-clock time
    Realtime,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop against simulated outputs and print the final state
    Simulate {
        /// Global motor id to drive
        #[arg(long, default_value_t = 0)]
        motor: u8,
        /// Run at this flow in litres/hour
        #[arg(long, value_name = "LPH", conflicts_with = "dose")]
        flow: Option<f32>,
        /// Dose this many millilitres, then stop
        #[arg(long, value_name = "ML")]
        dose: Option<u16>,
        /// Pump counter-clockwise
        #[arg(long, action = ArgAction::SetTrue)]
        reverse: bool,
        /// Simulated run time
        #[arg(long, value_name = "SECONDS", default_value_t = 10.0)]
        seconds: f32,
        /// Attach an in-process subordinate with this many motors
        #[arg(long, value_name = "MOTORS", default_value_t = 0)]
        peer_motors: u8,
        /// Loop pacing
        #[arg(long, value_enum, default_value_t = Pace::Fast)]
        pace: Pace,
    },
    /// Probe the configured address range for a subordinate
    Discover,
    /// Act as a subordinate: read `[len][body]` frames and answer them
    ///
    /// Host builds read stdin and write stdout; hardware builds use the UART.
    Serve,
    /// Quick health check (config, link round trip, step output)
    SelfCheck,
}
