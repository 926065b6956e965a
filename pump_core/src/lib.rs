#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core pump logic (hardware-agnostic).
//!
//! This crate holds the per-motor ramp/dosing state machine and everything the
//! control loop needs around it. Hardware is reached only through
//! `pump_traits::StepDriver` and `pump_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Controller**: speed ramp, dosing and counters (`controller` module)
//! - **Registry**: fixed-capacity set of local controllers (`registry` module)
//! - **Configuration**: runtime config structs (`config` module)
//! - **Drive**: speed to step-frequency output (`drive` module)
//! - **Pacing**: control-loop delta source (`runner` module)
//! - **Status**: collapsed run state (`status` module)
//!
//! ## Units
//!
//! Speeds are rev/min with the sign giving direction (positive = clockwise).
//! Volumes are millilitres; the cumulative counters are litres. The wire format
//! quantizes these to integers; see `fixed_point`.

pub mod config;
pub mod controller;
pub mod conversions;
pub mod drive;
pub mod error;
pub mod fixed_point;
pub mod registry;
pub mod runner;
pub mod status;
pub mod util;

pub use config::{ControlCfg, DriveCfg, PumpCfg};
pub use controller::{Mode, MotorState, PumpController};
pub use error::{BuildError, PumpError, Report, Result};
pub use registry::{MAX_MOTORS, MotorRegistry};
pub use runner::LoopTimer;
pub use status::PumpStatus;
