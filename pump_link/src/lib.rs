#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Secondary-bus protocol between a master unit and its subordinate peers.
//!
//! ## Wire format
//!
//! A body is `[cmd][motor?][fields...][xor]`. Multi-byte fields are
//! little-endian; the trailing byte is the XOR of everything before it. On I2C
//! the transaction size carries the length, on a byte stream each body is
//! preceded by one length byte.
//!
//! ## Layers
//!
//! - **Codec**: `frame`, `fields`, `command`, `record`
//! - **Stream framing**: `assembler`
//! - **Subordinate**: `dispatcher` applies commands to a `MotorRegistry`
//! - **Master**: `link` (discovery, polling, commands) and `bank` (motor-id routing)

pub mod assembler;
pub mod bank;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod fields;
pub mod frame;
pub mod link;
pub mod mocks;
pub mod record;

pub use assembler::FrameAssembler;
pub use bank::{BankError, MotorBank};
pub use command::{Command, CommandCode, WireSettings};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::{FrameError, LinkError, map_bus_error};
pub use link::{LinkCfg, LinkDriver, LinkDriverBuilder, LinkEvent, Peer};
pub use record::{HelloRecord, StateRecord};
