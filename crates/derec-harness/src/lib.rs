//! Deterministic simulation harness for DeRec protocol testing.
//!
//! - [`SimEnv`]: manually advanced virtual clock and seeded RNG
//! - [`World`]: in-memory transport between session managers, with
//!   partitions for fault injection
//! - [`model`]: reference model of the keep-alive machine for model-based
//!   tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;
pub mod world;

pub use model::{KeepAliveModel, Operation};
pub use sim_env::SimEnv;
pub use world::{Datagram, World, WorldError};
