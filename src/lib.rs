//! Periodic on-load tap changer controller driving an externally-stepped
//! model in lock-step with a discrete simulation clock.

pub mod cli;
/// TOML scenario configuration and presets.
pub mod config;
pub mod error;
pub mod io;
/// Embedded model interface, binding table, and built-in controller model.
pub mod model;
pub mod runner;
/// Clock, control entities, scheduler, and plant stand-ins.
pub mod sim;

pub use error::{Result, SimError};
