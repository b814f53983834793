//! Embedded model interface: typed scalar values, variable categories, and
//! the externally-stepped model contract the controller drives.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Clock-synchronized, alias-keyed wrapper around one model instance.
pub mod adapter;
/// Built-in voltage-band tap controller model.
pub mod band_controller;
/// Alias resolution and typed get/set dispatch.
pub mod binding;
/// Model self-description parsing and the port binding table.
pub mod description;

pub use adapter::ModelAdapter;
pub use band_controller::BandTapController;
pub use binding::VariableBinding;
pub use description::{ModelDescription, VariableTable};

/// Category of a bound model variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Causality {
    Parameter,
    Input,
    Output,
}

impl Causality {
    /// All categories, in table order.
    pub const ALL: [Causality; 3] = [Causality::Parameter, Causality::Input, Causality::Output];
}

impl fmt::Display for Causality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Causality::Parameter => "parameter",
            Causality::Input => "input",
            Causality::Output => "output",
        };
        f.write_str(s)
    }
}

/// Declared scalar type of a model variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ScalarType {
    Real,
    Integer,
    Boolean,
    String,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarType::Real => "Real",
            ScalarType::Integer => "Integer",
            ScalarType::Boolean => "Boolean",
            ScalarType::String => "String",
        };
        f.write_str(s)
    }
}

/// A value read from or written to a model port.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Real(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl ScalarValue {
    /// The scalar type tag of this value.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ScalarValue::Real(_) => ScalarType::Real,
            ScalarValue::Integer(_) => ScalarType::Integer,
            ScalarValue::Boolean(_) => ScalarType::Boolean,
            ScalarValue::String(_) => ScalarType::String,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Real(v) => Some(*v),
            ScalarValue::Integer(v) => Some(*v as f64),
            ScalarValue::Boolean(_) | ScalarValue::String(_) => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Real(v) => write!(f, "{v}"),
            ScalarValue::Integer(v) => write!(f, "{v}"),
            ScalarValue::Boolean(v) => write!(f, "{v}"),
            ScalarValue::String(v) => f.write_str(v),
        }
    }
}

/// Non-OK status reported by a model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStatus {
    Warning,
    Discard,
    Error,
    Fatal,
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultStatus::Warning => "warning",
            FaultStatus::Discard => "discard",
            FaultStatus::Error => "error",
            FaultStatus::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Failure reported by a model implementation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{status}: {message}")]
pub struct ModelFault {
    pub status: FaultStatus,
    pub message: String,
}

impl ModelFault {
    pub fn new(status: FaultStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for an `Error`-status fault.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FaultStatus::Error, message)
    }
}

/// Result of a single model call.
pub type ModelResult<T> = std::result::Result<T, ModelFault>;

/// An externally-stepped deterministic model addressed by native variable names.
///
/// Implementations keep their own clock. `do_step` must be called with the
/// model's current time and advances it by `step_size`; a zero step recomputes
/// outputs from the current inputs without moving time.
pub trait SteppedModel {
    /// Creates the instance. `timeout` bounds start-up only.
    fn instantiate(&mut self, instance_name: &str, timeout: Duration) -> ModelResult<()>;

    /// Sets the model clock to `start_time`, optionally declaring a stop time.
    fn initialize(&mut self, start_time: f64, stop_time: Option<f64>) -> ModelResult<()>;

    fn set_real(&mut self, name: &str, value: f64) -> ModelResult<()>;
    fn set_integer(&mut self, name: &str, value: i64) -> ModelResult<()>;
    fn set_boolean(&mut self, name: &str, value: bool) -> ModelResult<()>;
    fn set_string(&mut self, name: &str, value: &str) -> ModelResult<()>;

    fn get_real(&self, name: &str) -> ModelResult<f64>;
    fn get_integer(&self, name: &str) -> ModelResult<i64>;
    fn get_boolean(&self, name: &str) -> ModelResult<bool>;
    fn get_string(&self, name: &str) -> ModelResult<String>;

    /// Advances from `current_time` by `step_size` seconds.
    fn do_step(&mut self, current_time: f64, step_size: f64) -> ModelResult<()>;
}
