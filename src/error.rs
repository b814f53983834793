//! Error types for the controller core.
//!
//! Every variant is fatal for the current run: nothing is retried and the
//! trajectory stops at the tick that raised it.

use thiserror::Error;

use crate::model::{Causality, ModelFault};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised while configuring, binding, stepping, or reading an embedded model.
#[derive(Debug, Error)]
pub enum SimError {
    /// The alias has no entry in the binding table for that category.
    #[error("unknown {category} variable `{alias}`")]
    UnknownVariable { category: Causality, alias: String },

    /// The model rejected a get or set on a bound variable.
    #[error("model rejected access to `{alias}` (native `{native}`): {source}")]
    ModelIo {
        alias: String,
        native: String,
        #[source]
        source: ModelFault,
    },

    /// The model rejected a step or evaluation.
    #[error("model step of {step}s at t={time}s failed: {source}")]
    ModelStep {
        time: f64,
        step: f64,
        #[source]
        source: ModelFault,
    },

    /// Instantiation or initialization of a model instance failed.
    #[error("failed to start model instance `{instance}`: {source}")]
    Instantiation {
        instance: String,
        #[source]
        source: ModelFault,
    },

    /// An output was requested that the entity does not publish.
    #[error("controller has no attribute `{alias}`")]
    UnknownOutput { alias: String },

    /// A controller was configured with an unusable period or dead time.
    #[error("invalid controller timing: `{field}` = {value}")]
    InvalidTiming { field: &'static str, value: f64 },

    /// The model self-description could not be read or parsed.
    #[error("invalid model description: {0}")]
    Description(String),

    /// Wraps a failure with the id of the entity that raised it.
    #[error("entity `{eid}`: {source}")]
    Entity {
        eid: String,
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    /// Attaches the offending entity id to an error.
    pub fn in_entity(self, eid: impl Into<String>) -> Self {
        match self {
            already @ Self::Entity { .. } => already,
            other => Self::Entity {
                eid: eid.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping entity wrappers.
    pub fn root(&self) -> &SimError {
        match self {
            Self::Entity { source, .. } => source.root(),
            other => other,
        }
    }
}
