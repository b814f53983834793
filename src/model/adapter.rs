use std::collections::BTreeMap;
use std::time::Duration;

use tracing::trace;

use super::binding::VariableBinding;
use super::description::VariableTable;
use super::{Causality, ScalarValue, SteppedModel};
use crate::error::{Result, SimError};

/// Start-up settings for one model instance.
#[derive(Debug, Clone)]
pub struct InstanceSettings {
    pub instance_name: String,
    /// Bounds instantiation only; steps are never timed out.
    pub timeout: Duration,
    /// Model time at which the instance starts.
    pub start_time: f64,
    pub stop_time: Option<f64>,
}

/// Owns one model instance and keeps its clock in lock-step with the outer
/// simulation clock.
///
/// All reads and writes go through the alias-keyed binding table; none of them
/// moves the clock.
#[derive(Debug)]
pub struct ModelAdapter<M: SteppedModel> {
    model: M,
    binding: VariableBinding,
    model_time: f64,
}

impl<M: SteppedModel> ModelAdapter<M> {
    /// Instantiates and initializes `model` at `settings.start_time`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Instantiation` if the model refuses to start.
    pub fn start(mut model: M, table: VariableTable, settings: &InstanceSettings) -> Result<Self> {
        let fail = |source| SimError::Instantiation {
            instance: settings.instance_name.clone(),
            source,
        };
        model
            .instantiate(&settings.instance_name, settings.timeout)
            .map_err(fail)?;
        model
            .initialize(settings.start_time, settings.stop_time)
            .map_err(fail)?;

        Ok(Self {
            model,
            binding: VariableBinding::new(table),
            model_time: settings.start_time,
        })
    }

    /// The model's own clock.
    pub fn model_time(&self) -> f64 {
        self.model_time
    }

    pub fn binding(&self) -> &VariableBinding {
        &self.binding
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Advances the model clock to `target_time` in a single step.
    ///
    /// Afterwards `model_time() == target_time` exactly. Advancing to the
    /// current time issues a zero-length step.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ModelStep` if the model rejects the step.
    pub fn advance_to(&mut self, target_time: f64) -> Result<()> {
        let step = target_time - self.model_time;
        trace!(from = self.model_time, to = target_time, "advancing model");
        self.model
            .do_step(self.model_time, step)
            .map_err(|source| SimError::ModelStep {
                time: self.model_time,
                step,
                source,
            })?;
        self.model_time = target_time;
        Ok(())
    }

    /// Forces the model to recompute outputs from its current inputs without
    /// moving time.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ModelStep` if the zero-length step is rejected.
    pub fn evaluate_at(&mut self, current_time: f64) -> Result<()> {
        self.model
            .do_step(current_time, 0.0)
            .map_err(|source| SimError::ModelStep {
                time: current_time,
                step: 0.0,
                source,
            })
    }

    /// Writes every value to the input port of the same alias.
    pub fn set_inputs(&mut self, values: &BTreeMap<String, ScalarValue>) -> Result<()> {
        self.set_all(Causality::Input, values)
    }

    /// Writes every value to the parameter of the same alias.
    pub fn set_parameters(&mut self, values: &BTreeMap<String, ScalarValue>) -> Result<()> {
        self.set_all(Causality::Parameter, values)
    }

    /// Reads the output port `alias`.
    pub fn get_output(&self, alias: &str) -> Result<ScalarValue> {
        self.binding.get(&self.model, Causality::Output, alias)
    }

    fn set_all(&mut self, category: Causality, values: &BTreeMap<String, ScalarValue>) -> Result<()> {
        for (alias, value) in values {
            self.binding.set(&mut self.model, category, alias, value)?;
        }
        Ok(())
    }
}
