//! Drives every control entity through one outer tick at a time.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tracing::debug;

use super::entity::{ControlEntity, EntityConfig};
use super::types::{OutputValues, PortValues, TickInputs, TimeBase};
use crate::error::Result;
use crate::model::adapter::InstanceSettings;
use crate::model::{ModelAdapter, ScalarValue, SteppedModel, VariableTable};

/// Everything needed to create a batch of identical controllers.
#[derive(Debug, Clone)]
pub struct ControllerTemplate {
    /// Prefix of generated entity ids (`{model_name}_{n}`).
    pub model_name: String,
    pub table: VariableTable,
    pub instance_name: String,
    /// Bounds model start-up only.
    pub timeout: Duration,
    /// Outer tick after which the model may not be stepped, if defined.
    pub stop_tick: Option<u64>,
    /// Value every input port is primed with at creation.
    pub initial_input: ScalarValue,
    /// Parameter values written at creation, keyed by alias.
    pub parameters: PortValues,
    pub entity: EntityConfig,
}

/// Owns all control entities and steps them in lock-step with the outer clock.
///
/// Within a tick every model is advanced, then every entity receives its
/// deliveries, and only then does any entity run its decision logic.
#[derive(Debug)]
pub struct StepScheduler<M: SteppedModel> {
    time_base: TimeBase,
    entities: Vec<ControlEntity<M>>,
    counters: HashMap<String, usize>,
}

impl<M: SteppedModel> StepScheduler<M> {
    pub fn new(time_base: TimeBase) -> Self {
        Self {
            time_base,
            entities: Vec::new(),
            counters: HashMap::new(),
        }
    }

    /// Creates `num` entities from `template`, each with a fresh model from
    /// `make_model`, and returns their ids.
    ///
    /// Every model is instantiated, initialized at the time base's start
    /// time, primed with `initial_input` on all controller inputs, and given
    /// the template's parameters.
    ///
    /// # Errors
    ///
    /// Fails on model start-up errors or unbound port aliases. No entity
    /// from a failed batch is kept.
    pub fn create(
        &mut self,
        num: usize,
        template: &ControllerTemplate,
        mut make_model: impl FnMut() -> M,
    ) -> Result<Vec<String>> {
        let settings = InstanceSettings {
            instance_name: template.instance_name.clone(),
            timeout: template.timeout,
            start_time: self.time_base.start_time(),
            stop_time: template.stop_tick.map(|t| self.time_base.model_time(t)),
        };
        let primed: PortValues = template
            .entity
            .input_ports
            .iter()
            .map(|alias| (alias.clone(), template.initial_input.clone()))
            .collect();

        let counter = self.counters.entry(template.model_name.clone()).or_insert(0);
        let mut created = Vec::with_capacity(num);
        for _ in 0..num {
            let eid = format!("{}_{}", template.model_name, *counter + created.len());
            let mut adapter = ModelAdapter::start(make_model(), template.table.clone(), &settings)
                .map_err(|e| e.in_entity(eid.as_str()))?;
            adapter
                .set_inputs(&primed)
                .and_then(|()| adapter.set_parameters(&template.parameters))
                .map_err(|e| e.in_entity(eid.as_str()))?;
            created.push(ControlEntity::new(eid, adapter, template.entity.clone())?);
        }
        *counter += created.len();

        let eids = created.iter().map(|e| e.eid().to_string()).collect();
        self.entities.extend(created);
        Ok(eids)
    }

    pub fn entities(&self) -> &[ControlEntity<M>] {
        &self.entities
    }

    pub fn entity(&self, eid: &str) -> Option<&ControlEntity<M>> {
        self.entities.iter().find(|e| e.eid() == eid)
    }

    /// Runs one outer tick and returns the next tick to be invoked at.
    ///
    /// The controller asks to run every tick; its own schedule decides
    /// whether it acts.
    ///
    /// # Errors
    ///
    /// The first model failure, identifying the entity. The run must stop.
    pub fn step(&mut self, tick: u64, inputs: &TickInputs) -> Result<u64> {
        let model_time = self.time_base.model_time(tick);
        debug!(tick, model_time, "scheduler step");

        for entity in &mut self.entities {
            entity.advance_to(model_time)?;
        }
        for entity in &mut self.entities {
            let delivered = inputs.get(entity.eid());
            entity.receive(model_time, delivered);
        }
        for entity in &mut self.entities {
            entity.tick(model_time)?;
        }

        Ok(tick + 1)
    }

    /// Visible outputs for the requested aliases of each requested entity.
    ///
    /// # Errors
    ///
    /// `SimError::UnknownOutput` if an alias is not published by its entity.
    /// Unknown entity ids are skipped.
    pub fn outputs(&self, requests: &BTreeMap<String, Vec<String>>) -> Result<BTreeMap<String, OutputValues>> {
        let mut data = BTreeMap::new();
        for (eid, aliases) in requests {
            let Some(entity) = self.entity(eid) else {
                continue;
            };
            let mut values = OutputValues::new();
            for alias in aliases {
                values.insert(alias.clone(), entity.output(alias)?);
            }
            data.insert(eid.clone(), values);
        }
        Ok(data)
    }
}
