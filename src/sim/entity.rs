//! Per-device periodic controller with a dead-time state machine.

use std::collections::BTreeMap;

use tracing::{debug, info, trace};

use super::types::PortValues;
use crate::error::{Result, SimError};
use crate::model::{Causality, ModelAdapter, ScalarValue, SteppedModel};

/// Whether the controller may act on the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlState {
    /// Accepting inputs and deciding when a decision is due.
    Responsive,
    /// Ignoring decision instants until `wakeup_time` (model seconds).
    DeadTime { wakeup_time: f64 },
}

impl ControlState {
    pub fn label(&self) -> &'static str {
        match self {
            ControlState::Responsive => "responsive",
            ControlState::DeadTime { .. } => "dead_time",
        }
    }
}

/// Decision timing and port wiring of one controlled device.
#[derive(Debug, Clone)]
pub struct EntityConfig {
    /// Controller input aliases, read from the cache at each decision.
    pub input_ports: Vec<String>,
    /// The single output alias the controller publishes.
    pub output_port: String,
    /// Seconds between decisions (> 0).
    pub period: f64,
    /// Offset of the decision grid; any real, normalized into `[0, period)`.
    pub phase_shift: f64,
    /// Seconds of unresponsiveness after each decision (>= 0).
    pub dead_time: f64,
    /// Two instants closer than this are treated as equal.
    pub time_resolution: f64,
    /// Log every input and decision at `info` instead of `trace`.
    pub verbose: bool,
}

/// Normalizes a phase shift into `[0, period)`.
///
/// # Examples
///
/// ```
/// use oltc_sim::sim::entity::normalize_phase;
///
/// assert_eq!(normalize_phase(-30.0, 60.0), 30.0);
/// assert_eq!(normalize_phase(75.0, 60.0), 15.0);
/// ```
pub fn normalize_phase(phase_shift: f64, period: f64) -> f64 {
    let phase = phase_shift.rem_euclid(period);
    // rem_euclid can round up to `period` for tiny negative inputs
    if phase >= period { 0.0 } else { phase }
}

/// Earliest instant `phase + k * period` (`k >= 0`) not before `start`.
///
/// Instants within `resolution` of `start` count as not before it.
///
/// # Examples
///
/// ```
/// use oltc_sim::sim::entity::first_grid_time;
///
/// assert_eq!(first_grid_time(1.0, 60.0, 0.0, 1e-9), 1.0);
/// assert_eq!(first_grid_time(1.0, 60.0, 100.0, 1e-9), 121.0);
/// assert_eq!(first_grid_time(-30.0, 60.0, 90.0, 1e-9), 90.0);
/// ```
pub fn first_grid_time(phase_shift: f64, period: f64, start: f64, resolution: f64) -> f64 {
    let phase = normalize_phase(phase_shift, period);
    if phase >= start - resolution {
        return phase;
    }
    let periods = ((start - phase - resolution) / period).ceil();
    phase + periods * period
}

/// One controlled device: owns its model instance, input cache, decision
/// schedule, and dead-time state.
///
/// Each tick the entity first [`receive`](Self::receive)s delivered inputs and
/// then runs [`tick`](Self::tick). A decision stored during a tick only becomes
/// visible through [`output`](Self::output) once the entity is responsive again.
#[derive(Debug)]
pub struct ControlEntity<M: SteppedModel> {
    eid: String,
    adapter: ModelAdapter<M>,
    input_ports: Vec<String>,
    output_port: String,
    period: f64,
    dead_time: f64,
    time_resolution: f64,
    verbose: bool,
    next_decision_time: f64,
    state: ControlState,
    cached_inputs: BTreeMap<String, ScalarValue>,
    last_output: Option<ScalarValue>,
    decisions: usize,
}

impl<M: SteppedModel> ControlEntity<M> {
    /// Creates an entity around a started model adapter.
    ///
    /// The first decision is the earliest instant `phase + k * period` at or
    /// after the adapter's current model time.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidTiming` if `period` is not positive or
    /// `dead_time` is negative, and `SimError::UnknownVariable` if any input
    /// or the output alias is not bound. Both are wrapped with the entity id.
    /// No model step is issued.
    pub fn new(eid: impl Into<String>, adapter: ModelAdapter<M>, config: EntityConfig) -> Result<Self> {
        let eid = eid.into();
        if !(config.period > 0.0 && config.period.is_finite()) {
            return Err(SimError::InvalidTiming {
                field: "period",
                value: config.period,
            }
            .in_entity(eid));
        }
        if !(config.dead_time >= 0.0 && config.dead_time.is_finite()) {
            return Err(SimError::InvalidTiming {
                field: "dead_time",
                value: config.dead_time,
            }
            .in_entity(eid));
        }

        let binding = adapter.binding();
        let unbound = config
            .input_ports
            .iter()
            .map(|alias| binding.resolve(Causality::Input, alias).map(|_| ()))
            .chain(std::iter::once(
                binding.resolve(Causality::Output, &config.output_port).map(|_| ()),
            ))
            .find_map(|r| r.err());
        if let Some(err) = unbound {
            return Err(err.in_entity(eid));
        }

        let next_decision_time = first_grid_time(
            config.phase_shift,
            config.period,
            adapter.model_time(),
            config.time_resolution,
        );

        Ok(Self {
            eid,
            adapter,
            input_ports: config.input_ports,
            output_port: config.output_port,
            period: config.period,
            dead_time: config.dead_time,
            time_resolution: config.time_resolution,
            verbose: config.verbose,
            next_decision_time,
            state: ControlState::Responsive,
            cached_inputs: BTreeMap::new(),
            last_output: None,
            decisions: 0,
        })
    }

    pub fn eid(&self) -> &str {
        &self.eid
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn is_responsive(&self) -> bool {
        self.state == ControlState::Responsive
    }

    /// End of the current dead time, if the entity is in one.
    pub fn wakeup_time(&self) -> Option<f64> {
        match self.state {
            ControlState::Responsive => None,
            ControlState::DeadTime { wakeup_time } => Some(wakeup_time),
        }
    }

    pub fn next_decision_time(&self) -> f64 {
        self.next_decision_time
    }

    /// Most recent decision, regardless of whether it is currently visible.
    pub fn last_output(&self) -> Option<&ScalarValue> {
        self.last_output.as_ref()
    }

    pub fn cached_input(&self, alias: &str) -> Option<&ScalarValue> {
        self.cached_inputs.get(alias)
    }

    /// Number of decisions taken so far.
    pub fn decisions(&self) -> usize {
        self.decisions
    }

    pub fn adapter(&self) -> &ModelAdapter<M> {
        &self.adapter
    }

    /// Advances the owned model to `model_time`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ModelStep` wrapped with the entity id.
    pub fn advance_to(&mut self, model_time: f64) -> Result<()> {
        let result = self.adapter.advance_to(model_time);
        result.map_err(|e| e.in_entity(self.eid.as_str()))
    }

    /// Caches newly delivered input values.
    ///
    /// Ports without a delivery keep their previous value. Deliveries for
    /// aliases that are not controller inputs are ignored.
    pub fn receive(&mut self, model_time: f64, delivered: Option<&PortValues>) {
        let Some(delivered) = delivered else {
            return;
        };
        for (alias, value) in delivered {
            if !self.input_ports.iter().any(|p| p == alias) {
                debug!(eid = %self.eid, %alias, "ignoring delivery for unknown input");
                continue;
            }
            if self.verbose {
                info!(eid = %self.eid, t = model_time, %alias, %value, "controller input");
            } else {
                trace!(eid = %self.eid, t = model_time, %alias, %value, "controller input");
            }
            self.cached_inputs.insert(alias.clone(), value.clone());
        }
    }

    /// Runs the dead-time state machine for the tick at `model_time`.
    ///
    /// The model must already have been advanced to `model_time`.
    ///
    /// # Errors
    ///
    /// Any model failure during a decision, wrapped with the entity id.
    pub fn tick(&mut self, model_time: f64) -> Result<()> {
        match self.state {
            ControlState::Responsive => {
                if !self.has_all_inputs() {
                    if self.is_due(model_time) {
                        debug!(eid = %self.eid, t = model_time, "input history incomplete, skipping decision");
                        self.next_decision_time += self.period;
                    }
                    self.last_output = None;
                    return Ok(());
                }
                if !self.is_due(model_time) {
                    self.last_output = None;
                    return Ok(());
                }

                let decided = self.decide(model_time);
                let value = decided.map_err(|e| e.in_entity(self.eid.as_str()))?;
                if self.verbose {
                    info!(eid = %self.eid, t = model_time, %value, "controller decision");
                } else {
                    trace!(eid = %self.eid, t = model_time, %value, "controller decision");
                }

                self.last_output = Some(value);
                self.decisions += 1;
                self.next_decision_time += self.period;

                let wakeup_time = model_time + self.dead_time;
                debug!(eid = %self.eid, wakeup_time, "entering dead time");
                self.state = ControlState::DeadTime { wakeup_time };
            }
            ControlState::DeadTime { wakeup_time } => {
                if model_time >= wakeup_time - self.time_resolution {
                    debug!(eid = %self.eid, t = model_time, "leaving dead time");
                    self.state = ControlState::Responsive;
                }
            }
        }
        Ok(())
    }

    /// Currently visible value of `alias`, or `None` for "no output".
    ///
    /// # Errors
    ///
    /// Returns `SimError::UnknownOutput` if `alias` is not the entity's output.
    pub fn output(&self, alias: &str) -> Result<Option<ScalarValue>> {
        if alias != self.output_port {
            return Err(SimError::UnknownOutput {
                alias: alias.to_string(),
            }
            .in_entity(self.eid.as_str()));
        }
        Ok(match self.state {
            ControlState::Responsive => self.last_output.clone(),
            ControlState::DeadTime { .. } => None,
        })
    }

    fn has_all_inputs(&self) -> bool {
        self.input_ports
            .iter()
            .all(|p| self.cached_inputs.contains_key(p))
    }

    fn is_due(&self, model_time: f64) -> bool {
        (model_time - self.next_decision_time).abs() <= self.time_resolution
    }

    fn decide(&mut self, model_time: f64) -> Result<ScalarValue> {
        self.adapter.set_inputs(&self.cached_inputs)?;
        self.adapter.evaluate_at(model_time)?;
        self.adapter.get_output(&self.output_port)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::BandTapController;
    use crate::model::adapter::InstanceSettings;

    fn adapter() -> ModelAdapter<BandTapController> {
        adapter_at(0.0)
    }

    fn adapter_at(start_time: f64) -> ModelAdapter<BandTapController> {
        ModelAdapter::start(
            BandTapController::new(),
            BandTapController::description().variable_table(),
            &InstanceSettings {
                instance_name: "Controller1".to_string(),
                timeout: Duration::ZERO,
                start_time,
                stop_time: None,
            },
        )
        .expect("adapter should start")
    }

    fn config(period: f64, phase_shift: f64, dead_time: f64) -> EntityConfig {
        EntityConfig {
            input_ports: vec!["u_line1".to_string()],
            output_port: "tap".to_string(),
            period,
            phase_shift,
            dead_time,
            time_resolution: 1e-9,
            verbose: false,
        }
    }

    fn reading(u: f64) -> PortValues {
        let mut values = PortValues::new();
        values.insert("u_line1".to_string(), ScalarValue::Real(u));
        values
    }

    /// Advances, delivers, and ticks once, returning the visible output.
    fn run_tick(
        entity: &mut ControlEntity<BandTapController>,
        t: f64,
        delivered: Option<&PortValues>,
    ) -> Option<ScalarValue> {
        entity.advance_to(t).expect("advance");
        entity.receive(t, delivered);
        entity.tick(t).expect("tick");
        assert_eq!(entity.is_responsive(), entity.wakeup_time().is_none());
        entity.output("tap").expect("known output")
    }

    #[test]
    fn negative_phase_is_normalized() {
        let entity = ControlEntity::new("c_0", adapter(), config(60.0, -30.0, 1.0)).expect("new");
        assert_eq!(entity.next_decision_time(), 30.0);
    }

    #[test]
    fn unknown_input_alias_fails_before_any_step() {
        let mut cfg = config(60.0, 0.0, 1.0);
        cfg.input_ports.push("u_line9".to_string());
        let err = ControlEntity::new("c_0", adapter(), cfg).unwrap_err();
        assert!(err.to_string().contains("c_0"));
        assert!(matches!(err.root(), SimError::UnknownVariable { alias, .. } if alias == "u_line9"));
    }

    #[test]
    fn unknown_output_alias_fails() {
        let mut cfg = config(60.0, 0.0, 1.0);
        cfg.output_port = "ratio".to_string();
        assert!(ControlEntity::new("c_0", adapter(), cfg).is_err());
    }

    #[test]
    fn decision_enters_dead_time_and_hides_output() {
        let mut entity = ControlEntity::new("c_0", adapter(), config(60.0, 0.0, 1.0)).expect("new");
        let out = run_tick(&mut entity, 0.0, Some(&reading(0.9)));

        assert_eq!(out, None);
        assert_eq!(entity.state(), ControlState::DeadTime { wakeup_time: 1.0 });
        assert_eq!(entity.last_output(), Some(&ScalarValue::Integer(1)));
        assert_eq!(entity.next_decision_time(), 60.0);
        assert_eq!(entity.decisions(), 1);
    }

    #[test]
    fn decision_becomes_visible_on_wakeup_then_clears() {
        let mut entity = ControlEntity::new("c_0", adapter(), config(60.0, 0.0, 1.0)).expect("new");
        run_tick(&mut entity, 0.0, Some(&reading(0.9)));

        let at_wakeup = run_tick(&mut entity, 1.0, Some(&reading(0.9)));
        assert!(entity.is_responsive());
        assert_eq!(at_wakeup, Some(ScalarValue::Integer(1)));

        let after = run_tick(&mut entity, 2.0, Some(&reading(0.9)));
        assert_eq!(after, None);
        assert_eq!(entity.next_decision_time(), 60.0);
    }

    #[test]
    fn missing_history_skips_decision_and_clears_output() {
        let mut cfg = config(60.0, 0.0, 0.0);
        cfg.input_ports.push("u_line2".to_string());
        let mut entity = ControlEntity::new("c_0", adapter(), cfg).expect("new");

        let out = run_tick(&mut entity, 0.0, Some(&reading(0.9)));
        assert_eq!(out, None);
        assert!(entity.is_responsive());
        assert_eq!(entity.decisions(), 0);
        assert_eq!(entity.next_decision_time(), 60.0);
        assert_eq!(entity.cached_input("u_line1"), Some(&ScalarValue::Real(0.9)));
    }

    #[test]
    fn skipped_instant_keeps_schedule_for_late_history() {
        let mut cfg = config(10.0, 0.0, 0.0);
        cfg.input_ports.push("u_line2".to_string());
        let mut entity = ControlEntity::new("c_0", adapter(), cfg).expect("new");

        run_tick(&mut entity, 0.0, Some(&reading(0.9)));
        let mut late = PortValues::new();
        late.insert("u_line2".to_string(), ScalarValue::Real(0.9));
        run_tick(&mut entity, 3.0, Some(&late));
        assert_eq!(entity.decisions(), 0);

        for t in 4..=10 {
            run_tick(&mut entity, f64::from(t), None);
        }
        assert_eq!(entity.decisions(), 1);
        assert_eq!(entity.last_output(), Some(&ScalarValue::Integer(1)));
    }

    #[test]
    fn cached_inputs_survive_ticks_without_delivery() {
        let mut entity = ControlEntity::new("c_0", adapter(), config(10.0, 5.0, 0.0)).expect("new");
        run_tick(&mut entity, 0.0, Some(&reading(1.07)));
        for t in 1..5 {
            run_tick(&mut entity, f64::from(t), None);
        }
        run_tick(&mut entity, 5.0, None);
        assert_eq!(entity.decisions(), 1);
        assert_eq!(entity.last_output(), Some(&ScalarValue::Integer(-1)));
    }

    #[test]
    fn zero_dead_time_wakes_on_next_tick() {
        let mut entity = ControlEntity::new("c_0", adapter(), config(2.0, 0.0, 0.0)).expect("new");
        let mut decided_at = Vec::new();
        for t in 0..6 {
            let t = f64::from(t);
            run_tick(&mut entity, t, Some(&reading(1.0)));
            if entity.wakeup_time() == Some(t) {
                decided_at.push(t);
            }
        }
        assert_eq!(decided_at, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn dead_time_longer_than_period_misses_decision() {
        let mut entity = ControlEntity::new("c_0", adapter(), config(2.0, 0.0, 3.0)).expect("new");
        for t in 0..8 {
            run_tick(&mut entity, f64::from(t), Some(&reading(1.0)));
        }
        assert_eq!(entity.decisions(), 1);
        assert_eq!(entity.next_decision_time(), 2.0);
    }

    #[test]
    fn late_start_catches_up_to_next_grid_instant() {
        let entity =
            ControlEntity::new("c_0", adapter_at(100.0), config(60.0, 1.0, 2.0)).expect("new");
        assert_eq!(entity.next_decision_time(), 121.0);
    }

    #[test]
    fn start_on_grid_instant_decides_at_start() {
        let entity =
            ControlEntity::new("c_0", adapter_at(121.0), config(60.0, 1.0, 2.0)).expect("new");
        assert_eq!(entity.next_decision_time(), 121.0);

        // just past the instant, but within the resolution
        let entity = ControlEntity::new("c_0", adapter_at(121.0 + 5e-10), config(60.0, 1.0, 2.0))
            .expect("new");
        assert_eq!(entity.next_decision_time(), 121.0);
    }

    #[test]
    fn late_start_decides_first_at_caught_up_instant() {
        let mut entity =
            ControlEntity::new("c_0", adapter_at(100.0), config(60.0, 1.0, 0.0)).expect("new");
        for t in 100..=121 {
            run_tick(&mut entity, f64::from(t), Some(&reading(0.9)));
            if t < 121 {
                assert_eq!(entity.decisions(), 0, "decided early at {t}");
            }
        }
        assert_eq!(entity.decisions(), 1);
        assert_eq!(entity.wakeup_time(), Some(121.0));
        assert_eq!(entity.next_decision_time(), 181.0);
    }

    #[test]
    fn invalid_timing_is_an_error_not_a_panic() {
        let err = ControlEntity::new("c_0", adapter(), config(0.0, 0.0, 1.0)).unwrap_err();
        assert!(err.to_string().contains("c_0"));
        assert!(matches!(err.root(), SimError::InvalidTiming { field: "period", .. }));

        let err = ControlEntity::new("c_0", adapter(), config(60.0, 0.0, -1.0)).unwrap_err();
        assert!(matches!(err.root(), SimError::InvalidTiming { field: "dead_time", .. }));
    }

    #[test]
    fn unknown_output_request_is_an_error() {
        let entity = ControlEntity::new("c_0", adapter(), config(60.0, 0.0, 1.0)).expect("new");
        let err = entity.output("voltage").unwrap_err();
        assert!(matches!(err.root(), SimError::UnknownOutput { .. }));
    }
}
