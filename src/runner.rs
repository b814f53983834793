//! Scenario wiring: sensors and transformers around a scheduler of
//! band controllers, driven tick by tick.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use tracing::info;

use crate::config::ScenarioConfig;
use crate::error::Result;
use crate::model::{BandTapController, ModelDescription, ScalarValue};
use crate::sim::clock::Clock;
use crate::sim::comm::CommChannel;
use crate::sim::entity::EntityConfig;
use crate::sim::scheduler::{ControllerTemplate, StepScheduler};
use crate::sim::sensor::{PeriodicSensor, VoltageProfile};
use crate::sim::transformer::Transformer;
use crate::sim::types::{PortValues, TickInputs, TickRecord, TimeBase};

/// Output alias the band controller publishes.
pub const TAP_PORT: &str = "tap";

/// Keeps link jitter streams apart from sensor noise streams.
const COMM_SEED_OFFSET: u64 = 0x1_0000;

/// Aggregate indicators of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Decisions taken across all controllers.
    pub decisions: usize,
    /// Tap movements applied across all transformers.
    pub tap_changes: usize,
    /// Entity-ticks with some line voltage outside `[vlow, vup]`.
    pub out_of_band_ticks: usize,
    /// Share of entity-ticks outside the band, in percent.
    pub out_of_band_pct: f64,
    /// Lowest line voltage observed (p.u.).
    pub v_min_pu: f64,
    /// Highest line voltage observed (p.u.).
    pub v_max_pu: f64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Summary ---")?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Decisions: {}", self.decisions)?;
        writeln!(f, "Tap changes: {}", self.tap_changes)?;
        writeln!(
            f,
            "Out of band: {} entity-ticks ({:.1}%)",
            self.out_of_band_ticks, self.out_of_band_pct
        )?;
        write!(
            f,
            "Voltage range: [{:.4}, {:.4}] pu",
            self.v_min_pu, self.v_max_pu
        )
    }
}

/// Records and summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<TickRecord>,
    pub summary: RunSummary,
}

/// Builds the controller template described by `cfg`.
///
/// # Errors
///
/// Fails if the configured model description cannot be read.
pub fn controller_template(cfg: &ScenarioConfig) -> Result<ControllerTemplate> {
    let c = &cfg.controller;
    let s = &cfg.simulation;

    let description = match &c.model_description {
        Some(path) => ModelDescription::from_toml_file(path)?,
        None => BandTapController::description(),
    };

    let mut parameters = PortValues::new();
    parameters.insert("vlow".to_string(), ScalarValue::Real(c.vlow));
    parameters.insert("vup".to_string(), ScalarValue::Real(c.vup));
    parameters.insert("tap_min".to_string(), ScalarValue::Integer(c.tap_min));
    parameters.insert("tap_max".to_string(), ScalarValue::Integer(c.tap_max));

    let input_ports = (0..cfg.sensors.lines).map(PeriodicSensor::port).collect();

    Ok(ControllerTemplate {
        model_name: BandTapController::MODEL_NAME.to_string(),
        table: description.variable_table(),
        instance_name: c.instance_name.clone(),
        timeout: Duration::from_millis(c.timeout_ms),
        stop_tick: c.stop_time_defined.then_some(s.ticks),
        initial_input: ScalarValue::Real(c.initial_input),
        parameters,
        entity: EntityConfig {
            input_ports,
            output_port: TAP_PORT.to_string(),
            period: c.period,
            phase_shift: c.phase_shift,
            dead_time: c.dead_time,
            time_resolution: c.time_diff_resolution,
            verbose: s.verbose,
        },
    })
}

/// Per-entity surroundings: the transformer it controls, the sensor
/// measuring that transformer's lines, and the link some readings take.
struct Plant {
    eid: String,
    sensor: PeriodicSensor,
    transformer: Transformer,
    channel: CommChannel,
    routed: BTreeSet<String>,
}

impl Plant {
    /// Readings reaching the controller at `tick`: fresh direct readings
    /// plus whatever the link delivers.
    fn collect(&mut self, tick: u64, published: Option<PortValues>) -> PortValues {
        let mut delivered = PortValues::new();
        for (port, value) in published.into_iter().flatten() {
            if self.routed.contains(&port) {
                self.channel.send(tick, &port, value);
            } else {
                delivered.insert(port, value);
            }
        }
        delivered.extend(self.channel.deliver(tick));
        delivered
    }
}

/// Runs a validated scenario to completion.
///
/// # Errors
///
/// Stops at the first model or binding failure. Ticks already executed are
/// discarded along with the error.
pub fn run_scenario(cfg: &ScenarioConfig) -> Result<RunReport> {
    let s = &cfg.simulation;
    let time_base = TimeBase::new(s.seconds_per_tick, s.start_tick);
    let mut scheduler = StepScheduler::new(time_base);
    let template = controller_template(cfg)?;
    let eids = scheduler.create(cfg.controller.count, &template, BandTapController::new)?;
    info!(entities = eids.len(), ticks = s.ticks, "starting run");

    let sen = &cfg.sensors;
    let profile = VoltageProfile {
        base_pu: sen.base_pu,
        spread_pu: sen.spread_pu,
        amp_pu: sen.amp_pu,
        noise_std: sen.noise_std,
        tap_step_pu: sen.tap_step_pu,
    };
    let routed: BTreeSet<String> = cfg
        .comm
        .routed_lines
        .iter()
        .filter_map(|line| line.checked_sub(1))
        .map(PeriodicSensor::port)
        .collect();
    let mut plants: Vec<Plant> = eids
        .into_iter()
        .enumerate()
        .map(|(i, eid)| Plant {
            eid,
            sensor: PeriodicSensor::new(
                sen.lines,
                sen.period,
                sen.phase_shift,
                time_base.start_time(),
                profile,
                s.seed.wrapping_add(i as u64),
            ),
            transformer: Transformer::default(),
            channel: CommChannel::new(
                cfg.comm.latency_ticks,
                cfg.comm.jitter_ticks,
                s.seed.wrapping_add(COMM_SEED_OFFSET).wrapping_add(i as u64),
            ),
            routed: routed.clone(),
        })
        .collect();

    let requests: BTreeMap<String, Vec<String>> = plants
        .iter()
        .map(|p| (p.eid.clone(), vec![TAP_PORT.to_string()]))
        .collect();

    let mut records = Vec::with_capacity((s.ticks as usize).saturating_mul(plants.len()));
    let mut clock = Clock::new(s.ticks);
    while let Some(tick) = clock.now() {
        let time_s = time_base.model_time(tick);

        let mut inputs = TickInputs::new();
        let mut voltages = Vec::with_capacity(plants.len());
        for plant in &mut plants {
            let v = plant.sensor.measure(time_s, plant.transformer.tap());
            let published = plant.sensor.publish(time_s, &v);
            let delivered = plant.collect(tick, published);
            if !delivered.is_empty() {
                inputs.insert(plant.eid.clone(), delivered);
            }
            voltages.push(v);
        }

        let next = scheduler.step(tick, &inputs)?;
        let outputs = scheduler.outputs(&requests)?;

        for (plant, v) in plants.iter_mut().zip(&voltages) {
            let command = outputs
                .get(&plant.eid)
                .and_then(|values| values.get(TAP_PORT))
                .and_then(Option::as_ref);
            if plant.transformer.apply(command) {
                info!(eid = %plant.eid, tick, tap = plant.transformer.tap(), "tap changed");
            }
            let state = scheduler
                .entity(&plant.eid)
                .map_or("unknown", |e| e.state().label());

            records.push(TickRecord {
                tick,
                time_s,
                eid: plant.eid.clone(),
                state,
                v_min_pu: v.iter().copied().fold(f64::INFINITY, f64::min),
                v_max_pu: v.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                sampled: inputs.contains_key(&plant.eid),
                pending_messages: plant.channel.pending(),
                tap_output: command.and_then(ScalarValue::as_f64).map(|t| t.round() as i64),
                applied_tap: plant.transformer.tap(),
            });
        }

        clock.advance_to(next);
    }

    let decisions = scheduler.entities().iter().map(|e| e.decisions()).sum();
    let tap_changes = plants.iter().map(|p| p.transformer.tap_changes()).sum();
    let summary = summarize(&records, s.ticks, decisions, tap_changes, &cfg.controller);
    info!(decisions, tap_changes, "run finished");

    Ok(RunReport { records, summary })
}

fn summarize(
    records: &[TickRecord],
    ticks: u64,
    decisions: usize,
    tap_changes: usize,
    band: &crate::config::ControllerConfig,
) -> RunSummary {
    let out_of_band_ticks = records
        .iter()
        .filter(|r| r.v_min_pu < band.vlow || r.v_max_pu > band.vup)
        .count();
    let out_of_band_pct = if records.is_empty() {
        0.0
    } else {
        100.0 * out_of_band_ticks as f64 / records.len() as f64
    };
    let v_min_pu = records.iter().map(|r| r.v_min_pu).fold(f64::INFINITY, f64::min);
    let v_max_pu = records
        .iter()
        .map(|r| r.v_max_pu)
        .fold(f64::NEG_INFINITY, f64::max);

    RunSummary {
        ticks,
        decisions,
        tap_changes,
        out_of_band_ticks,
        out_of_band_pct,
        v_min_pu: if records.is_empty() { 0.0 } else { v_min_pu },
        v_max_pu: if records.is_empty() { 0.0 } else { v_max_pu },
    }
}
