//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use oltc_sim::model::description::{DeclaredCausality, VariableSpec};
use oltc_sim::model::{ModelDescription, ModelFault, ModelResult, ScalarType, ScalarValue, SteppedModel};
use oltc_sim::sim::entity::EntityConfig;
use oltc_sim::sim::scheduler::{ControllerTemplate, StepScheduler};
use oltc_sim::sim::types::{PortValues, TickInputs, TimeBase};

/// Calls observed by a [`RecordingModel`], shared with the test.
#[derive(Debug, Default)]
pub struct CallLog {
    /// `(current_time, step_size)` of every `do_step`.
    pub steps: Vec<(f64, f64)>,
    /// Native names written, in order.
    pub writes: Vec<String>,
}

/// Algebraic test model: output `y = gain * u` recomputed on every step.
///
/// Variables: input `sig.u` (Real, alias `sig_u`), parameter `gain` (Real),
/// output `y` (Real).
#[derive(Debug)]
pub struct RecordingModel {
    log: Rc<RefCell<CallLog>>,
    time: f64,
    u: f64,
    gain: f64,
    y: f64,
}

impl RecordingModel {
    pub fn new(log: Rc<RefCell<CallLog>>) -> Self {
        Self {
            log,
            time: 0.0,
            u: 0.0,
            gain: 1.0,
            y: 0.0,
        }
    }

    pub fn description() -> ModelDescription {
        ModelDescription {
            model_name: "Recorder".to_string(),
            variables: vec![
                VariableSpec::new("sig.u", DeclaredCausality::Input, ScalarType::Real),
                VariableSpec::new("gain", DeclaredCausality::Parameter, ScalarType::Real),
                VariableSpec::new("y", DeclaredCausality::Output, ScalarType::Real),
            ],
        }
    }
}

impl SteppedModel for RecordingModel {
    fn instantiate(&mut self, _instance_name: &str, _timeout: Duration) -> ModelResult<()> {
        Ok(())
    }

    fn initialize(&mut self, start_time: f64, _stop_time: Option<f64>) -> ModelResult<()> {
        self.time = start_time;
        Ok(())
    }

    fn set_real(&mut self, name: &str, value: f64) -> ModelResult<()> {
        self.log.borrow_mut().writes.push(name.to_string());
        match name {
            "sig.u" => self.u = value,
            "gain" => self.gain = value,
            _ => return Err(ModelFault::error(format!("no variable {name}"))),
        }
        Ok(())
    }

    fn set_integer(&mut self, name: &str, _value: i64) -> ModelResult<()> {
        Err(ModelFault::error(format!("no integer {name}")))
    }

    fn set_boolean(&mut self, name: &str, _value: bool) -> ModelResult<()> {
        Err(ModelFault::error(format!("no boolean {name}")))
    }

    fn set_string(&mut self, name: &str, _value: &str) -> ModelResult<()> {
        Err(ModelFault::error(format!("no string {name}")))
    }

    fn get_real(&self, name: &str) -> ModelResult<f64> {
        match name {
            "y" => Ok(self.y),
            _ => Err(ModelFault::error(format!("no variable {name}"))),
        }
    }

    fn get_integer(&self, name: &str) -> ModelResult<i64> {
        Err(ModelFault::error(format!("no integer {name}")))
    }

    fn get_boolean(&self, name: &str) -> ModelResult<bool> {
        Err(ModelFault::error(format!("no boolean {name}")))
    }

    fn get_string(&self, name: &str) -> ModelResult<String> {
        Err(ModelFault::error(format!("no string {name}")))
    }

    fn do_step(&mut self, current_time: f64, step_size: f64) -> ModelResult<()> {
        self.log.borrow_mut().steps.push((current_time, step_size));
        self.y = self.gain * self.u;
        self.time = current_time + step_size;
        Ok(())
    }
}

/// Template for recorder-backed controllers reading `sig_u` and publishing `y`.
pub fn recorder_template(period: f64, phase_shift: f64, dead_time: f64) -> ControllerTemplate {
    let mut parameters = PortValues::new();
    parameters.insert("gain".to_string(), ScalarValue::Real(2.0));
    ControllerTemplate {
        model_name: "Recorder".to_string(),
        table: RecordingModel::description().variable_table(),
        instance_name: "Recorder1".to_string(),
        timeout: Duration::from_millis(100),
        stop_tick: None,
        initial_input: ScalarValue::Real(0.0),
        parameters,
        entity: EntityConfig {
            input_ports: vec!["sig_u".to_string()],
            output_port: "y".to_string(),
            period,
            phase_shift,
            dead_time,
            time_resolution: 1e-9,
            verbose: false,
        },
    }
}

/// Scheduler with one recorder-backed entity at one second per tick.
pub fn single_recorder(
    period: f64,
    phase_shift: f64,
    dead_time: f64,
) -> (StepScheduler<RecordingModel>, String, Rc<RefCell<CallLog>>) {
    recorder_from(0, period, phase_shift, dead_time)
}

/// Like [`single_recorder`], with model time offset by `start_tick` seconds.
pub fn recorder_from(
    start_tick: u64,
    period: f64,
    phase_shift: f64,
    dead_time: f64,
) -> (StepScheduler<RecordingModel>, String, Rc<RefCell<CallLog>>) {
    let log = Rc::new(RefCell::new(CallLog::default()));
    let mut scheduler = StepScheduler::new(TimeBase::new(1.0, start_tick));
    let model_log = Rc::clone(&log);
    let eids = scheduler
        .create(
            1,
            &recorder_template(period, phase_shift, dead_time),
            move || RecordingModel::new(Rc::clone(&model_log)),
        )
        .expect("recorder entity should be created");
    let eid = eids.into_iter().next().expect("one entity");
    (scheduler, eid, log)
}

/// Inputs delivering `u` on `sig_u` to `eid`.
pub fn deliver(eid: &str, u: f64) -> TickInputs {
    let mut values = PortValues::new();
    values.insert("sig_u".to_string(), ScalarValue::Real(u));
    let mut inputs = TickInputs::new();
    inputs.insert(eid.to_string(), values);
    inputs
}
