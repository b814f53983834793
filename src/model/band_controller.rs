use std::time::Duration;

use super::description::{DeclaredCausality, ModelDescription, VariableSpec};
use super::{ModelFault, ModelResult, ScalarType, SteppedModel};

/// Number of line-voltage inputs the controller accepts.
pub const LINE_INPUTS: usize = 7;

/// Tolerance when matching a requested step start against the model clock.
const TIME_RESOLUTION: f64 = 1e-9;

/// Native coordinated voltage-band controller for an on-load tap changer.
///
/// Reads up to seven line voltages (p.u.) and moves the tap one position at a
/// time: up when some voltage is below `vlow` and none is above `vup`, down in
/// the mirrored case, otherwise it holds. The tap is clamped to
/// `[tap_min, tap_max]`.
///
/// The tap is recomputed on the first step after any input or parameter
/// write, so repeated steps without new inputs leave the output unchanged.
#[derive(Debug, Clone)]
pub struct BandTapController {
    instance_name: Option<String>,
    time: Option<f64>,
    stop_time: Option<f64>,
    u_line: [f64; LINE_INPUTS],
    vlow: f64,
    vup: f64,
    tap_min: i64,
    tap_max: i64,
    tap: i64,
    dirty: bool,
}

impl Default for BandTapController {
    fn default() -> Self {
        Self::new()
    }
}

impl BandTapController {
    pub const MODEL_NAME: &'static str = "BandTapController";

    pub fn new() -> Self {
        Self {
            instance_name: None,
            time: None,
            stop_time: None,
            u_line: [1.0; LINE_INPUTS],
            vlow: 0.95,
            vup: 1.05,
            tap_min: -16,
            tap_max: 16,
            tap: 0,
            dirty: false,
        }
    }

    /// Self-description of this model's variables.
    pub fn description() -> ModelDescription {
        let mut variables: Vec<VariableSpec> = (1..=LINE_INPUTS)
            .map(|i| {
                VariableSpec::new(
                    &format!("u_line{i}"),
                    DeclaredCausality::Input,
                    ScalarType::Real,
                )
            })
            .collect();
        variables.push(VariableSpec::new("vlow", DeclaredCausality::Parameter, ScalarType::Real));
        variables.push(VariableSpec::new("vup", DeclaredCausality::Parameter, ScalarType::Real));
        variables.push(VariableSpec::new(
            "tap_min",
            DeclaredCausality::Parameter,
            ScalarType::Integer,
        ));
        variables.push(VariableSpec::new(
            "tap_max",
            DeclaredCausality::Parameter,
            ScalarType::Integer,
        ));
        variables.push(VariableSpec::new("tap", DeclaredCausality::Output, ScalarType::Integer));

        ModelDescription {
            model_name: Self::MODEL_NAME.to_string(),
            variables,
        }
    }

    /// Current model clock, once initialized.
    pub fn time(&self) -> Option<f64> {
        self.time
    }

    pub fn instance_name(&self) -> Option<&str> {
        self.instance_name.as_deref()
    }

    fn line_index(name: &str) -> Option<usize> {
        let n: usize = name.strip_prefix("u_line")?.parse().ok()?;
        (1..=LINE_INPUTS).contains(&n).then(|| n - 1)
    }

    fn recompute_tap(&mut self) {
        let low = self.u_line.iter().any(|&u| u < self.vlow);
        let high = self.u_line.iter().any(|&u| u > self.vup);
        let next = match (low, high) {
            (true, false) => self.tap + 1,
            (false, true) => self.tap - 1,
            _ => self.tap,
        };
        self.tap = next.clamp(self.tap_min, self.tap_max.max(self.tap_min));
    }

    fn unknown(name: &str, kind: ScalarType) -> ModelFault {
        ModelFault::error(format!("no {kind} variable named `{name}`"))
    }
}

impl SteppedModel for BandTapController {
    fn instantiate(&mut self, instance_name: &str, _timeout: Duration) -> ModelResult<()> {
        if instance_name.is_empty() {
            return Err(ModelFault::error("instance name must not be empty"));
        }
        self.instance_name = Some(instance_name.to_string());
        Ok(())
    }

    fn initialize(&mut self, start_time: f64, stop_time: Option<f64>) -> ModelResult<()> {
        if self.instance_name.is_none() {
            return Err(ModelFault::error("initialize called before instantiate"));
        }
        if let Some(stop) = stop_time {
            if stop < start_time {
                return Err(ModelFault::error(format!(
                    "stop time {stop} precedes start time {start_time}"
                )));
            }
        }
        self.time = Some(start_time);
        self.stop_time = stop_time;
        Ok(())
    }

    fn set_real(&mut self, name: &str, value: f64) -> ModelResult<()> {
        match name {
            "vlow" => self.vlow = value,
            "vup" => self.vup = value,
            _ => {
                let i = Self::line_index(name).ok_or_else(|| Self::unknown(name, ScalarType::Real))?;
                self.u_line[i] = value;
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn set_integer(&mut self, name: &str, value: i64) -> ModelResult<()> {
        match name {
            "tap_min" => self.tap_min = value,
            "tap_max" => self.tap_max = value,
            _ => return Err(Self::unknown(name, ScalarType::Integer)),
        }
        self.dirty = true;
        Ok(())
    }

    fn set_boolean(&mut self, name: &str, _value: bool) -> ModelResult<()> {
        Err(Self::unknown(name, ScalarType::Boolean))
    }

    fn set_string(&mut self, name: &str, _value: &str) -> ModelResult<()> {
        Err(Self::unknown(name, ScalarType::String))
    }

    fn get_real(&self, name: &str) -> ModelResult<f64> {
        match name {
            "vlow" => Ok(self.vlow),
            "vup" => Ok(self.vup),
            _ => Self::line_index(name)
                .map(|i| self.u_line[i])
                .ok_or_else(|| Self::unknown(name, ScalarType::Real)),
        }
    }

    fn get_integer(&self, name: &str) -> ModelResult<i64> {
        match name {
            "tap" => Ok(self.tap),
            "tap_min" => Ok(self.tap_min),
            "tap_max" => Ok(self.tap_max),
            _ => Err(Self::unknown(name, ScalarType::Integer)),
        }
    }

    fn get_boolean(&self, name: &str) -> ModelResult<bool> {
        Err(Self::unknown(name, ScalarType::Boolean))
    }

    fn get_string(&self, name: &str) -> ModelResult<String> {
        Err(Self::unknown(name, ScalarType::String))
    }

    fn do_step(&mut self, current_time: f64, step_size: f64) -> ModelResult<()> {
        let time = self
            .time
            .ok_or_else(|| ModelFault::error("do_step called before initialize"))?;
        if (current_time - time).abs() > TIME_RESOLUTION {
            return Err(ModelFault::error(format!(
                "step starts at {current_time} but model clock is at {time}"
            )));
        }
        if step_size < 0.0 || !step_size.is_finite() {
            return Err(ModelFault::error(format!("invalid step size {step_size}")));
        }
        let target = current_time + step_size;
        if let Some(stop) = self.stop_time {
            if target > stop + TIME_RESOLUTION {
                return Err(ModelFault::error(format!(
                    "step to {target} passes stop time {stop}"
                )));
            }
        }

        if self.dirty {
            self.recompute_tap();
            self.dirty = false;
        }
        self.time = Some(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> BandTapController {
        let mut model = BandTapController::new();
        model
            .instantiate("Controller1", Duration::ZERO)
            .expect("instantiate");
        model.initialize(0.0, None).expect("initialize");
        model
    }

    #[test]
    fn raises_tap_on_undervoltage() {
        let mut model = started();
        model.set_real("u_line3", 0.93).expect("set");
        model.do_step(0.0, 0.0).expect("step");
        assert_eq!(model.get_integer("tap"), Ok(1));
    }

    #[test]
    fn lowers_tap_on_overvoltage() {
        let mut model = started();
        model.set_real("u_line7", 1.06).expect("set");
        model.do_step(0.0, 1.0).expect("step");
        assert_eq!(model.get_integer("tap"), Ok(-1));
        assert_eq!(model.time(), Some(1.0));
    }

    #[test]
    fn holds_when_both_limits_violated() {
        let mut model = started();
        model.set_real("u_line1", 0.90).expect("set");
        model.set_real("u_line2", 1.10).expect("set");
        model.do_step(0.0, 0.0).expect("step");
        assert_eq!(model.get_integer("tap"), Ok(0));
    }

    #[test]
    fn repeated_steps_without_new_inputs_do_not_move_tap() {
        let mut model = started();
        model.set_real("u_line1", 0.90).expect("set");
        model.do_step(0.0, 1.0).expect("step");
        model.do_step(1.0, 1.0).expect("step");
        model.do_step(2.0, 0.0).expect("step");
        assert_eq!(model.get_integer("tap"), Ok(1));
    }

    #[test]
    fn tap_is_clamped_to_limits() {
        let mut model = started();
        model.set_integer("tap_max", 1).expect("set");
        for t in 0..3 {
            model.set_real("u_line1", 0.9).expect("set");
            model.do_step(t as f64, 1.0).expect("step");
        }
        assert_eq!(model.get_integer("tap"), Ok(1));
    }

    #[test]
    fn rejects_step_from_wrong_time() {
        let mut model = started();
        let err = model.do_step(5.0, 1.0).unwrap_err();
        assert!(err.message.contains("model clock"));
    }

    #[test]
    fn rejects_negative_step_and_uninitialized_step() {
        let mut model = started();
        assert!(model.do_step(0.0, -1.0).is_err());

        let mut fresh = BandTapController::new();
        assert!(fresh.do_step(0.0, 1.0).is_err());
        assert!(fresh.initialize(0.0, None).is_err());
    }

    #[test]
    fn unknown_variables_are_rejected() {
        let mut model = started();
        assert!(model.set_real("u_line8", 1.0).is_err());
        assert!(model.set_boolean("vlow", true).is_err());
        assert!(model.get_integer("vlow").is_err());
    }

    #[test]
    fn description_lists_all_ports() {
        let desc = BandTapController::description();
        assert_eq!(desc.variables.len(), LINE_INPUTS + 5);
        assert_eq!(desc.model_name, BandTapController::MODEL_NAME);
    }
}
