use crate::model::ScalarValue;

/// On-load tap-changing transformer that applies controller tap commands.
///
/// Only real values move the tap; "no output" leaves it where it is.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    tap: i64,
    tap_changes: usize,
}

impl Transformer {
    pub fn new(tap: i64) -> Self {
        Self { tap, tap_changes: 0 }
    }

    /// Current tap position.
    pub fn tap(&self) -> i64 {
        self.tap
    }

    /// Number of times the tap position has changed.
    pub fn tap_changes(&self) -> usize {
        self.tap_changes
    }

    /// Applies a controller output and returns `true` if the tap moved.
    ///
    /// Non-numeric values are ignored.
    pub fn apply(&mut self, command: Option<&ScalarValue>) -> bool {
        let Some(target) = command.and_then(ScalarValue::as_f64) else {
            return false;
        };
        let target = target.round() as i64;
        if target == self.tap {
            return false;
        }
        self.tap = target;
        self.tap_changes += 1;
        true
    }
}
