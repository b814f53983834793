//! Core simulation types: time base, per-tick port values, and tick records.

use std::collections::BTreeMap;
use std::fmt;

use crate::model::ScalarValue;

/// Values delivered to or requested from one entity, keyed by port alias.
pub type PortValues = BTreeMap<String, ScalarValue>;

/// Per-tick deliveries for all entities, keyed by entity id.
///
/// An entity or port without an entry received no new sample this tick.
pub type TickInputs = BTreeMap<String, PortValues>;

/// Visible outputs of one entity: `None` means "no output", which callers
/// must treat as "leave downstream state unchanged", never as zero.
pub type OutputValues = BTreeMap<String, Option<ScalarValue>>;

/// Maps outer simulation ticks to model time.
///
/// # Examples
///
/// ```
/// use oltc_sim::sim::types::TimeBase;
///
/// let tb = TimeBase::new(0.1, 0);
/// assert_eq!(tb.model_time(600), 60.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBase {
    /// Model seconds per outer tick.
    pub seconds_per_tick: f64,
    /// Offset, in ticks, of model time relative to the outer clock.
    pub start_tick: u64,
}

impl TimeBase {
    /// Creates a time base.
    ///
    /// # Panics
    ///
    /// Panics if `seconds_per_tick` is not a positive finite number.
    pub fn new(seconds_per_tick: f64, start_tick: u64) -> Self {
        assert!(
            seconds_per_tick > 0.0 && seconds_per_tick.is_finite(),
            "seconds_per_tick must be > 0"
        );
        Self {
            seconds_per_tick,
            start_tick,
        }
    }

    /// Model time of the outer tick `tick`.
    pub fn model_time(&self, tick: u64) -> f64 {
        (tick + self.start_tick) as f64 * self.seconds_per_tick
    }

    /// Model time at which model instances start.
    pub fn start_time(&self) -> f64 {
        self.model_time(0)
    }
}

/// Record of one entity at one tick of a scenario run.
#[derive(Debug, Clone)]
pub struct TickRecord {
    pub tick: u64,
    /// Model time in seconds.
    pub time_s: f64,
    pub eid: String,
    /// `responsive` or `dead_time` after the tick.
    pub state: &'static str,
    /// Lowest line voltage seen at the transformer this tick (p.u.).
    pub v_min_pu: f64,
    /// Highest line voltage seen at the transformer this tick (p.u.).
    pub v_max_pu: f64,
    /// Whether any reading reached the controller this tick.
    pub sampled: bool,
    /// Readings still in flight on the communication link after the tick.
    pub pending_messages: usize,
    /// Tap position the controller published, if any.
    pub tap_output: Option<i64>,
    /// Tap position applied at the transformer after the tick.
    pub applied_tap: i64,
}

impl fmt::Display for TickRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output = self
            .tap_output
            .map_or_else(|| "-".to_string(), |tap| tap.to_string());
        write!(
            f,
            "t={:>6} ({:>8.1}s) | {} {:<10} | v=[{:.4}, {:.4}] pu{} | q={} | out={:>3} tap={:>3}",
            self.tick,
            self.time_s,
            self.eid,
            self.state,
            self.v_min_pu,
            self.v_max_pu,
            if self.sampled { " *" } else { "  " },
            self.pending_messages,
            output,
            self.applied_tap,
        )
    }
}
