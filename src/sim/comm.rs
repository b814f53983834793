//! Delayed delivery of sensor readings over a simulated communication link.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::types::PortValues;
use crate::model::ScalarValue;

/// A reading in flight, ordered by arrival tick and then by send order.
#[derive(Debug, Clone)]
struct Message {
    port: String,
    value: ScalarValue,
}

/// Point-to-point link that delivers each message a fixed number of ticks
/// after it was sent, plus a seeded random jitter.
///
/// Messages arriving on the same tick are delivered in send order, so a
/// later reading of a port overwrites an earlier one.
///
/// # Examples
///
/// ```
/// use oltc_sim::model::ScalarValue;
/// use oltc_sim::sim::comm::CommChannel;
///
/// let mut link = CommChannel::new(2, 0, 1);
/// link.send(0, "u_line1", ScalarValue::Real(0.98));
/// assert!(link.deliver(1).is_empty());
/// assert_eq!(link.pending(), 1);
/// assert_eq!(link.deliver(2)["u_line1"], ScalarValue::Real(0.98));
/// ```
#[derive(Debug, Clone)]
pub struct CommChannel {
    latency_ticks: u64,
    jitter_ticks: u64,
    rng: StdRng,
    in_flight: BTreeMap<(u64, u64), Message>,
    sent: u64,
}

impl CommChannel {
    /// Creates an empty link.
    pub fn new(latency_ticks: u64, jitter_ticks: u64, seed: u64) -> Self {
        Self {
            latency_ticks,
            jitter_ticks,
            rng: StdRng::seed_from_u64(seed),
            in_flight: BTreeMap::new(),
            sent: 0,
        }
    }

    /// Queues `value` for `port`, sent at `tick`.
    pub fn send(&mut self, tick: u64, port: &str, value: ScalarValue) {
        let jitter = if self.jitter_ticks > 0 {
            self.rng.random_range(0..=self.jitter_ticks)
        } else {
            0
        };
        let arrival = tick + self.latency_ticks + jitter;
        self.in_flight.insert(
            (arrival, self.sent),
            Message {
                port: port.to_string(),
                value,
            },
        );
        self.sent += 1;
    }

    /// Removes and returns every message that has arrived by `tick`.
    pub fn deliver(&mut self, tick: u64) -> PortValues {
        let later = self.in_flight.split_off(&(tick + 1, 0));
        let arrived = std::mem::replace(&mut self.in_flight, later);
        arrived
            .into_values()
            .map(|msg| (msg.port, msg.value))
            .collect()
    }

    /// Messages sent but not yet delivered.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}
