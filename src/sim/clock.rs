/// Outer simulation clock over a fixed range of ticks.
///
/// The clock does not advance on its own: the driver reads the current tick,
/// runs it, and moves the clock to whichever tick the stepped component
/// requested next.
///
/// # Examples
///
/// ```
/// use oltc_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(3);
/// let mut ticks = Vec::new();
///
/// clock.run(|tick| {
///     ticks.push(tick);
///     tick + 1
/// });
/// assert_eq!(ticks, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Tick to run next
    current: u64,
    /// First tick that is no longer run
    end: u64,
}

impl Clock {
    /// Creates a clock running ticks `0..total`.
    pub fn new(total: u64) -> Self {
        Self {
            current: 0,
            end: total,
        }
    }

    /// Returns the tick to run next, or `None` once the clock has finished.
    pub fn now(&self) -> Option<u64> {
        (self.current < self.end).then_some(self.current)
    }

    /// Moves the clock to `next`.
    ///
    /// # Panics
    ///
    /// Panics if `next` does not lie after the current tick.
    pub fn advance_to(&mut self, next: u64) {
        assert!(next > self.current, "clock must move forward");
        self.current = next;
    }

    /// Runs `f` for each tick until the end, letting `f` choose the next tick.
    pub fn run(&mut self, mut f: impl FnMut(u64) -> u64) {
        while let Some(tick) = self.now() {
            let next = f(tick);
            self.advance_to(next);
        }
    }
}
