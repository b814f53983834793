/// Outer simulation clock.
pub mod clock;
/// Delayed delivery of readings over a simulated link.
pub mod comm;
/// Per-device controller with dead-time state machine.
pub mod entity;
pub mod scheduler;
/// Periodic line-voltage sensors.
pub mod sensor;
pub mod transformer;
pub mod types;
