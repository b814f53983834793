//! Result export.

/// CSV export of per-tick records.
pub mod export;
