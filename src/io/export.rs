//! CSV export for per-tick controller records.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::TickRecord;

/// Column header for CSV telemetry export.
const HEADER: &str = "tick,time_s,entity,state,v_min_pu,v_max_pu,\
                       sampled,pending_messages,tap_output,applied_tap";

/// Exports tick records to a CSV file at the given path.
///
/// Writes a header row followed by one row per entity per tick. A tick
/// without controller output leaves `tap_output` empty.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(records: &[TickRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(records, buf)
}

/// Writes tick records as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(records: &[TickRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in records {
        wtr.write_record(&[
            r.tick.to_string(),
            format!("{:.3}", r.time_s),
            r.eid.clone(),
            r.state.to_string(),
            format!("{:.6}", r.v_min_pu),
            format!("{:.6}", r.v_max_pu),
            r.sampled.to_string(),
            r.pending_messages.to_string(),
            r.tap_output.map(|t| t.to_string()).unwrap_or_default(),
            r.applied_tap.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
