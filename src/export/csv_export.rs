//! CSV export functionality

use std::path::Path;

use csv::Writer;

use super::{ExportError, HistoryRow};

/// Write history rows to CSV with a `date,phrase,count` header
pub fn write_history_csv(rows: &[HistoryRow], path: &Path) -> Result<(), ExportError> {
    let mut writer = Writer::from_path(path)?;

    if rows.is_empty() {
        // serialize() emits the header with the first record only
        writer.write_record(["date", "phrase", "count"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    Ok(())
}
