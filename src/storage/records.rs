//! Intersection record files, one JSON object per line.

use crate::error::Result;
use gridjoin_types::record::IntersectionRecord;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub fn write_records<P: AsRef<Path>>(path: P, records: &[IntersectionRecord]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read records back. Malformed lines are skipped with a debug log.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<IntersectionRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<IntersectionRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => log::debug!("Skipping line {} of {}: {}", number + 1, path.display(), e),
        }
    }

    Ok(records)
}

#[derive(Deserialize)]
struct IntersectionColumn {
    intersection_area: f64,
}

/// Sum of the intersection-area column, plus the number of rows summed.
///
/// Only that one field is decoded per line.
pub fn sum_intersection_area<P: AsRef<Path>>(path: P) -> Result<(f64, usize)> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut sum = 0.0;
    let mut count = 0;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(column) = serde_json::from_str::<IntersectionColumn>(&line) {
            sum += column.intersection_area;
            count += 1;
        }
    }

    log::debug!("Summed {} intersection records from {}", count, path.display());
    Ok((sum, count))
}
