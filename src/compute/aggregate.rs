//! Area totals and the Jaccard ratio.
//!
//! Sums are commutative, so the order in which cells or records arrive never
//! changes the result beyond floating-point reassociation.

use crate::compute::feature::Feature;
use crate::compute::geometry::{self, Prepared};
use crate::error::{GridJoinError, Result};
use crate::source::FeatureSource;
use gridjoin_types::cell::Role;
use gridjoin_types::record::IntersectionRecord;
use gridjoin_types::stats::AggregateTotals;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Running totals for one join or query.
///
/// Features are counted once per `(role, id)`, so offering a replicated
/// feature from every cell it was assigned to is harmless.
#[derive(Debug, Default)]
pub struct Aggregator {
    area_a: f64,
    area_b: f64,
    intersection_area: f64,
    intersection_count: usize,
    seen_a: FxHashSet<Arc<str>>,
    seen_b: FxHashSet<Arc<str>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a feature toward its collection's total. Returns `false` if it
    /// was already counted.
    pub fn include_feature(&mut self, feature: &Feature) -> bool {
        let (seen, total) = match feature.role() {
            Role::A => (&mut self.seen_a, &mut self.area_a),
            Role::B => (&mut self.seen_b, &mut self.area_b),
        };
        if !seen.insert(feature.shared_id()) {
            return false;
        }
        *total += feature.area();
        true
    }

    /// Add one deduplicated record.
    pub fn add_record(&mut self, record: &IntersectionRecord) {
        self.intersection_area += record.intersection_area;
        self.intersection_count += 1;
    }

    pub fn included(&self, role: Role) -> usize {
        match role {
            Role::A => self.seen_a.len(),
            Role::B => self.seen_b.len(),
        }
    }

    pub fn finish(&self) -> AggregateTotals {
        AggregateTotals::new(
            self.area_a,
            self.area_b,
            self.intersection_area,
            self.intersection_count,
        )
    }
}

/// Fast path: totals from already materialized, deduplicated records and
/// known collection areas. No geometry is touched.
///
/// ```
/// use gridjoin::compute::aggregate::totals_from_records;
/// use gridjoin::IntersectionRecord;
///
/// let records = [IntersectionRecord::new("a", "b", 1.0, 1.0, 0.25)];
/// let totals = totals_from_records(1.0, 1.0, &records);
/// assert!((totals.jaccard - 0.25 / 1.75).abs() < 1e-12);
/// ```
pub fn totals_from_records<'r, I>(area_a: f64, area_b: f64, records: I) -> AggregateTotals
where
    I: IntoIterator<Item = &'r IntersectionRecord>,
{
    let (intersection_area, count) = records
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), record| {
            (sum + record.intersection_area, count + 1)
        });
    AggregateTotals::new(area_a, area_b, intersection_area, count)
}

/// Result of recomputing a collection's area from raw geometry text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaScan {
    pub total_area: f64,
    /// Entries whose geometry was usable (possibly after repair)
    pub parsed: u64,
    pub skipped: u64,
}

/// Slow path: sum feature areas straight from a source, in bounded chunks.
///
/// Memory is bounded by `chunk_size` entries. Degenerate, unparsable and
/// unrepairable entries are counted and skipped.
pub fn scan_collection_area(source: &dyn FeatureSource, chunk_size: usize) -> Result<AreaScan> {
    if chunk_size == 0 {
        return Err(GridJoinError::InvalidConfig(
            "Area chunk size must be greater than zero".to_string(),
        ));
    }

    let mut entries = source.entries()?;
    let mut scan = AreaScan::default();
    let mut chunk = Vec::with_capacity(chunk_size);
    let mut chunks = 0usize;

    loop {
        chunk.clear();
        chunk.extend(entries.by_ref().take(chunk_size));
        if chunk.is_empty() {
            break;
        }
        chunks += 1;

        for entry in &chunk {
            match geometry::prepare(&entry.geometry) {
                Prepared::Valid(geometry) | Prepared::Repaired(geometry) => {
                    scan.total_area += geometry::area(&geometry);
                    scan.parsed += 1;
                }
                Prepared::Unusable(reason) => {
                    log::debug!("Skipping '{}' in {}: {}", entry.id, source.name(), reason);
                    scan.skipped += 1;
                }
            }
        }

        log::debug!(
            "Scanned chunk {} of {}: running area {}",
            chunks,
            source.name(),
            scan.total_area
        );
    }

    log::info!(
        "Area of {}: {} over {} features ({} skipped)",
        source.name(),
        scan.total_area,
        scan.parsed,
        scan.skipped
    );

    Ok(scan)
}
