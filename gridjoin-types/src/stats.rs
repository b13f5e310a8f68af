use serde::{Deserialize, Serialize};

/// Aggregate areas and similarity for one join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateTotals {
    /// Sum of areas over included A-features
    pub area_a: f64,
    /// Sum of areas over included B-features
    pub area_b: f64,
    /// Sum of intersection areas over deduplicated records
    pub intersection_area: f64,
    /// Number of deduplicated records
    pub intersection_count: usize,
    /// `intersection_area / union_area`, or 0 when the union is not positive
    pub jaccard: f64,
}

impl AggregateTotals {
    pub fn new(area_a: f64, area_b: f64, intersection_area: f64, intersection_count: usize) -> Self {
        let union = area_a + area_b - intersection_area;
        let jaccard = if union > 0.0 {
            intersection_area / union
        } else {
            0.0
        };
        Self {
            area_a,
            area_b,
            intersection_area,
            intersection_count,
            jaccard,
        }
    }

    pub fn union_area(&self) -> f64 {
        self.area_a + self.area_b - self.intersection_area
    }
}

/// Counters for one partitioning run over a feature collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    /// Raw entries read from the source
    pub read: u64,
    /// Entries that became features
    pub accepted: u64,
    /// Accepted features that needed a validity repair
    pub repaired: u64,
    /// Entries skipped as degenerate, unparsable or unrepairable
    pub skipped: u64,
    /// Valid features left out by a bounding-box filter
    pub filtered: u64,
    /// `(cell, feature)` pairs emitted
    pub emissions: u64,
}

impl PartitionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average number of cells each accepted feature was assigned to.
    pub fn replication_factor(&self) -> f64 {
        if self.accepted == 0 {
            0.0
        } else {
            self.emissions as f64 / self.accepted as f64
        }
    }
}
