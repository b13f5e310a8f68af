//! Assigns features to every grid cell their bounding box overlaps.

use crate::compute::feature::{Feature, FeatureOutcome};
use crate::compute::grid::Grid;
use crate::source::RawEntry;
use gridjoin_types::bbox::BoundingBox2D;
use gridjoin_types::cell::{CellId, Role};
use gridjoin_types::stats::PartitionStats;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Cells assigned to one feature. Most features touch at most four.
pub type CellSet = SmallVec<[CellId; 4]>;

/// Features of one collection grouped by cell.
///
/// Each cell group is sorted by feature id, so partitioning the same input
/// twice yields identical groups regardless of input order or thread
/// scheduling.
#[derive(Debug, Clone)]
pub struct Partition {
    role: Role,
    cells: BTreeMap<CellId, Vec<Arc<Feature>>>,
    features: Vec<Arc<Feature>>,
    stats: PartitionStats,
}

impl Partition {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn cells(&self) -> &BTreeMap<CellId, Vec<Arc<Feature>>> {
        &self.cells
    }

    pub fn cell(&self, cell: CellId) -> &[Arc<Feature>] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell_ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells.keys().copied()
    }

    /// Every accepted feature exactly once, sorted by id.
    pub fn features(&self) -> &[Arc<Feature>] {
        &self.features
    }

    pub fn stats(&self) -> &PartitionStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Sum of feature areas, each feature counted once.
    pub fn total_area(&self) -> f64 {
        self.features.iter().map(|feature| feature.area()).sum()
    }

    /// Cell to feature-id layout, for comparing partition runs.
    pub fn assignments(&self) -> BTreeMap<CellId, Vec<&str>> {
        self.cells
            .iter()
            .map(|(cell, features)| (*cell, features.iter().map(|f| f.id()).collect()))
            .collect()
    }
}

/// Streams a collection through the grid.
#[derive(Debug, Clone)]
pub struct GridPartitioner<'g> {
    grid: &'g Grid,
    filter: Option<BoundingBox2D>,
}

impl<'g> GridPartitioner<'g> {
    pub fn new(grid: &'g Grid) -> Self {
        Self { grid, filter: None }
    }

    /// Keep only features whose bounding box intersects `bbox`.
    pub fn with_filter(mut self, bbox: Option<BoundingBox2D>) -> Self {
        self.filter = bbox;
        self
    }

    pub fn grid(&self) -> &Grid {
        self.grid
    }

    /// Parse and measure one raw entry.
    pub fn prepare(&self, entry: &RawEntry, role: Role) -> FeatureOutcome {
        let outcome = Feature::from_text(&entry.id, &entry.geometry, role);
        if let FeatureOutcome::Skipped(reason) = &outcome {
            log::debug!("Skipping {} feature '{}': {}", role, entry.id, reason);
        }
        outcome
    }

    /// Every cell the feature's bounding box overlaps.
    pub fn cells_of(&self, feature: &Feature) -> CellSet {
        self.grid.cells_for(feature.bbox()).collect()
    }

    /// One `(cell, feature)` emission per covered cell.
    pub fn emit(
        &self,
        feature: &Arc<Feature>,
    ) -> impl Iterator<Item = (CellId, Arc<Feature>)> + use<> {
        let feature = Arc::clone(feature);
        self.grid
            .cells_for(feature.bbox())
            .map(move |cell| (cell, Arc::clone(&feature)))
    }

    pub fn admits(&self, feature: &Feature) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|bbox| bbox.intersects(feature.bbox()))
    }

    /// Partition a whole collection in memory.
    ///
    /// Entries are prepared in parallel when the `parallel` feature is on;
    /// the resulting partition does not depend on it.
    pub fn partition<I>(&self, role: Role, entries: I) -> Partition
    where
        I: Iterator<Item = RawEntry> + Send,
    {
        #[cfg(feature = "parallel")]
        let outcomes: Vec<FeatureOutcome> = entries
            .par_bridge()
            .map(|entry| self.prepare(&entry, role))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<FeatureOutcome> = entries
            .map(|entry| self.prepare(&entry, role))
            .collect();

        let mut stats = PartitionStats::new();
        let mut features = Vec::with_capacity(outcomes.len());

        for outcome in outcomes {
            stats.read += 1;
            let feature = match outcome {
                FeatureOutcome::Ready(feature) => feature,
                FeatureOutcome::Repaired(feature) => {
                    stats.repaired += 1;
                    feature
                }
                FeatureOutcome::Skipped(_) => {
                    stats.skipped += 1;
                    continue;
                }
            };

            if !self.admits(&feature) {
                stats.filtered += 1;
                continue;
            }

            stats.accepted += 1;
            features.push(Arc::new(feature));
        }

        features.sort_by(|a, b| a.id().cmp(b.id()));

        let mut cells: BTreeMap<CellId, Vec<Arc<Feature>>> = BTreeMap::new();
        for feature in &features {
            for (cell, shared) in self.emit(feature) {
                stats.emissions += 1;
                cells.entry(cell).or_default().push(shared);
            }
        }

        log::info!(
            "Partitioned collection {}: {} read, {} accepted ({} repaired), {} skipped, {} filtered, \
            {} cell assignments across {} cells (replication {:.2})",
            role,
            stats.read,
            stats.accepted,
            stats.repaired,
            stats.skipped,
            stats.filtered,
            stats.emissions,
            cells.len(),
            stats.replication_factor()
        );

        Partition {
            role,
            cells,
            features,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;

    fn grid(n: u32) -> Grid {
        Grid::new(GridConfig::new(BoundingBox2D::new(0.0, 0.0, 10.0, 10.0), n)).unwrap()
    }

    fn square(id: &str, x: f64, y: f64, size: f64) -> RawEntry {
        RawEntry::new(
            id,
            format!(
                "POLYGON(({x} {y}, {x2} {y}, {x2} {y2}, {x} {y2}, {x} {y}))",
                x = x,
                y = y,
                x2 = x + size,
                y2 = y + size
            ),
        )
    }

    #[test]
    fn test_single_cell_feature_is_not_replicated() {
        let g = grid(10);
        let partition = GridPartitioner::new(&g).partition(
            Role::A,
            vec![square("a", 1.2, 1.2, 0.5)].into_iter(),
        );
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.stats().emissions, 1);
        assert_eq!(partition.cell(CellId::new(1, 1)).len(), 1);
    }

    #[test]
    fn test_straddling_feature_is_replicated() {
        let g = grid(10);
        let partition = GridPartitioner::new(&g).partition(
            Role::A,
            vec![square("big", 0.5, 0.5, 1.0)].into_iter(),
        );
        assert_eq!(partition.stats().emissions, 4);
        assert_eq!(partition.cells().len(), 4);
        assert_eq!(partition.len(), 1);
        assert!((partition.total_area() - 1.0).abs() < 1e-12);
        for cell in partition.cell_ids() {
            assert!(Arc::ptr_eq(&partition.cell(cell)[0], &partition.features()[0]));
        }
    }

    #[test]
    fn test_skips_and_counts_bad_entries() {
        let g = grid(4);
        let entries = vec![
            square("ok", 1.0, 1.0, 1.0),
            RawEntry::new("empty", ""),
            RawEntry::new("garbage", "POLYGON((1 2, 3"),
            RawEntry::new("line", "LINESTRING(0 0, 5 5, 6 6)"),
        ];
        let partition = GridPartitioner::new(&g).partition(Role::B, entries.into_iter());
        let stats = partition.stats();
        assert_eq!(stats.read, 4);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.skipped, 3);
    }

    #[test]
    fn test_filter_excludes_features() {
        let g = grid(4);
        let entries = vec![square("near", 1.0, 1.0, 1.0), square("far", 8.0, 8.0, 1.0)];
        let partition = GridPartitioner::new(&g)
            .with_filter(Some(BoundingBox2D::new(0.0, 0.0, 3.0, 3.0)))
            .partition(Role::A, entries.into_iter());
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.features()[0].id(), "near");
        assert_eq!(partition.stats().filtered, 1);
    }

    #[test]
    fn test_partition_is_order_independent() {
        let g = grid(6);
        let entries: Vec<_> = (0..40)
            .map(|i| square(&format!("f{i}"), (i % 8) as f64 * 1.1, (i / 8) as f64 * 1.7, 1.3))
            .collect();
        let mut reversed = entries.clone();
        reversed.reverse();

        let partitioner = GridPartitioner::new(&g);
        let first = partitioner.partition(Role::A, entries.into_iter());
        let second = partitioner.partition(Role::A, reversed.into_iter());
        assert_eq!(first.assignments(), second.assignments());
        assert_eq!(first.stats(), second.stats());
    }
}
