//! Batch join: partition both collections, join shared cells, then reduce.
//!
//! The run has three phases separated by barriers:
//!
//! 1. **Map**: both collections are parsed and assigned to cells. Workers
//!    share nothing but the read-only configuration.
//! 2. **Join**: every cell present in both partitions is joined on its own.
//!    Cells are independent and may run in any order.
//! 3. **Reduce**: partial records from all cells are made distinct by
//!    `(id_a, id_b)`, and totals are computed from the survivors.
//!
//! Deduplication happens only in phase 3, after every partial result exists,
//! because one pair can be produced by several cells on different workers.

use crate::compute::aggregate::totals_from_records;
use crate::compute::candidates::CandidateStrategy;
use crate::compute::dedup::distinct_records;
use crate::compute::evaluate::IntersectionEvaluator;
use crate::compute::feature::Feature;
use crate::compute::grid::Grid;
use crate::compute::partition::{GridPartitioner, Partition};
use crate::config::JoinConfig;
use crate::error::Result;
use crate::source::FeatureSource;
use gridjoin_types::bbox::BoundingBox2D;
use gridjoin_types::cell::{CellId, Role};
use gridjoin_types::record::IntersectionRecord;
use gridjoin_types::stats::{AggregateTotals, PartitionStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Counters for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub partition_a: PartitionStats,
    pub partition_b: PartitionStats,
    /// Cells present in both partitions
    pub cells_joined: usize,
    pub candidate_pairs: u64,
    /// Records produced by all cells before the distinct reduction
    pub partial_records: usize,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub totals: AggregateTotals,
    /// Distinct records sorted by `(id_a, id_b)`
    pub records: Vec<IntersectionRecord>,
    pub stats: BatchStats,
}

/// Outcome of joining one cell.
struct CellJoin {
    candidates: u64,
    records: Vec<IntersectionRecord>,
}

pub struct BatchJoin {
    config: Arc<JoinConfig>,
    grid: Grid,
}

impl BatchJoin {
    pub fn new(config: JoinConfig) -> Result<Self> {
        config.check()?;
        let grid = Grid::new(config.grid.clone())?;
        Ok(Self {
            config: Arc::new(config),
            grid,
        })
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Join two collections and compute their global similarity.
    ///
    /// Only features whose bounding box intersects `bbox` (when given)
    /// take part, both in pairs and in the area totals.
    pub fn run(
        &self,
        a: &dyn FeatureSource,
        b: &dyn FeatureSource,
        bbox: Option<&BoundingBox2D>,
    ) -> Result<BatchOutput> {
        let partitioner = GridPartitioner::new(&self.grid).with_filter(bbox.copied());

        let entries_a = a.entries()?;
        let entries_b = b.entries()?;

        #[cfg(feature = "parallel")]
        let (partition_a, partition_b) = rayon::join(
            || partitioner.partition(Role::A, entries_a),
            || partitioner.partition(Role::B, entries_b),
        );

        #[cfg(not(feature = "parallel"))]
        let (partition_a, partition_b) = (
            partitioner.partition(Role::A, entries_a),
            partitioner.partition(Role::B, entries_b),
        );

        let shared: Vec<CellId> = partition_a
            .cell_ids()
            .filter(|cell| partition_b.cells().contains_key(cell))
            .collect();

        #[cfg(feature = "parallel")]
        let joined: Vec<CellJoin> = shared
            .par_iter()
            .map(|cell| self.join_cell(partition_a.cell(*cell), partition_b.cell(*cell)))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let joined: Vec<CellJoin> = shared
            .iter()
            .map(|cell| self.join_cell(partition_a.cell(*cell), partition_b.cell(*cell)))
            .collect();

        let candidate_pairs = joined.iter().map(|cell| cell.candidates).sum();
        let partial: Vec<IntersectionRecord> =
            joined.into_iter().flat_map(|cell| cell.records).collect();
        let partial_records = partial.len();

        let (records, duplicates_removed) = distinct_records(partial);
        let totals = totals_from_records(
            partition_a.total_area(),
            partition_b.total_area(),
            &records,
        );

        let stats = BatchStats {
            partition_a: partition_a.stats().clone(),
            partition_b: partition_b.stats().clone(),
            cells_joined: shared.len(),
            candidate_pairs,
            partial_records,
            duplicates_removed,
        };

        log_summary(a, b, &partition_a, &partition_b, &stats, &totals);

        Ok(BatchOutput {
            totals,
            records,
            stats,
        })
    }

    fn join_cell(&self, a_side: &[Arc<Feature>], b_side: &[Arc<Feature>]) -> CellJoin {
        let evaluator = IntersectionEvaluator::new(self.config.negligible_area);
        let strategy =
            CandidateStrategy::select(a_side.len(), b_side.len(), self.config.index_threshold);
        let candidates = strategy.generate(a_side, b_side, self.config.self_pairs);

        CellJoin {
            candidates: candidates.len() as u64,
            records: candidates
                .iter()
                .filter_map(|pair| evaluator.evaluate_pair(pair))
                .collect(),
        }
    }
}

fn log_summary(
    a: &dyn FeatureSource,
    b: &dyn FeatureSource,
    partition_a: &Partition,
    partition_b: &Partition,
    stats: &BatchStats,
    totals: &AggregateTotals,
) {
    log::info!(
        "Joined {} ({} features) with {} ({} features) over {} shared cells: \
        {} candidates, {} partial records, {} duplicates removed",
        a.name(),
        partition_a.len(),
        b.name(),
        partition_b.len(),
        stats.cells_joined,
        stats.candidate_pairs,
        stats.partial_records,
        stats.duplicates_removed
    );
    log::info!(
        "Jaccard {:.10} (intersection {}, union {}, {} distinct pairs)",
        totals.jaccard,
        totals.intersection_area,
        totals.union_area(),
        totals.intersection_count
    );
}
