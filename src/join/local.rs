//! Local engine: materialize collections once, query them many times.
//!
//! A collection is partitioned into a [`PartitionStore`] keyed by cell.
//! Queries then load only the cells they need, join the cells shared by both
//! collections through the candidate strategy, and deduplicate pairs with a
//! key set that lives for exactly one query.
//!
//! Queries only read the store and may run concurrently. Rebuilding a
//! collection clears it first, so callers must not query a collection while
//! it is being materialized.

use crate::compute::aggregate::Aggregator;
use crate::compute::candidates::CandidateStrategy;
use crate::compute::dedup::PairDeduplicator;
use crate::compute::evaluate::IntersectionEvaluator;
use crate::compute::feature::{Feature, FeatureOutcome};
use crate::compute::geojson::feature_collection;
use crate::compute::grid::Grid;
use crate::compute::partition::GridPartitioner;
use crate::config::JoinConfig;
use crate::error::{GridJoinError, Result};
use crate::source::FeatureSource;
use crate::storage::{PartitionStore, StoredFeature};
use geojson::FeatureCollection;
use gridjoin_types::bbox::BoundingBox2D;
use gridjoin_types::cell::{CellId, Role};
use gridjoin_types::record::IntersectionRecord;
use gridjoin_types::stats::{AggregateTotals, PartitionStats};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Parameters of one similarity query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Only features whose bounding box intersects this box take part
    pub bbox: Option<BoundingBox2D>,
    /// Explicit cell subset; all cells when absent
    pub cells: Option<Vec<CellId>>,
    /// Return the distinct records along with the totals
    pub include_records: bool,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bbox(mut self, bbox: BoundingBox2D) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_cells(mut self, cells: impl IntoIterator<Item = CellId>) -> Self {
        self.cells = Some(cells.into_iter().collect());
        self
    }

    pub fn with_records(mut self) -> Self {
        self.include_records = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub totals: AggregateTotals,
    /// Distinct records, in discovery order, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<IntersectionRecord>>,
    /// Cells shared by both collections that were joined
    pub cells_scanned: usize,
    pub candidate_pairs: u64,
    /// Candidates dropped because another cell already resolved the pair
    pub duplicate_pairs: u64,
    /// Stored entries that could no longer be prepared
    pub skipped_features: u64,
}

/// Per-query cache of prepared features, so a feature replicated into
/// several cells is parsed once.
#[derive(Default)]
struct FeatureCache {
    prepared: FxHashMap<String, Option<Arc<Feature>>>,
    skipped: u64,
}

impl FeatureCache {
    fn resolve(&mut self, stored: StoredFeature, role: Role) -> Option<Arc<Feature>> {
        if let Some(cached) = self.prepared.get(&stored.id) {
            return cached.clone();
        }

        let feature = match Feature::from_text(&stored.id, &stored.geometry, role) {
            FeatureOutcome::Ready(feature) | FeatureOutcome::Repaired(feature) => {
                Some(Arc::new(feature))
            }
            FeatureOutcome::Skipped(reason) => {
                log::debug!("Stored {} feature '{}' unusable: {}", role, stored.id, reason);
                self.skipped += 1;
                None
            }
        };
        self.prepared.insert(stored.id, feature.clone());
        feature
    }
}

pub struct LocalEngine {
    store: Box<dyn PartitionStore>,
    config: Arc<JoinConfig>,
    grid: Grid,
}

impl LocalEngine {
    pub fn new(store: Box<dyn PartitionStore>, config: JoinConfig) -> Result<Self> {
        config.check()?;
        let grid = Grid::new(config.grid.clone())?;
        Ok(Self {
            store,
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

    pub fn store(&self) -> &dyn PartitionStore {
        self.store.as_ref()
    }

    pub fn collections(&self) -> Result<Vec<String>> {
        self.store.collections()
    }

    /// Cells holding features of `collection`.
    pub fn cells(&self, collection: &str) -> Result<BTreeSet<CellId>> {
        self.check_collection(collection)?;
        self.store.cells(collection)
    }

    /// Partition a collection into the store, replacing any previous
    /// contents under the same name.
    ///
    /// Features are buffered up to `partition_buffer` and flushed grouped by
    /// cell.
    pub fn materialize(&self, collection: &str, source: &dyn FeatureSource) -> Result<PartitionStats> {
        self.store.init(collection, self.grid.config())?;

        let partitioner = GridPartitioner::new(&self.grid);
        let mut stats = PartitionStats::new();
        let mut buffer: BTreeMap<CellId, Vec<StoredFeature>> = BTreeMap::new();
        let mut buffered = 0usize;

        for entry in source.entries()? {
            stats.read += 1;

            let feature = match Feature::from_text(&entry.id, &entry.geometry, Role::A) {
                FeatureOutcome::Ready(feature) => feature,
                FeatureOutcome::Repaired(feature) => {
                    stats.repaired += 1;
                    feature
                }
                FeatureOutcome::Skipped(reason) => {
                    log::debug!("Skipping '{}' of '{}': {}", entry.id, collection, reason);
                    stats.skipped += 1;
                    continue;
                }
            };
            stats.accepted += 1;

            let stored = StoredFeature::new(entry.id, entry.geometry);
            for cell in partitioner.cells_of(&feature) {
                stats.emissions += 1;
                buffer.entry(cell).or_default().push(stored.clone());
            }

            buffered += 1;
            if buffered >= self.config.partition_buffer {
                self.flush(collection, &mut buffer)?;
                buffered = 0;
            }
        }
        self.flush(collection, &mut buffer)?;

        log::info!(
            "Materialized '{}' from {}: {} read, {} accepted ({} repaired), {} skipped, \
            {} cell assignments (replication {:.2})",
            collection,
            source.name(),
            stats.read,
            stats.accepted,
            stats.repaired,
            stats.skipped,
            stats.emissions,
            stats.replication_factor()
        );

        Ok(stats)
    }

    fn flush(
        &self,
        collection: &str,
        buffer: &mut BTreeMap<CellId, Vec<StoredFeature>>,
    ) -> Result<()> {
        for (cell, features) in std::mem::take(buffer) {
            self.store.append(collection, cell, &features)?;
        }
        Ok(())
    }

    /// Global similarity of two materialized collections.
    ///
    /// Totals include every feature of each collection that passes the bbox
    /// filter (within the explicit cell subset, when one is given), each
    /// counted once. Pairs are evaluated only in cells present in both
    /// collections.
    pub fn query(&self, a: &str, b: &str, params: &QueryParams) -> Result<QueryOutcome> {
        self.check_collection(a)?;
        self.check_collection(b)?;

        let subset: Option<BTreeSet<CellId>> =
            params.cells.as_ref().map(|cells| cells.iter().copied().collect());
        let restrict = |cells: BTreeSet<CellId>| match &subset {
            Some(subset) => cells.intersection(subset).copied().collect::<BTreeSet<_>>(),
            None => cells,
        };
        let cells_a: BTreeSet<CellId> = restrict(self.store.cells(a)?);
        let cells_b: BTreeSet<CellId> = restrict(self.store.cells(b)?);

        let admits = |feature: &Feature| {
            params
                .bbox
                .as_ref()
                .is_none_or(|bbox| bbox.intersects(feature.bbox()))
        };

        let mut cache_a = FeatureCache::default();
        let mut cache_b = FeatureCache::default();
        let mut aggregator = Aggregator::new();
        let mut dedup = PairDeduplicator::new();
        let evaluator = IntersectionEvaluator::new(self.config.negligible_area);
        let mut records = params.include_records.then(Vec::new);
        let mut candidate_pairs = 0u64;
        let mut cells_scanned = 0usize;

        for &cell in &cells_a {
            let a_side = self.load_cell(a, cell, Role::A, &mut cache_a, &admits)?;
            for feature in &a_side {
                aggregator.include_feature(feature);
            }

            if !cells_b.contains(&cell) {
                continue;
            }
            cells_scanned += 1;

            let b_side = self.load_cell(b, cell, Role::B, &mut cache_b, &admits)?;
            for feature in &b_side {
                aggregator.include_feature(feature);
            }

            let strategy =
                CandidateStrategy::select(a_side.len(), b_side.len(), self.config.index_threshold);
            for pair in strategy.generate(&a_side, &b_side, self.config.self_pairs) {
                candidate_pairs += 1;
                if !dedup.first_sighting(&pair.a.shared_id(), &pair.b.shared_id()) {
                    continue;
                }
                if let Some(record) = evaluator.evaluate_pair(&pair) {
                    aggregator.add_record(&record);
                    if let Some(records) = records.as_mut() {
                        records.push(record);
                    }
                }
            }
        }

        // B-only cells still count toward B's total
        for &cell in cells_b.difference(&cells_a) {
            for feature in self.load_cell(b, cell, Role::B, &mut cache_b, &admits)? {
                aggregator.include_feature(&feature);
            }
        }

        let totals = aggregator.finish();
        log::info!(
            "Query {} x {}: {} shared cells, {} candidates, {} duplicates, jaccard {:.10}",
            a,
            b,
            cells_scanned,
            candidate_pairs,
            dedup.duplicates(),
            totals.jaccard
        );

        Ok(QueryOutcome {
            totals,
            records,
            cells_scanned,
            candidate_pairs,
            duplicate_pairs: dedup.duplicates(),
            skipped_features: cache_a.skipped + cache_b.skipped,
        })
    }

    /// Features of one collection intersecting `bbox`, as GeoJSON.
    ///
    /// Cells are scanned in order (the explicit subset, or all cells) and a
    /// replicated feature is emitted once. Scanning stops after `limit`
    /// features.
    pub fn region_polygons(
        &self,
        collection: &str,
        bbox: &BoundingBox2D,
        limit: usize,
        cells: Option<&[CellId]>,
    ) -> Result<FeatureCollection> {
        self.check_collection(collection)?;

        let mut scan: BTreeSet<CellId> = self.store.cells(collection)?;
        if let Some(subset) = cells {
            let subset: BTreeSet<CellId> = subset.iter().copied().collect();
            scan.retain(|cell| subset.contains(cell));
        }

        let mut seen = FxHashSet::default();
        let mut cache = FeatureCache::default();
        let mut features = Vec::new();

        'cells: for cell in scan {
            if features.len() >= limit {
                break;
            }
            for stored in self.store.load(collection, cell)? {
                if seen.contains(&stored.id) {
                    continue;
                }
                seen.insert(stored.id.clone());

                let Some(feature) = cache.resolve(stored, Role::A) else {
                    continue;
                };
                if !bbox.intersects(feature.bbox()) {
                    continue;
                }
                features.push(feature);
                if features.len() >= limit {
                    break 'cells;
                }
            }
        }

        Ok(feature_collection(features.iter().map(Arc::as_ref)))
    }

    fn load_cell(
        &self,
        collection: &str,
        cell: CellId,
        role: Role,
        cache: &mut FeatureCache,
        admits: &impl Fn(&Feature) -> bool,
    ) -> Result<Vec<Arc<Feature>>> {
        let mut features: Vec<Arc<Feature>> = self
            .store
            .load(collection, cell)?
            .into_iter()
            .filter_map(|stored| cache.resolve(stored, role))
            .filter(|feature| admits(feature.as_ref()))
            .collect();
        features.sort_by(|x, y| x.id().cmp(y.id()));
        features.dedup_by(|x, y| x.id() == y.id());
        Ok(features)
    }

    fn check_collection(&self, collection: &str) -> Result<()> {
        if !self.store.contains(collection)? {
            return Err(GridJoinError::CollectionNotFound(collection.to_string()));
        }

        let stored = self.store.grid_config(collection)?;
        if &stored != self.grid.config() {
            return Err(GridJoinError::GridMismatch {
                collection: collection.to_string(),
                detail: format!(
                    "stored {} divisions over {:?}, engine uses {} over {:?}",
                    stored.divisions,
                    stored.extent,
                    self.grid.divisions(),
                    self.grid.config().extent
                ),
            });
        }
        Ok(())
    }
}
