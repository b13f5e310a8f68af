use gridjoin::compute::partition::GridPartitioner;
use gridjoin::prelude::*;
use gridjoin::{AggregateTotals, Grid, MemoryPartitionStore};

const TOLERANCE: f64 = 1e-9;

fn extent() -> BoundingBox2D {
    BoundingBox2D::new(0.0, 0.0, 100.0, 100.0)
}

fn config(divisions: u32) -> JoinConfig {
    JoinConfig::default().with_grid(GridConfig::new(extent(), divisions))
}

fn square(x: f64, y: f64, size: f64) -> String {
    format!(
        "POLYGON(({x} {y}, {x2} {y}, {x2} {y2}, {x} {y2}, {x} {y}))",
        x2 = x + size,
        y2 = y + size
    )
}

/// Deterministic pseudo-random squares, some overlapping each other.
fn scattered(name: &str, count: usize, seed: u64) -> VecSource {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };

    let mut source = VecSource::new(name);
    for i in 0..count {
        let x = next() * 95.0;
        let y = next() * 95.0;
        let size = 0.5 + next() * 4.5;
        source.push(format!("{name}-{i}"), square(x, y, size));
    }
    source
}

/// Disjoint squares on a regular lattice.
fn lattice(name: &str) -> VecSource {
    let mut source = VecSource::new(name);
    for row in 0..12 {
        for col in 0..12 {
            let x = col as f64 * 8.0 + 0.7;
            let y = row as f64 * 8.0 + 0.3;
            source.push(format!("cell-{row}-{col}"), square(x, y, 5.5));
        }
    }
    source
}

fn assert_totals_eq(left: &AggregateTotals, right: &AggregateTotals) {
    assert_eq!(left.intersection_count, right.intersection_count);
    assert!((left.area_a - right.area_a).abs() < TOLERANCE, "{left:?} vs {right:?}");
    assert!((left.area_b - right.area_b).abs() < TOLERANCE, "{left:?} vs {right:?}");
    assert!(
        (left.intersection_area - right.intersection_area).abs() < TOLERANCE,
        "{left:?} vs {right:?}"
    );
    assert!((left.jaccard - right.jaccard).abs() < TOLERANCE, "{left:?} vs {right:?}");
}

fn batch(divisions: u32, a: &VecSource, b: &VecSource) -> AggregateTotals {
    BatchJoin::new(config(divisions))
        .expect("valid config")
        .run(a, b, None)
        .expect("batch run")
        .totals
}

fn local(divisions: u32, a: &VecSource, b: &VecSource) -> AggregateTotals {
    let engine = LocalEngine::new(Box::new(MemoryPartitionStore::new()), config(divisions))
        .expect("valid config");
    engine.materialize("a", a).expect("materialize a");
    engine.materialize("b", b).expect("materialize b");
    engine
        .query("a", "b", &QueryParams::new())
        .expect("query")
        .totals
}

/// Test 1: Totals do not depend on grid granularity (batch path)
#[test]
fn test_granularity_invariance_batch() {
    let a = scattered("a", 250, 17);
    let b = scattered("b", 250, 91);

    let coarse = batch(1, &a, &b);
    assert!(coarse.intersection_count > 0);
    for divisions in [2, 7, 50] {
        assert_totals_eq(&coarse, &batch(divisions, &a, &b));
    }
}

/// Test 2: Totals do not depend on grid granularity (local path)
#[test]
fn test_granularity_invariance_local() {
    let a = scattered("a", 250, 17);
    let b = scattered("b", 250, 91);

    let coarse = local(1, &a, &b);
    assert!(coarse.intersection_count > 0);
    assert_totals_eq(&coarse, &local(50, &a, &b));
}

/// Test 3: Both paths agree with each other
#[test]
fn test_batch_and_local_agree() {
    let a = scattered("a", 150, 5);
    let b = scattered("b", 150, 6);
    assert_totals_eq(&batch(13, &a, &b), &local(13, &a, &b));
}

/// Test 4: Exhaustive and indexed candidate generation give the same result
#[test]
fn test_candidate_strategy_does_not_change_results() {
    let a = scattered("a", 200, 3);
    let b = scattered("b", 200, 4);

    let run = |threshold: usize| {
        BatchJoin::new(config(4).with_index_threshold(threshold))
            .expect("valid config")
            .run(&a, &b, None)
            .expect("batch run")
    };
    let indexed = run(0);
    let exhaustive = run(usize::MAX);

    assert_eq!(indexed.records, exhaustive.records);
    assert_eq!(indexed.stats.candidate_pairs, exhaustive.stats.candidate_pairs);
    assert_totals_eq(&indexed.totals, &exhaustive.totals);
}

/// Test 5: A collection compared with an exact copy of itself
#[test]
fn test_self_similarity() {
    let a = lattice("a");
    let b = lattice("b");

    for divisions in [1, 9, 50] {
        let totals = batch(divisions, &a, &b);
        assert!((totals.intersection_area - totals.area_a).abs() < TOLERANCE);
        assert!((totals.area_a - totals.area_b).abs() < TOLERANCE);
        assert!((totals.jaccard - 1.0).abs() < TOLERANCE);
        assert_eq!(totals.intersection_count, 144);

        let local_totals = local(divisions, &a, &b);
        assert!((local_totals.jaccard - 1.0).abs() < TOLERANCE);
    }
}

/// Test 6: Excluding matching ids drops every pair of an id-identical copy
#[test]
fn test_exclude_matching_ids_policy() {
    let a = lattice("a");
    let b = lattice("b");

    let output = BatchJoin::new(config(9).with_self_pairs(SelfPairPolicy::ExcludeMatchingIds))
        .expect("valid config")
        .run(&a, &b, None)
        .expect("batch run");
    assert_eq!(output.totals.intersection_count, 0);
    assert_eq!(output.totals.jaccard, 0.0);
}

/// Test 7: Disjoint collections have no intersection
#[test]
fn test_disjointness() {
    let a = VecSource::from_pairs("a", [("a", square(0.0, 0.0, 1.0))]);
    let b = VecSource::from_pairs("b", [("b", square(10.0, 10.0, 1.0))]);

    for divisions in [1, 5, 50] {
        let totals = batch(divisions, &a, &b);
        assert_eq!(totals.intersection_count, 0);
        assert_eq!(totals.intersection_area, 0.0);
        assert_eq!(totals.jaccard, 0.0);
        assert!((totals.area_a - 1.0).abs() < TOLERANCE);
        assert!((totals.area_b - 1.0).abs() < TOLERANCE);
    }
}

/// Test 8: Two unit squares overlapping by a quarter
#[test]
fn test_quarter_overlap_scenario() {
    let a = VecSource::from_pairs("a", [("a", square(0.0, 0.0, 1.0))]);
    let b = VecSource::from_pairs("b", [("b", square(0.5, 0.5, 1.0))]);

    for totals in [batch(5, &a, &b), local(5, &a, &b)] {
        assert!((totals.area_a - 1.0).abs() < TOLERANCE);
        assert!((totals.area_b - 1.0).abs() < TOLERANCE);
        assert!((totals.intersection_area - 0.25).abs() < TOLERANCE);
        assert!((totals.union_area() - 1.75).abs() < TOLERANCE);
        assert!((totals.jaccard - 0.1428571429).abs() < TOLERANCE);
        assert_eq!(totals.intersection_count, 1);
    }
}

/// Test 9: A pair sharing four cells is still counted once
#[test]
fn test_dedup_stress() {
    // A straddles the cell corner at (50, 50) for every even division count
    let a = VecSource::from_pairs("a", [("a", square(40.0, 40.0, 20.0))]);
    let b = VecSource::from_pairs("b", [("b", square(49.0, 49.0, 2.0))]);

    for divisions in [2, 4, 10, 20, 50] {
        let output = BatchJoin::new(config(divisions))
            .expect("valid config")
            .run(&a, &b, None)
            .expect("batch run");
        assert!(output.stats.cells_joined >= 4);
        assert_eq!(output.totals.intersection_count, 1);
        assert!((output.totals.intersection_area - 4.0).abs() < TOLERANCE);

        let totals = local(divisions, &a, &b);
        assert_eq!(totals.intersection_count, 1);
        assert!((totals.intersection_area - 4.0).abs() < TOLERANCE);
    }
}

/// Test 10: Partitioning is deterministic and order independent
#[test]
fn test_partition_idempotence() {
    let grid = Grid::new(GridConfig::new(extent(), 23)).expect("valid grid");
    let partitioner = GridPartitioner::new(&grid);
    let source = scattered("a", 300, 42);

    let entries: Vec<_> = source.entries().expect("entries").collect();
    let mut shuffled = entries.clone();
    shuffled.reverse();
    shuffled.rotate_left(37);

    let first = partitioner.partition(Role::A, entries.clone().into_iter());
    let second = partitioner.partition(Role::A, entries.into_iter());
    let third = partitioner.partition(Role::A, shuffled.into_iter());

    assert_eq!(first.assignments(), second.assignments());
    assert_eq!(first.assignments(), third.assignments());
}

/// Test 11: Assigned cells cover each feature's bounding box
#[test]
fn test_replication_completeness() {
    let grid = Grid::new(GridConfig::new(extent(), 17)).expect("valid grid");
    let partitioner = GridPartitioner::new(&grid);
    let source = scattered("a", 300, 8);
    let partition = partitioner.partition(Role::A, source.entries().expect("entries"));

    let mut crossing = 0;
    for feature in partition.features() {
        let cells = partitioner.cells_of(feature);
        let covered: BoundingBox2D = cells
            .iter()
            .map(|cell| grid.cell_extent(*cell))
            .reduce(|x, y| x.union(&y))
            .expect("at least one cell");
        assert!(covered.contains(feature.bbox()), "{} not covered", feature.id());
        if cells.len() > 1 {
            crossing += 1;
        }
    }

    let stats = partition.stats();
    assert!(stats.emissions >= stats.accepted);
    assert!(crossing > 0);
    assert!(stats.emissions > stats.accepted);
}

/// Test 12: No crossings means exactly one emission per feature
#[test]
fn test_no_replication_without_crossings() {
    let grid = Grid::new(GridConfig::new(extent(), 10)).expect("valid grid");
    let partitioner = GridPartitioner::new(&grid);
    let mut source = VecSource::new("a");
    for i in 0..10 {
        source.push(format!("{i}"), square(i as f64 * 10.0 + 2.0, 2.0, 5.0));
    }

    let partition = partitioner.partition(Role::A, source.entries().expect("entries"));
    assert_eq!(partition.stats().emissions, partition.stats().accepted);
    assert_eq!(partition.len(), 10);
}
