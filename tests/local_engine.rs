use gridjoin::prelude::*;
use gridjoin::{FsPartitionStore, MemoryPartitionStore};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const TOLERANCE: f64 = 1e-9;

fn square(x: f64, y: f64, size: f64) -> String {
    format!(
        "POLYGON(({x} {y}, {x2} {y}, {x2} {y2}, {x} {y2}, {x} {y}))",
        x2 = x + size,
        y2 = y + size
    )
}

fn config(divisions: u32) -> JoinConfig {
    JoinConfig::default().with_grid(GridConfig::new(
        BoundingBox2D::new(0.0, 0.0, 10.0, 10.0),
        divisions,
    ))
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn memory_engine(divisions: u32) -> LocalEngine {
    LocalEngine::new(Box::new(MemoryPartitionStore::new()), config(divisions))
        .expect("Failed to create engine")
}

/// Two collections, each with one feature in cell (0, 0) and one elsewhere.
fn two_cell_collections(engine: &LocalEngine) {
    let a = VecSource::from_pairs(
        "a",
        [("a1", square(1.0, 1.0, 1.0)), ("a2", square(6.0, 6.0, 1.0))],
    );
    let b = VecSource::from_pairs(
        "b",
        [("b1", square(1.5, 1.5, 1.0)), ("b2", square(6.0, 1.0, 1.0))],
    );
    engine.materialize("a", &a).expect("Failed to materialize a");
    engine.materialize("b", &b).expect("Failed to materialize b");
}

fn write_csv(rows: &[(&str, String)]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "id,geometry").expect("write header");
    for (id, wkt) in rows {
        writeln!(file, "{},\"{}\"", id, wkt).expect("write row");
    }
    file.flush().expect("flush");
    file
}

/// Test 1: File-backed store survives reopening
#[test]
fn test_fs_store_roundtrip() {
    init_logging();
    let dir = TempDir::new().expect("Failed to create temp dir");
    let a = write_csv(&[("1", square(0.0, 0.0, 1.0)), ("2", square(4.0, 4.0, 2.0))]);
    let b = write_csv(&[("1", square(0.5, 0.5, 1.0)), ("9", "not a polygon".to_string())]);

    let engine = EngineBuilder::new()
        .store_path(dir.path())
        .config(config(4))
        .build()
        .expect("Failed to build engine");

    let stats_a = engine
        .materialize("a", &DelimitedFileSource::new(a.path()))
        .expect("Failed to materialize a");
    let stats_b = engine
        .materialize("b", &DelimitedFileSource::new(b.path()))
        .expect("Failed to materialize b");
    assert_eq!(stats_a.accepted, 2);
    assert_eq!(stats_b.accepted, 1);
    assert_eq!(stats_b.skipped, 1);

    let first = engine
        .query("a", "b", &QueryParams::new().with_records())
        .expect("Query failed");
    drop(engine);

    let reopened = LocalEngine::new(
        Box::new(FsPartitionStore::open(dir.path()).expect("Failed to open store")),
        config(4),
    )
    .expect("Failed to create engine");
    let second = reopened
        .query("a", "b", &QueryParams::new().with_records())
        .expect("Query failed");

    assert_eq!(first, second);
    assert_eq!(second.totals.intersection_count, 1);
    assert!((second.totals.area_a - 5.0).abs() < TOLERANCE);
    assert!((second.totals.area_b - 1.0).abs() < TOLERANCE);
    assert!((second.totals.intersection_area - 0.25).abs() < TOLERANCE);

    let records = second.records.expect("records requested");
    assert_eq!(records[0].id_a, "1");
    assert_eq!(records[0].id_b, "1");
}

/// Test 2: Totals cover every feature; pairs come from shared cells only
#[test]
fn test_totals_cover_unshared_cells() {
    let engine = memory_engine(2);
    two_cell_collections(&engine);

    let outcome = engine.query("a", "b", &QueryParams::new()).expect("Query failed");
    assert_eq!(outcome.cells_scanned, 1);
    assert!((outcome.totals.area_a - 2.0).abs() < TOLERANCE);
    assert!((outcome.totals.area_b - 2.0).abs() < TOLERANCE);
    assert!((outcome.totals.intersection_area - 0.25).abs() < TOLERANCE);
    assert!((outcome.totals.jaccard - 0.25 / 3.75).abs() < TOLERANCE);
}

/// Test 3: An explicit cell subset restricts both pairs and totals
#[test]
fn test_explicit_cell_subset() {
    let engine = memory_engine(2);
    two_cell_collections(&engine);

    let params = QueryParams::new().with_cells([CellId::new(0, 0)]);
    let outcome = engine.query("a", "b", &params).expect("Query failed");
    assert_eq!(outcome.cells_scanned, 1);
    assert!((outcome.totals.area_a - 1.0).abs() < TOLERANCE);
    assert!((outcome.totals.area_b - 1.0).abs() < TOLERANCE);
    assert!((outcome.totals.jaccard - 0.25 / 1.75).abs() < TOLERANCE);

    // Present in only one collection: nothing to join
    let params = QueryParams::new().with_cells([CellId::new(1, 1)]);
    let outcome = engine.query("a", "b", &params).expect("Query failed");
    assert_eq!(outcome.cells_scanned, 0);
    assert_eq!(outcome.totals.intersection_count, 0);
    assert!((outcome.totals.area_a - 1.0).abs() < TOLERANCE);
    assert_eq!(outcome.totals.area_b, 0.0);

    // Absent everywhere
    let params = QueryParams::new().with_cells([CellId::new(7, 7)]);
    let outcome = engine.query("a", "b", &params).expect("Query failed");
    assert_eq!(outcome.totals, AggregateTotals::default());
}

/// Test 4: The bbox filter applies to totals and pairs
#[test]
fn test_bbox_filter() {
    let engine = memory_engine(2);
    two_cell_collections(&engine);

    let params = QueryParams::new().with_bbox(BoundingBox2D::new(0.0, 0.0, 3.0, 3.0));
    let outcome = engine.query("a", "b", &params).expect("Query failed");
    assert!((outcome.totals.area_a - 1.0).abs() < TOLERANCE);
    assert!((outcome.totals.area_b - 1.0).abs() < TOLERANCE);
    assert_eq!(outcome.totals.intersection_count, 1);

    let params = QueryParams::new().with_bbox(BoundingBox2D::new(8.0, 8.0, 9.0, 9.0));
    let outcome = engine.query("a", "b", &params).expect("Query failed");
    assert_eq!(outcome.totals.jaccard, 0.0);
    assert_eq!(outcome.totals.area_a, 0.0);
}

/// Test 5: Querying an unknown collection is a hard error
#[test]
fn test_missing_collection() {
    let engine = memory_engine(4);
    let a = VecSource::from_pairs("a", [("1", square(0.0, 0.0, 1.0))]);
    engine.materialize("a", &a).expect("Failed to materialize");

    match engine.query("a", "missing", &QueryParams::new()) {
        Err(GridJoinError::CollectionNotFound(name)) => assert_eq!(name, "missing"),
        other => panic!("expected CollectionNotFound, got {:?}", other.map(|o| o.totals)),
    }
    assert!(engine.cells("missing").is_err());
}

/// Test 6: A collection built with another grid cannot be queried
#[test]
fn test_grid_mismatch() {
    init_logging();
    let dir = TempDir::new().expect("Failed to create temp dir");
    let a = VecSource::from_pairs("a", [("1", square(0.0, 0.0, 1.0))]);

    let coarse = EngineBuilder::new()
        .store_path(dir.path())
        .config(config(4))
        .build()
        .expect("Failed to build engine");
    coarse.materialize("a", &a).expect("Failed to materialize a");
    coarse.materialize("b", &a).expect("Failed to materialize b");

    let fine = EngineBuilder::new()
        .store_path(dir.path())
        .config(config(8))
        .build()
        .expect("Failed to build engine");
    assert!(matches!(
        fine.query("a", "b", &QueryParams::new()),
        Err(GridJoinError::GridMismatch { .. })
    ));
}

/// Test 7: Rebuilding a collection replaces its contents
#[test]
fn test_rematerialize_replaces() {
    let engine = memory_engine(4);
    let first = VecSource::from_pairs("a", [("1", square(0.0, 0.0, 1.0))]);
    let second = VecSource::from_pairs("a", [("2", square(8.0, 8.0, 1.0))]);

    engine.materialize("a", &first).expect("Failed to materialize");
    engine.materialize("a", &second).expect("Failed to materialize");
    engine.materialize("b", &first).expect("Failed to materialize");

    let outcome = engine.query("a", "b", &QueryParams::new()).expect("Query failed");
    assert_eq!(outcome.totals.intersection_count, 0);
    assert_eq!(
        engine.cells("a").expect("cells").into_iter().collect::<Vec<_>>(),
        vec![CellId::new(3, 3)]
    );
}

/// Test 8: Region polygons are unique, filtered and limited
#[test]
fn test_region_polygons() {
    let engine = memory_engine(10);
    let source = VecSource::from_pairs(
        "a",
        [
            ("big", square(0.5, 0.5, 3.0)),
            ("small", square(1.2, 1.2, 0.5)),
            ("far", square(8.0, 8.0, 1.0)),
        ],
    );
    engine.materialize("a", &source).expect("Failed to materialize");

    let region = BoundingBox2D::new(0.0, 0.0, 5.0, 5.0);
    let all = engine
        .region_polygons("a", &region, 100, None)
        .expect("region query");
    let mut ids: Vec<String> = all
        .features
        .iter()
        .map(|f| f.properties.as_ref().expect("properties")["id"].to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["\"big\"", "\"small\""]);

    let limited = engine
        .region_polygons("a", &region, 1, None)
        .expect("region query");
    assert_eq!(limited.features.len(), 1);

    let subset = engine
        .region_polygons("a", &region, 100, Some(&[CellId::new(3, 3)]))
        .expect("region query");
    assert_eq!(subset.features.len(), 1);

    assert!(engine.region_polygons("nope", &region, 10, None).is_err());
}

/// Test 9: Concurrent read-only queries see the same result
#[test]
fn test_concurrent_queries() {
    let engine = memory_engine(5);
    two_cell_collections(&engine);
    let expected = engine.query("a", "b", &QueryParams::new()).expect("Query failed");

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| engine.query("a", "b", &QueryParams::new())))
            .collect();
        for handle in handles {
            let outcome = handle.join().expect("thread panicked").expect("Query failed");
            assert_eq!(outcome.totals, expected.totals);
        }
    });
}
