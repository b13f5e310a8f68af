use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gridjoin::compute::candidates::CandidateStrategy;
use gridjoin::compute::feature::Feature;
use gridjoin::{
    BatchJoin, BoundingBox2D, GridConfig, JoinConfig, LocalEngine, MemoryPartitionStore,
    QueryParams, Role, SelfPairPolicy, VecSource,
};
use std::sync::Arc;

fn square(x: f64, y: f64, size: f64) -> String {
    format!(
        "POLYGON(({x} {y}, {x2} {y}, {x2} {y2}, {x} {y2}, {x} {y}))",
        x2 = x + size,
        y2 = y + size
    )
}

fn collection(name: &str, count: usize, seed: u64) -> VecSource {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };

    let mut source = VecSource::new(name);
    for i in 0..count {
        let x = next() * 990.0;
        let y = next() * 990.0;
        source.push(format!("{name}-{i}"), square(x, y, 1.0 + next() * 9.0));
    }
    source
}

fn config(divisions: u32) -> JoinConfig {
    JoinConfig::default().with_grid(GridConfig::new(
        BoundingBox2D::new(0.0, 0.0, 1000.0, 1000.0),
        divisions,
    ))
}

fn benchmark_batch_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_join");
    group.sample_size(10);

    let a = collection("a", 5_000, 1);
    let b = collection("b", 5_000, 2);

    for divisions in [1, 10, 50, 200] {
        let join = BatchJoin::new(config(divisions)).unwrap();
        group.bench_with_input(
            BenchmarkId::new("divisions", divisions),
            &divisions,
            |bench, _| bench.iter(|| join.run(black_box(&a), black_box(&b), None).unwrap()),
        );
    }

    group.finish();
}

fn benchmark_local_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_query");
    group.sample_size(10);

    let engine = LocalEngine::new(Box::new(MemoryPartitionStore::new()), config(50)).unwrap();
    engine.materialize("a", &collection("a", 5_000, 3)).unwrap();
    engine.materialize("b", &collection("b", 5_000, 4)).unwrap();

    group.bench_function("full_extent", |bench| {
        bench.iter(|| engine.query("a", "b", black_box(&QueryParams::new())).unwrap())
    });

    let region = QueryParams::new().with_bbox(BoundingBox2D::new(0.0, 0.0, 250.0, 250.0));
    group.bench_function("quarter_bbox", |bench| {
        bench.iter(|| engine.query("a", "b", black_box(&region)).unwrap())
    });

    group.finish();
}

fn benchmark_candidate_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidate_strategies");

    let features = |source: &VecSource, role| -> Vec<Arc<Feature>> {
        use gridjoin::FeatureSource;
        source
            .entries()
            .unwrap()
            .filter_map(|entry| Feature::from_text(&entry.id, &entry.geometry, role).into_feature())
            .map(Arc::new)
            .collect()
    };

    for size in [10, 100, 1_000] {
        let a = features(&collection("a", size, 5), Role::A);
        let b = features(&collection("b", size, 6), Role::B);

        for strategy in [CandidateStrategy::Exhaustive, CandidateStrategy::Indexed] {
            group.bench_with_input(
                BenchmarkId::new(format!("{strategy:?}"), size),
                &size,
                |bench, _| {
                    bench.iter(|| {
                        strategy
                            .generate(black_box(&a), black_box(&b), SelfPairPolicy::default())
                            .len()
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_batch_join,
    benchmark_local_query,
    benchmark_candidate_strategies
);
criterion_main!(benches);
