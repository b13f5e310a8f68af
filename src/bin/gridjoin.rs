use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use gridjoin::compute::aggregate::scan_collection_area;
use gridjoin::storage::records::{sum_intersection_area, write_records};
use gridjoin::{
    AggregateTotals, BatchJoin, BoundingBox2D, CellId, DelimitedFileSource, EngineBuilder,
    JoinConfig, QueryParams,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON (or TOML, with the `toml` feature) join configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Partition an `id,geometry` file into a store directory
    Partition {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        collection: String,
        #[arg(long)]
        input: PathBuf,
    },
    /// Similarity of two partitioned collections
    Stats {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        a: String,
        #[arg(long)]
        b: String,
        /// minx,miny,maxx,maxy
        #[arg(long, value_parser = parse_bbox)]
        bbox: Option<BoundingBox2D>,
        /// row:col,...
        #[arg(long, value_delimiter = ',')]
        cells: Option<Vec<CellId>>,
        /// Include the intersection records in the output
        #[arg(long)]
        records: bool,
    },
    /// Join two `id,geometry` files in one run
    Batch {
        #[arg(long)]
        a: PathBuf,
        #[arg(long)]
        b: PathBuf,
        /// Write the distinct intersection records here, one JSON object per line
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_parser = parse_bbox)]
        bbox: Option<BoundingBox2D>,
    },
    /// Recompute totals from a records file and the raw collections
    Totals {
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        a: PathBuf,
        #[arg(long)]
        b: PathBuf,
    },
}

#[derive(Serialize)]
struct TotalsReport {
    records: usize,
    skipped_a: u64,
    skipped_b: u64,
    totals: AggregateTotals,
}

fn parse_bbox(text: &str) -> Result<BoundingBox2D, String> {
    let values: Vec<f64> = text
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid bbox '{}': {}", text, e))?;

    let [min_x, min_y, max_x, max_y] = values[..] else {
        return Err(format!("bbox needs four values, got {}", values.len()));
    };
    let bbox = BoundingBox2D::new(min_x, min_y, max_x, max_y);
    if !bbox.is_finite() || min_x > max_x || min_y > max_y {
        return Err(format!("bbox '{}' is not a finite, ordered box", text));
    }
    Ok(bbox)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<JoinConfig> {
    match path {
        Some(path) => JoinConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(JoinConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridjoin=info,info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Partition {
            store,
            collection,
            input,
        } => {
            info!("Partitioning {} into {}", input.display(), store.display());
            let engine = EngineBuilder::new().store_path(store).config(config).build()?;
            let source = DelimitedFileSource::new(&input);
            let stats = engine.materialize(&collection, &source)?;
            print_json(&stats)?;
        }
        Command::Stats {
            store,
            a,
            b,
            bbox,
            cells,
            records,
        } => {
            let engine = EngineBuilder::new().store_path(store).config(config).build()?;
            let params = QueryParams {
                bbox,
                cells,
                include_records: records,
            };
            let outcome = engine.query(&a, &b, &params)?;
            print_json(&outcome)?;
        }
        Command::Batch { a, b, output, bbox } => {
            let join = BatchJoin::new(config)?;
            let result = join.run(
                &DelimitedFileSource::new(&a),
                &DelimitedFileSource::new(&b),
                bbox.as_ref(),
            )?;

            if let Some(path) = output {
                write_records(&path, &result.records)?;
                info!("Wrote {} records to {}", result.records.len(), path.display());
            }
            print_json(&serde_json::json!({
                "totals": result.totals,
                "stats": result.stats,
            }))?;
        }
        Command::Totals { records, a, b } => {
            if !records.is_file() {
                bail!("Records file {} does not exist", records.display());
            }
            let (intersection_area, count) = sum_intersection_area(&records)?;
            let scan_a = scan_collection_area(&DelimitedFileSource::new(&a), config.area_chunk_size)?;
            let scan_b = scan_collection_area(&DelimitedFileSource::new(&b), config.area_chunk_size)?;

            let totals = AggregateTotals::new(
                scan_a.total_area,
                scan_b.total_area,
                intersection_area,
                count,
            );
            print_json(&TotalsReport {
                records: count,
                skipped_a: scan_a.skipped,
                skipped_b: scan_b.skipped,
                totals,
            })?;
        }
    }

    Ok(())
}
