//! labelbench: stratified benchmark splits and retrieval-based classification
//! over multi-label text datasets.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use labelbench_ai::{HashingEmbedder, RetrievalConfig, TextEmbedder};
use labelbench_core::{SourceRegistry, Split, SplitConfig, StratifiedPartitioner};
use tracing_subscriber::{EnvFilter, fmt};

mod classify;
mod display;

#[derive(Parser)]
#[command(name = "labelbench", version)]
#[command(about = "Stratified train/test splits and retrieval classification for multi-label datasets")]
struct Cli {
    /// Directory that dataset paths are resolved against
    #[arg(long, env = "LABELBENCH_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// JSON file of data sources, replacing the built-in ones
    #[arg(long, env = "LABELBENCH_SOURCES", global = true)]
    sources: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered data sources
    Sources,
    /// Load a source, partition it, and print the label distribution
    Split {
        source: String,
        #[command(flatten)]
        split: SplitArgs,
    },
    /// Partition a source, fit on train and score the test partition
    Classify(ClassifyArgs),
}

#[derive(Args)]
struct SplitArgs {
    #[arg(long, default_value_t = 1000)]
    n_train: usize,

    #[arg(long, default_value_t = 200)]
    n_test: usize,

    /// Keep only the first N label columns
    #[arg(long)]
    n_labels: Option<usize>,

    #[arg(long, default_value_t = 123)]
    seed: u64,
}

impl SplitArgs {
    fn config(&self) -> SplitConfig {
        SplitConfig {
            n_train: self.n_train,
            n_test: self.n_test,
            n_labels: self.n_labels,
            seed: self.seed,
        }
    }
}

#[derive(Args)]
struct ClassifyArgs {
    source: String,

    #[command(flatten)]
    split: SplitArgs,

    /// Neighbors retrieved per query
    #[arg(long, default_value_t = 4)]
    k: usize,

    /// Minimum score for a positive prediction
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,

    /// ONNX sentence-transformers model directory (model.onnx + tokenizer.json)
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Hashing embedder width, used when no model directory is given
    #[arg(long, default_value_t = labelbench_ai::DEFAULT_DIM)]
    dim: usize,

    /// Write test-partition scores to this CSV file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write thresholded test-partition predictions to this CSV file
    #[arg(long)]
    predictions: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("labelbench v{}", env!("CARGO_PKG_VERSION"));

    let registry = match &cli.sources {
        Some(path) => SourceRegistry::from_json_file(path, &cli.data_dir)?,
        None => SourceRegistry::builtin(&cli.data_dir),
    };

    match cli.command {
        Command::Sources => display::print_sources(&registry),
        Command::Split { source, split } => {
            let split = load_and_split(&registry, &source, split.config())?;
            display::print_distribution(&source, &split.distribution())?;
        }
        Command::Classify(args) => {
            let split = load_and_split(&registry, &args.source, args.split.config())?;
            display::print_distribution(&args.source, &split.distribution())?;

            let embedder = build_embedder(args.model_dir.as_deref(), args.dim)?;
            let config = RetrievalConfig {
                k: args.k,
                threshold: args.threshold,
            };
            let exports = classify::Exports {
                scores: args.output.as_deref(),
                predictions: args.predictions.as_deref(),
            };
            let report = classify::run_classify(&split, embedder, config, exports)?;
            display::print_prediction_counts(&report)?;
            if let Some(path) = &args.output {
                eprintln!("  Scores written to {}", path.display());
            }
            if let Some(path) = &args.predictions {
                eprintln!("  Predictions written to {}", path.display());
            }
        }
    }

    Ok(())
}

fn load_and_split(registry: &SourceRegistry, name: &str, config: SplitConfig) -> anyhow::Result<Split> {
    let source = registry.get(name)?;
    let matrix = labelbench_store::load_matrix(source)?;
    let split = StratifiedPartitioner::new(config)?.split(&matrix)?;
    Ok(split)
}

fn build_embedder(model_dir: Option<&Path>, dim: usize) -> anyhow::Result<Arc<dyn TextEmbedder>> {
    match model_dir {
        #[cfg(feature = "onnx")]
        Some(dir) => Ok(Arc::new(labelbench_ai::Embedder::load(dir)?)),
        #[cfg(not(feature = "onnx"))]
        Some(_) => anyhow::bail!("--model-dir requires a build with the `onnx` feature"),
        None => Ok(Arc::new(HashingEmbedder::new(dim))),
    }
}
