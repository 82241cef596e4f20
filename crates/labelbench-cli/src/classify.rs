//! Classification pipeline: fit on the train partition, score the test
//! partition, optionally export scores and predictions as CSV.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use labelbench_ai::{FlatIndex, RetrievalClassifier, RetrievalConfig, TextEmbedder};
use labelbench_core::Split;

/// Optional CSV files written by [`run_classify`].
#[derive(Default, Clone, Copy)]
pub struct Exports<'a> {
    /// Per-label scores of each test text.
    pub scores: Option<&'a Path>,
    /// Thresholded 0/1 predictions of each test text.
    pub predictions: Option<&'a Path>,
}

/// Per-label outcome of scoring the test partition.
pub struct ClassifyReport {
    pub labels: Vec<String>,
    pub predicted: Vec<usize>,
    pub actual: Vec<usize>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub elapsed_secs: f64,
}

/// Fit a retrieval classifier on `split.train` and score `split.test`.
pub fn run_classify(
    split: &Split,
    embedder: Arc<dyn TextEmbedder>,
    config: RetrievalConfig,
    exports: Exports<'_>,
) -> anyhow::Result<ClassifyReport> {
    let start = Instant::now();

    let mut classifier =
        RetrievalClassifier::new(config, move || Ok(FlatIndex::new(embedder.clone())))?;

    eprintln!("  Fitting on {} training examples...", split.train.len());
    classifier
        .fit(split.train.matrix())
        .context("fitting retrieval classifier")?;

    let texts = split.test.texts();
    eprintln!("  Scoring {} test examples (k = {})...", texts.len(), config.k);
    let scores = classifier
        .predict_proba(&texts)
        .context("scoring test partition")?;
    let predictions = scores.threshold(config.threshold);

    if let Some(path) = exports.scores {
        write_csv(path, &scores.to_record_batch(&texts)?)?;
    }
    if let Some(path) = exports.predictions {
        write_csv(path, &predictions.to_record_batch(&texts)?)?;
    }

    Ok(ClassifyReport {
        labels: scores.universe().names().to_vec(),
        predicted: predictions.positive_counts(),
        actual: split.test.matrix().label_counts(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

fn write_csv(path: &Path, batch: &RecordBatch) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer
        .write(batch)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
