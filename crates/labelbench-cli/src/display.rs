//! Terminal tables for sources, label distributions and prediction counts.
//!
//! Tables are built as single RecordBatches and rendered with Arrow's pretty
//! printer.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use labelbench_core::{LabelDistribution, SourceRegistry};

use crate::classify::ClassifyReport;

// ── Public API ──

pub fn print_sources(registry: &SourceRegistry) {
    for source in registry.iter() {
        println!("{}", source.name);
        println!("  {:<14} {}", "path", source.path.display());
        println!("  {:<14} {}", "text column", source.text_column);
        println!("  {:<14} {}", "labels", source.label_columns.len());
    }
}

/// Print train/test counts per label, then any label found on one side only.
pub fn print_distribution(source: &str, dist: &LabelDistribution) -> anyhow::Result<()> {
    println!(
        "=== {source}: {} train / {} test ===",
        dist.train_rows, dist.test_rows
    );
    println!("{}", pretty_format_batches(&[distribution_batch(dist)?])?);

    let one_sided = dist.one_sided();
    if !one_sided.is_empty() {
        println!("Present in one partition only: {}", one_sided.join(", "));
    }
    println!();
    Ok(())
}

/// Print predicted vs. actual positives per label on the test partition.
pub fn print_prediction_counts(report: &ClassifyReport) -> anyhow::Result<()> {
    println!(
        "=== predictions: {} test rows, fitted on {} ({:.2}s) ===",
        report.test_rows, report.train_rows, report.elapsed_secs
    );
    let batch = counts_batch(&report.labels, &report.predicted, &report.actual)?;
    println!("{}", pretty_format_batches(&[batch])?);
    Ok(())
}

// ── Table builders ──

fn distribution_batch(dist: &LabelDistribution) -> Result<RecordBatch, ArrowError> {
    let schema = Schema::new(vec![
        Field::new("label", DataType::Utf8, false),
        Field::new("train", DataType::UInt64, false),
        Field::new("train_%", DataType::Float64, false),
        Field::new("test", DataType::UInt64, false),
        Field::new("test_%", DataType::Float64, false),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(&dist.labels)),
        Arc::new(UInt64Array::from_iter_values(dist.train.iter().map(|&c| c as u64))),
        Arc::new(Float64Array::from_iter_values(
            dist.train.iter().map(|&c| percent(c, dist.train_rows)),
        )),
        Arc::new(UInt64Array::from_iter_values(dist.test.iter().map(|&c| c as u64))),
        Arc::new(Float64Array::from_iter_values(
            dist.test.iter().map(|&c| percent(c, dist.test_rows)),
        )),
    ];
    RecordBatch::try_new(Arc::new(schema), columns)
}

fn counts_batch(
    labels: &[String],
    predicted: &[usize],
    actual: &[usize],
) -> Result<RecordBatch, ArrowError> {
    let schema = Schema::new(vec![
        Field::new("label", DataType::Utf8, false),
        Field::new("predicted", DataType::UInt64, false),
        Field::new("actual", DataType::UInt64, false),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(labels)),
        Arc::new(UInt64Array::from_iter_values(predicted.iter().map(|&c| c as u64))),
        Arc::new(UInt64Array::from_iter_values(actual.iter().map(|&c| c as u64))),
    ];
    RecordBatch::try_new(Arc::new(schema), columns)
}

/// Share of `rows`, in percent, to one decimal.
fn percent(count: usize, rows: usize) -> f64 {
    if rows == 0 {
        return 0.0;
    }
    (count as f64 / rows as f64 * 1000.0).round() / 10.0
}
