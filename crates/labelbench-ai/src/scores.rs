//! Prediction outputs: one row per query text, one column per label.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float32Array, StringArray, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use labelbench_core::{LabelRow, LabelUniverse};

/// Per-label scores in [0, 1] for each query, aligned to the fitted universe.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    universe: LabelUniverse,
    rows: Vec<Vec<f32>>,
}

impl ScoreTable {
    pub(crate) fn new(universe: LabelUniverse, rows: Vec<Vec<f32>>) -> Self {
        Self { universe, rows }
    }

    pub fn universe(&self) -> &LabelUniverse {
        &self.universe
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Score of a label, by name, for query `row`.
    pub fn get(&self, row: usize, label: &str) -> Option<f32> {
        let col = self.universe.position(label)?;
        self.rows.get(row).map(|r| r[col])
    }

    /// Binary predictions: `score >= threshold` is positive.
    pub fn threshold(&self, threshold: f32) -> PredictionTable {
        let rows = self
            .rows
            .iter()
            .map(|scores| {
                LabelRow::from_indices(
                    scores.len(),
                    scores
                        .iter()
                        .enumerate()
                        .filter(|&(_, &s)| s >= threshold)
                        .map(|(i, _)| i),
                )
            })
            .collect();
        PredictionTable {
            universe: self.universe.clone(),
            rows,
        }
    }

    /// Render as a batch: `text`, then one Float32 column per label.
    pub fn to_record_batch(&self, texts: &[&str]) -> Result<RecordBatch, ArrowError> {
        let mut fields = vec![Field::new("text", DataType::Utf8, false)];
        let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(texts.to_vec()))];
        for (i, name) in self.universe.names().iter().enumerate() {
            fields.push(Field::new(name, DataType::Float32, false));
            columns.push(Arc::new(Float32Array::from_iter_values(
                self.rows.iter().map(|r| r[i]),
            )));
        }
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
    }
}

/// Binary label membership for each query, aligned to the fitted universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionTable {
    universe: LabelUniverse,
    rows: Vec<LabelRow>,
}

impl PredictionTable {
    pub fn universe(&self) -> &LabelUniverse {
        &self.universe
    }

    pub fn rows(&self) -> &[LabelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `label` is predicted for query `row`.
    pub fn is_positive(&self, row: usize, label: &str) -> Option<bool> {
        let col = self.universe.position(label)?;
        self.rows.get(row).map(|r| r.contains(col))
    }

    /// Number of queries predicted positive for each label.
    pub fn positive_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.universe.len()];
        for row in &self.rows {
            for label in row.iter() {
                counts[label] += 1;
            }
        }
        counts
    }

    /// Render as a batch: `text`, then one 0/1 UInt8 column per label.
    pub fn to_record_batch(&self, texts: &[&str]) -> Result<RecordBatch, ArrowError> {
        let mut fields = vec![Field::new("text", DataType::Utf8, false)];
        let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(texts.to_vec()))];
        for (i, name) in self.universe.names().iter().enumerate() {
            fields.push(Field::new(name, DataType::UInt8, false));
            columns.push(Arc::new(UInt8Array::from_iter_values(
                self.rows.iter().map(|r| u8::from(r.contains(i))),
            )));
        }
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
    }
}
