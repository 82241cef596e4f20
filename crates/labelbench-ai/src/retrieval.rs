//! Retrieval-based multi-label classification.
//!
//! Training texts go into an [`EmbeddingIndex`] with their label sets. A query
//! retrieves its `k` nearest training examples and every label carried by a
//! neighbor earns one vote. A label's score is its vote count divided by `k`.
//!
//! Scores are neighbor-vote fractions, not calibrated probabilities: two
//! neighbors agreeing on a rare label score the same as two agreeing on a
//! common one. Per-label training counts are kept as metadata only and never
//! weight the votes.

use std::time::Instant;

use labelbench_core::{LabelMatrix, LabelRow, LabelUniverse};
use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::index::{EmbeddingIndex, Neighbor};
use crate::scores::{PredictionTable, ScoreTable};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier is not fitted")]
    NotFitted,

    #[error("invalid classifier config: {0}")]
    InvalidConfig(String),

    /// Embedding or index failure, passed through unchanged.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

/// Neighborhood size and decision threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    pub k: usize,
    /// `score >= threshold` is a positive prediction.
    pub threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 4,
            threshold: 0.5,
        }
    }
}

struct Fitted<I> {
    universe: LabelUniverse,
    label_counts: Vec<usize>,
    index: I,
}

/// Multi-label classifier that votes over retrieved neighbors.
///
/// `new_index` builds an empty index; every [`fit`](Self::fit) starts from a
/// fresh one, so refitting replaces the previous training data entirely.
pub struct RetrievalClassifier<I, F> {
    config: RetrievalConfig,
    new_index: F,
    fitted: Option<Fitted<I>>,
}

impl<I, F> RetrievalClassifier<I, F>
where
    I: EmbeddingIndex,
    F: Fn() -> anyhow::Result<I>,
{
    pub fn new(config: RetrievalConfig, new_index: F) -> Result<Self, ClassifierError> {
        if !(0.0..=1.0).contains(&config.threshold) {
            return Err(ClassifierError::InvalidConfig(format!(
                "threshold {} outside [0, 1]",
                config.threshold
            )));
        }
        Ok(Self {
            config,
            new_index,
            fitted: None,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Label universe seen at fit time.
    pub fn labels(&self) -> Option<&LabelUniverse> {
        self.fitted.as_ref().map(|f| &f.universe)
    }

    /// Training examples per label, in universe order.
    pub fn label_counts(&self) -> Option<&[usize]> {
        self.fitted.as_ref().map(|f| f.label_counts.as_slice())
    }

    /// The index built by the last fit.
    pub fn index(&self) -> Option<&I> {
        self.fitted.as_ref().map(|f| &f.index)
    }

    /// Index `train` into a fresh index, replacing any earlier fit.
    pub fn fit(&mut self, train: &LabelMatrix) -> Result<(), ClassifierError> {
        let start = Instant::now();

        let mut index = (self.new_index)()?;
        let texts = train.texts();
        let metadata: Vec<LabelRow> = train.examples().iter().map(|e| e.labels.clone()).collect();
        index.insert(&texts, metadata)?;

        self.fitted = Some(Fitted {
            universe: train.universe().clone(),
            label_counts: train.label_counts(),
            index,
        });

        info!(
            examples = train.len(),
            labels = train.universe().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "retrieval classifier fitted"
        );
        Ok(())
    }

    /// Neighbor-vote score per label for each text.
    pub fn predict_proba(&self, texts: &[&str]) -> Result<ScoreTable, ClassifierError>
    where
        I: Sync,
    {
        let fitted = self.fitted.as_ref().ok_or(ClassifierError::NotFitted)?;
        let start = Instant::now();
        let k = self.config.k;
        let width = fitted.universe.len();

        let rows = texts
            .par_iter()
            .map(|text| -> anyhow::Result<Vec<f32>> {
                let neighbors = fitted.index.query(text, k)?;
                Ok(score_neighbors(&neighbors, k, width))
            })
            .collect::<anyhow::Result<Vec<Vec<f32>>>>()?;

        info!(
            queries = texts.len(),
            k,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "scored queries"
        );
        Ok(ScoreTable::new(fitted.universe.clone(), rows))
    }

    /// Thresholded [`predict_proba`](Self::predict_proba).
    pub fn predict(&self, texts: &[&str]) -> Result<PredictionTable, ClassifierError>
    where
        I: Sync,
    {
        Ok(self.predict_proba(texts)?.threshold(self.config.threshold))
    }
}

/// Vote fractions over `width` labels from one query's neighbors.
///
/// Each neighbor votes once for every label it carries. Counts are divided by
/// `k`, not by the number of neighbors returned. `k == 0` gives all zeros.
pub fn score_neighbors(neighbors: &[Neighbor], k: usize, width: usize) -> Vec<f32> {
    let mut counts = vec![0usize; width];
    if k == 0 {
        return vec![0.0; width];
    }
    for neighbor in neighbors.iter().take(k) {
        for label in neighbor.labels.iter().filter(|&l| l < width) {
            counts[label] += 1;
        }
    }
    counts.into_iter().map(|c| c as f32 / k as f32).collect()
}
