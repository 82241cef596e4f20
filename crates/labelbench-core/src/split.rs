//! Train/test partitioning by iterative stratification.
//!
//! The split runs in three stages:
//!
//! 1. Optional label-column limiting. Examples left without any label after
//!    the cut are dropped, so truncation never introduces unlabeled rows.
//! 2. Seeded uniform sampling of exactly `n_train + n_test` rows.
//! 3. Greedy iterative stratification of the sampled pool into a test fold
//!    and a train fold of exactly the requested sizes.
//!
//! Stage 3 is a heuristic. It keeps per-label frequencies close to the
//! `n_train : n_test` ratio for well-supported labels but gives no guarantee
//! for labels with only a handful of examples.
//!
//! # Tie-break policy
//!
//! - [`select_label`]: the label with the fewest unassigned examples goes
//!   first; equal counts go to the lower label index.
//! - [`order_examples`]: within a label, examples carrying more labels are
//!   placed first; equal counts keep pool order.
//! - [`select_fold`]: an example goes to the fold furthest below its target
//!   share for the current label, measured as the unfilled fraction of that
//!   fold's target; ties go to the fold with more free capacity, then to the
//!   lower fold index (test before train).

use std::borrow::Cow;
use std::cmp::{Ordering, Reverse};
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::distribution::LabelDistribution;
use crate::matrix::{LabelMatrix, LabelRow};

/// Fold index of the test partition inside the stratifier.
pub const TEST_FOLD: usize = 0;
/// Fold index of the train partition inside the stratifier.
pub const TRAIN_FOLD: usize = 1;

const UNASSIGNED: usize = usize::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("invalid split config: {0}")]
    InvalidConfig(String),

    #[error("requested {requested} rows but only {available} are available")]
    InsufficientData { requested: usize, available: usize },

    /// Non-fatal: reported in [`Split::degenerate_labels`], never returned as `Err`.
    #[error("label '{label}' has no examples in the sampled pool")]
    DegenerateLabel { label: String },
}

/// Sizes, label cap and seed for one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    pub n_train: usize,
    pub n_test: usize,
    /// Use only the first `n` label columns.
    pub n_labels: Option<usize>,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            n_train: 1000,
            n_test: 200,
            n_labels: None,
            seed: 123,
        }
    }
}

impl SplitConfig {
    /// Rows sampled before splitting.
    pub fn total(&self) -> usize {
        self.n_train + self.n_test
    }

    fn validate(&self) -> Result<(), SplitError> {
        if self.n_train == 0 {
            return Err(SplitError::InvalidConfig("n_train must be > 0".into()));
        }
        if self.n_test == 0 {
            return Err(SplitError::InvalidConfig("n_test must be > 0".into()));
        }
        if self.n_labels == Some(0) {
            return Err(SplitError::InvalidConfig("n_labels must be > 0".into()));
        }
        Ok(())
    }
}

/// One side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    matrix: LabelMatrix,
    source_rows: Vec<usize>,
}

impl Partition {
    /// Examples of this partition, re-indexed from 0.
    pub fn matrix(&self) -> &LabelMatrix {
        &self.matrix
    }

    /// Row position of each example in the matrix passed to the partitioner.
    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.matrix.texts()
    }
}

/// Result of [`StratifiedPartitioner::split`].
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Partition,
    pub test: Partition,
    /// Labels with no support in the sampled pool ([`SplitError::DegenerateLabel`]).
    pub degenerate_labels: Vec<SplitError>,
}

impl Split {
    /// Per-label example counts in each partition.
    pub fn distribution(&self) -> LabelDistribution {
        LabelDistribution::from_partitions(self.train.matrix(), self.test.matrix())
    }
}

/// Splits a [`LabelMatrix`] into stratified train and test partitions.
#[derive(Debug, Clone)]
pub struct StratifiedPartitioner {
    config: SplitConfig,
}

impl StratifiedPartitioner {
    pub fn new(config: SplitConfig) -> Result<Self, SplitError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Sample and split `matrix`. Same config and input give the same split.
    pub fn split(&self, matrix: &LabelMatrix) -> Result<Split, SplitError> {
        let start = Instant::now();
        let config = &self.config;

        // 1. Optional column limit; drop rows it leaves unlabeled.
        let (working, candidates): (Cow<'_, LabelMatrix>, Vec<usize>) = match config.n_labels {
            Some(n) => {
                let limited = matrix.limit_labels(n);
                let kept: Vec<usize> = limited
                    .examples()
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| !e.labels.is_empty())
                    .map(|(i, _)| i)
                    .collect();
                let dropped = limited.len() - kept.len();
                if dropped > 0 {
                    warn!(
                        n_labels = limited.universe().len(),
                        dropped,
                        remaining = kept.len(),
                        "dropped rows left unlabeled by label limit"
                    );
                }
                (Cow::Owned(limited), kept)
            }
            None => (Cow::Borrowed(matrix), (0..matrix.len()).collect()),
        };

        // 2. Seeded sample of the pool.
        let requested = config.total();
        if candidates.len() < requested {
            return Err(SplitError::InsufficientData {
                requested,
                available: candidates.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let pool: Vec<usize> = rand::seq::index::sample(&mut rng, candidates.len(), requested)
            .into_iter()
            .map(|i| candidates[i])
            .collect();

        let rows: Vec<&LabelRow> = pool.iter().map(|&r| &working.examples()[r].labels).collect();
        let universe = working.universe();

        let mut support = vec![0usize; universe.len()];
        for row in &rows {
            for label in row.iter() {
                support[label] += 1;
            }
        }
        let degenerate_labels: Vec<SplitError> = support
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count == 0)
            .map(|(i, _)| SplitError::DegenerateLabel {
                label: universe.name(i).unwrap_or_default().to_string(),
            })
            .collect();
        for err in &degenerate_labels {
            warn!(%err, "label cannot be stratified");
        }

        // 3. Stratify into [test, train].
        let mut capacities = [0usize; 2];
        capacities[TEST_FOLD] = config.n_test;
        capacities[TRAIN_FOLD] = config.n_train;
        let assignment = stratify(&rows, universe.len(), &capacities);

        // 4. Re-index each fold, keeping pool order.
        let fold_rows = |fold: usize| -> Vec<usize> {
            pool.iter()
                .zip(&assignment)
                .filter(|&(_, &f)| f == fold)
                .map(|(&r, _)| r)
                .collect()
        };
        let train_rows = fold_rows(TRAIN_FOLD);
        let test_rows = fold_rows(TEST_FOLD);

        let split = Split {
            train: Partition {
                matrix: working.select(&train_rows),
                source_rows: train_rows,
            },
            test: Partition {
                matrix: working.select(&test_rows),
                source_rows: test_rows,
            },
            degenerate_labels,
        };

        info!(
            train = split.train.len(),
            test = split.test.len(),
            labels = universe.len(),
            seed = config.seed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "stratified split complete"
        );
        Ok(split)
    }
}

/// Assign each row to a fold so fold sizes equal `capacities` exactly.
///
/// `rows[i]` is the label set of pool position `i`; the returned vector holds
/// the fold index for each position. Labels at or beyond `width` are ignored.
///
/// # Panics
///
/// Panics if `capacities` does not sum to `rows.len()`.
pub fn stratify(rows: &[&LabelRow], width: usize, capacities: &[usize]) -> Vec<usize> {
    let total = rows.len();
    assert_eq!(
        capacities.iter().sum::<usize>(),
        total,
        "fold capacities must cover every row"
    );
    if total == 0 {
        return Vec::new();
    }

    let shares: Vec<f64> = capacities
        .iter()
        .map(|&c| c as f64 / total as f64)
        .collect();

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); width];
    for (pos, row) in rows.iter().enumerate() {
        for label in row.iter().filter(|&l| l < width) {
            members[label].push(pos);
        }
    }

    // targets[label][fold]: examples of `label` the fold should end up with.
    // desired[label][fold]: how many of those it still wants.
    let targets: Vec<Vec<f64>> = members
        .iter()
        .map(|m| shares.iter().map(|s| m.len() as f64 * s).collect())
        .collect();
    let mut desired = targets.clone();
    let mut unassigned: Vec<usize> = members.iter().map(Vec::len).collect();
    let mut capacity = capacities.to_vec();
    let mut assignment = vec![UNASSIGNED; total];

    while let Some(label) = select_label(&unassigned) {
        let mut pending: Vec<usize> = members[label]
            .iter()
            .copied()
            .filter(|&pos| assignment[pos] == UNASSIGNED)
            .collect();
        order_examples(&mut pending, rows);

        debug!(label, pending = pending.len(), "stratifying label");

        for pos in pending {
            let unfilled = unfilled_share(&desired[label], &targets[label]);
            let Some(fold) = select_fold(&unfilled, &capacity) else {
                unreachable!("free capacity always equals unassigned rows");
            };
            assignment[pos] = fold;
            capacity[fold] -= 1;
            for l in rows[pos].iter().filter(|&l| l < width) {
                desired[l][fold] -= 1.0;
                unassigned[l] -= 1;
            }
        }
    }

    // Rows with no label only need capacity.
    for fold_slot in assignment.iter_mut().filter(|f| **f == UNASSIGNED) {
        let Some(fold) = fold_with_most_capacity(&capacity) else {
            unreachable!("free capacity always equals unassigned rows");
        };
        *fold_slot = fold;
        capacity[fold] -= 1;
    }

    assignment
}

/// Label to stratify next: fewest unassigned examples, ties to the lower index.
///
/// Labels with nothing left are skipped; `None` once every label is settled.
pub fn select_label(unassigned: &[usize]) -> Option<usize> {
    unassigned
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .min_by_key(|&(i, &count)| (count, i))
        .map(|(i, _)| i)
}

/// Order pool positions so examples with more labels come first.
pub fn order_examples(positions: &mut [usize], rows: &[&LabelRow]) {
    positions.sort_by_key(|&pos| (Reverse(rows[pos].count()), pos));
}

/// Fold for the next example of a label.
///
/// `unfilled[f]` is the fraction of fold `f`'s target for the label that is
/// still missing. Only folds with free capacity qualify. The largest unfilled
/// fraction wins, then more free capacity, then the lower fold index.
pub fn select_fold(unfilled: &[f64], capacity: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for fold in (0..capacity.len()).filter(|&f| capacity[f] > 0) {
        best = match best {
            None => Some(fold),
            Some(current) => {
                let by_desire = unfilled[fold].total_cmp(&unfilled[current]);
                let better = match by_desire {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => capacity[fold] > capacity[current],
                };
                Some(if better { fold } else { current })
            }
        };
    }
    best
}

/// Remaining desire per fold as a fraction of that fold's target.
///
/// Folds with a zero target rank last.
fn unfilled_share(desired: &[f64], targets: &[f64]) -> Vec<f64> {
    desired
        .iter()
        .zip(targets)
        .map(|(&d, &t)| if t > 0.0 { d / t } else { f64::NEG_INFINITY })
        .collect()
}

fn fold_with_most_capacity(capacity: &[usize]) -> Option<usize> {
    capacity
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c > 0)
        .max_by_key(|&(i, &c)| (c, Reverse(i)))
        .map(|(i, _)| i)
}
