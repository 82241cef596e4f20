//! Per-label example counts across a train/test split.

use crate::matrix::LabelMatrix;

/// Label counts for one split, in universe order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDistribution {
    pub labels: Vec<String>,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// One line of a [`LabelDistribution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelCount<'a> {
    pub label: &'a str,
    pub train: usize,
    pub test: usize,
}

impl LabelDistribution {
    /// Count labels in both partitions. Both must share a universe.
    pub fn from_partitions(train: &LabelMatrix, test: &LabelMatrix) -> Self {
        Self {
            labels: train.universe().names().to_vec(),
            train: train.label_counts(),
            test: test.label_counts(),
            train_rows: train.len(),
            test_rows: test.len(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = LabelCount<'_>> {
        self.labels
            .iter()
            .zip(self.train.iter().zip(&self.test))
            .map(|(label, (&train, &test))| LabelCount {
                label: label.as_str(),
                train,
                test,
            })
    }

    /// Labels with no example in one of the partitions.
    pub fn one_sided(&self) -> Vec<&str> {
        self.iter()
            .filter(|c| (c.train == 0) != (c.test == 0))
            .map(|c| c.label)
            .collect()
    }
}
