//! Core types for multi-label benchmark datasets: the label matrix, the
//! stratified train/test partitioner and the data source registry.

mod batch;
pub mod distribution;
pub mod matrix;
pub mod source;
pub mod split;

pub use distribution::{LabelCount, LabelDistribution};
pub use matrix::{Example, LabelMatrix, LabelRow, LabelUniverse, MatrixError};
pub use source::{DataSource, SourceError, SourceRegistry};
pub use split::{Partition, Split, SplitConfig, SplitError, StratifiedPartitioner};
