//! Dataset ingestion: CSV and Parquet files into Arrow batches and label matrices.

mod dataset;
mod error;

pub use dataset::{load_matrix, read_batches, read_csv, read_parquet};
pub use error::StoreError;
