use labelbench_core::MatrixError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset file not found: {}", .0.display())]
    FileNotFound(std::path::PathBuf),

    #[error("unsupported dataset format: {}", .0.display())]
    UnsupportedFormat(std::path::PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}
