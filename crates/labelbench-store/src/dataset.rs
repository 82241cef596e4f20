//! Read dataset files into Arrow RecordBatches and build label matrices.
//!
//! The format is picked from the file extension: `.csv` goes through the Arrow
//! CSV reader with schema inference over the whole file, `.parquet` through
//! the Parquet Arrow reader.

use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::record_batch::RecordBatch;
use labelbench_core::{DataSource, LabelMatrix};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use crate::StoreError;

const CSV_BATCH_SIZE: usize = 8192;

/// Load a data source into a [`LabelMatrix`] using its text and label columns.
pub fn load_matrix(source: &DataSource) -> Result<LabelMatrix, StoreError> {
    let start = Instant::now();
    info!(source = %source.name, path = %source.path.display(), "loading data source");

    let batches = read_batches(&source.path)?;
    let matrix = LabelMatrix::from_batches(&batches, &source.text_column, &source.label_columns)?;

    info!(
        source = %source.name,
        rows = matrix.len(),
        labels = matrix.universe().len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "loaded data source"
    );
    Ok(matrix)
}

/// Read a `.csv` or `.parquet` file into RecordBatches.
pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    if !path.exists() {
        return Err(StoreError::FileNotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => read_csv(path),
        Some("parquet") => read_parquet(path),
        _ => Err(StoreError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Read a CSV file with a header row, inferring column types.
pub fn read_csv(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let mut file = File::open(path)?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, None)?;
    file.rewind()?;

    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_header(true)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(file)?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Read a Parquet file into Arrow RecordBatches.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use labelbench_core::MatrixError;
    use parquet::arrow::ArrowWriter;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn source(path: PathBuf, labels: &[&str]) -> DataSource {
        DataSource {
            name: "toy".into(),
            path,
            text_column: "text".into(),
            label_columns: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn csv_to_matrix() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "toy.csv",
            "id,text,joy,anger\n\
             1,\"what a day, honestly\",1,0\n\
             2,so annoyed,0,1\n\
             3,meh,,\n",
        );

        let m = load_matrix(&source(path, &["joy", "anger"])).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.texts(), vec!["what a day, honestly", "so annoyed", "meh"]);
        assert_eq!(m.label_counts(), vec![1, 1]);
        assert!(m.examples()[2].labels.is_empty());
    }

    #[test]
    fn csv_float_labels() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "f.csv", "text,a\nx,1.0\ny,0.0\n");
        let m = load_matrix(&source(path, &["a"])).unwrap();
        assert_eq!(m.label_counts(), vec![1]);
    }

    #[test]
    fn parquet_to_matrix() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("toy.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("text", DataType::Utf8, false),
            Field::new("a", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["x", "y"])),
                Arc::new(Int64Array::from(vec![Some(1), None])),
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let m = load_matrix(&source(path, &["a"])).unwrap();
        assert_eq!(m.texts(), vec!["x", "y"]);
        assert_eq!(m.label_counts(), vec![1]);
    }

    #[test]
    fn missing_file_errors() {
        let err = read_batches(Path::new("/nonexistent/file.csv")).unwrap_err();
        assert!(matches!(err, StoreError::FileNotFound(_)));
    }

    #[test]
    fn unsupported_extension() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "toy.tsv", "text\ta\n");
        let err = read_batches(&path).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_label_column_surfaces_matrix_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "toy.csv", "text,a\nx,1\n");
        let err = load_matrix(&source(path, &["a", "b"])).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Matrix(MatrixError::MissingColumn(ref c)) if c == "b"
        ));
    }
}
