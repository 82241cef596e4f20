//! Build a [`LabelMatrix`] from Arrow RecordBatches.
//!
//! Dataset files arrive as one text column plus one column per label. Label
//! cells are numeric or boolean; null and zero both mean "absent", any other
//! value means "present".

use arrow::array::{Array, ArrayRef, AsArray, LargeStringArray, StringArray, new_null_array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::matrix::{Example, LabelMatrix, LabelRow, LabelUniverse, MatrixError};

impl LabelMatrix {
    /// Build a matrix from batches with a `text_column` and the given label columns.
    ///
    /// Label order follows `label_columns`, which becomes the universe.
    pub fn from_batches(
        batches: &[RecordBatch],
        text_column: &str,
        label_columns: &[String],
    ) -> Result<Self, MatrixError> {
        let universe = LabelUniverse::new(label_columns.iter().cloned())?;
        let width = universe.len();
        let mut examples = Vec::new();

        for batch in batches {
            let text_col = batch
                .column_by_name(text_column)
                .ok_or_else(|| MatrixError::MissingColumn(text_column.to_string()))?;
            if !matches!(text_col.data_type(), DataType::Utf8 | DataType::LargeUtf8) {
                return Err(MatrixError::UnsupportedColumn {
                    column: text_column.to_string(),
                    data_type: text_col.data_type().to_string(),
                });
            }

            let label_arrays = label_columns
                .iter()
                .map(|name| label_column(batch, name))
                .collect::<Result<Vec<ArrayRef>, _>>()?;
            let label_values: Vec<_> = label_arrays
                .iter()
                .map(|a| a.as_primitive::<Float64Type>())
                .collect();

            for row in 0..batch.num_rows() {
                let text = get_string(text_col.as_ref(), row).ok_or(MatrixError::NullText {
                    row: examples.len(),
                })?;

                let mut labels = LabelRow::empty(width);
                for (i, values) in label_values.iter().enumerate() {
                    if values.is_valid(row) && values.value(row) != 0.0 {
                        labels.insert(i);
                    }
                }
                examples.push(Example { text, labels });
            }
        }

        debug!(rows = examples.len(), labels = width, "built label matrix from batches");

        let mut matrix = LabelMatrix::new(universe);
        for example in examples {
            matrix.push(example.text, example.labels)?;
        }
        Ok(matrix)
    }
}

/// Fetch a label column and widen it to Float64.
fn label_column(batch: &RecordBatch, name: &str) -> Result<ArrayRef, MatrixError> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| MatrixError::MissingColumn(name.to_string()))?;

    // An all-empty column infers as text from CSV; it carries no label.
    if col.null_count() == col.len() {
        return Ok(new_null_array(&DataType::Float64, col.len()));
    }

    let data_type = col.data_type();
    if !(data_type.is_numeric() || matches!(data_type, DataType::Boolean | DataType::Null)) {
        return Err(MatrixError::UnsupportedColumn {
            column: name.to_string(),
            data_type: data_type.to_string(),
        });
    }

    Ok(cast(col.as_ref(), &DataType::Float64)?)
}

/// Extract a string value from an Arrow array (handles Utf8 and LargeUtf8).
fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|arr| arr.value(row).to_string())
        .or_else(|| {
            col.as_any()
                .downcast_ref::<LargeStringArray>()
                .map(|arr| arr.value(row).to_string())
        })
}
