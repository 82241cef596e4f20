//! Text + multi-label target representation.
//!
//! The label universe is resolved once, when the matrix is built. After that
//! every label is addressed by position: membership lives in a fixed-width
//! bit-set per example, never in a name lookup.

use std::collections::HashSet;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("label universe is empty")]
    EmptyUniverse,

    #[error("duplicate label in universe: {0}")]
    DuplicateLabel(String),

    #[error("unknown label: {0}")]
    UnknownLabel(String),

    #[error("label row has width {found}, universe has {expected} labels")]
    WidthMismatch { expected: usize, found: usize },

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' has unsupported type {data_type}")]
    UnsupportedColumn { column: String, data_type: String },

    #[error("null text at row {row}")]
    NullText { row: usize },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Fixed, ordered set of label names for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelUniverse {
    names: Vec<String>,
}

impl LabelUniverse {
    /// Build a universe from label names in column order.
    ///
    /// Rejects empty universes and duplicate names.
    pub fn new<I, S>(names: I) -> Result<Self, MatrixError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(MatrixError::EmptyUniverse);
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(MatrixError::DuplicateLabel(name.clone()));
            }
        }

        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Position of a label name. Only used while resolving input.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Keep only the first `n` labels (at least one). `n` past the end keeps them all.
    pub fn truncated(&self, n: usize) -> Self {
        Self {
            names: self.names.iter().take(n.max(1)).cloned().collect(),
        }
    }

    /// Resolve label names into a row for this universe.
    pub fn row_from_names(&self, names: &[&str]) -> Result<LabelRow, MatrixError> {
        let mut row = LabelRow::empty(self.len());
        for name in names {
            let index = self
                .position(name)
                .ok_or_else(|| MatrixError::UnknownLabel(name.to_string()))?;
            row.insert(index);
        }
        Ok(row)
    }
}

/// Label membership for one example: bit `i` set means label `i` is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelRow {
    words: Vec<u64>,
    width: usize,
}

impl LabelRow {
    /// A row of the given width with no labels set.
    pub fn empty(width: usize) -> Self {
        Self {
            words: vec![0; width.div_ceil(64)],
            width,
        }
    }

    pub fn from_indices<I>(width: usize, indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut row = Self::empty(width);
        for index in indices {
            row.insert(index);
        }
        row
    }

    pub fn from_bools(values: &[bool]) -> Self {
        Self::from_indices(
            values.len(),
            values
                .iter()
                .enumerate()
                .filter_map(|(i, &set)| set.then_some(i)),
        )
    }

    /// Number of label positions (the universe size), not the number set.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of labels present.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True when no label is present.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.width && self.words[index / 64] & (1 << (index % 64)) != 0
    }

    /// Set label `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= width`.
    pub fn insert(&mut self, index: usize) {
        assert!(
            index < self.width,
            "label index {index} out of range for width {}",
            self.width
        );
        self.words[index / 64] |= 1 << (index % 64);
    }

    /// Positions of the labels present, ascending.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.width).filter(|&i| self.contains(i))
    }

    /// Copy of this row restricted to the first `width` positions.
    pub fn truncated(&self, width: usize) -> Self {
        let width = width.min(self.width);
        Self::from_indices(width, self.iter().take_while(|&i| i < width))
    }
}

/// One record: text plus the labels it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub text: String,
    pub labels: LabelRow,
}

/// Ordered examples sharing one label universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatrix {
    universe: LabelUniverse,
    examples: Vec<Example>,
}

impl LabelMatrix {
    pub fn new(universe: LabelUniverse) -> Self {
        Self {
            universe,
            examples: Vec::new(),
        }
    }

    /// Append an example. The row must match the universe width.
    pub fn push(&mut self, text: impl Into<String>, labels: LabelRow) -> Result<(), MatrixError> {
        if labels.width() != self.universe.len() {
            return Err(MatrixError::WidthMismatch {
                expected: self.universe.len(),
                found: labels.width(),
            });
        }
        self.examples.push(Example {
            text: text.into(),
            labels,
        });
        Ok(())
    }

    /// Append an example whose labels are given by name.
    pub fn push_named(&mut self, text: impl Into<String>, labels: &[&str]) -> Result<(), MatrixError> {
        let row = self.universe.row_from_names(labels)?;
        self.push(text, row)
    }

    pub fn universe(&self) -> &LabelUniverse {
        &self.universe
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.text.as_str()).collect()
    }

    /// Number of examples carrying each label, in universe order.
    pub fn label_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.universe.len()];
        for example in &self.examples {
            for label in example.labels.iter() {
                counts[label] += 1;
            }
        }
        counts
    }

    /// Restrict the universe to its first `n` labels.
    ///
    /// Rows stay aligned with `self`; examples left with no label are kept
    /// here and filtered by the caller when it needs to.
    pub fn limit_labels(&self, n: usize) -> Self {
        let universe = self.universe.truncated(n);
        let width = universe.len();
        let examples = self
            .examples
            .iter()
            .map(|e| Example {
                text: e.text.clone(),
                labels: e.labels.truncated(width),
            })
            .collect();
        Self { universe, examples }
    }

    /// New matrix holding the given rows, in the given order.
    ///
    /// # Panics
    ///
    /// Panics if a row position is out of bounds.
    pub fn select(&self, rows: &[usize]) -> Self {
        Self {
            universe: self.universe.clone(),
            examples: rows.iter().map(|&r| self.examples[r].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> LabelUniverse {
        LabelUniverse::new(["A", "B", "C"]).unwrap()
    }

    #[test]
    fn universe_rejects_duplicates() {
        let err = LabelUniverse::new(["A", "B", "A"]).unwrap_err();
        assert!(matches!(err, MatrixError::DuplicateLabel(ref l) if l == "A"));
    }

    #[test]
    fn universe_rejects_empty() {
        let err = LabelUniverse::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, MatrixError::EmptyUniverse));
    }

    #[test]
    fn row_bits_across_word_boundary() {
        let mut row = LabelRow::empty(130);
        row.insert(0);
        row.insert(64);
        row.insert(129);
        assert_eq!(row.count(), 3);
        assert!(row.contains(64));
        assert!(!row.contains(63));
        assert!(!row.contains(500));
        assert_eq!(row.iter().collect::<Vec<_>>(), vec![0, 64, 129]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn row_insert_out_of_range_panics() {
        LabelRow::empty(3).insert(3);
    }

    #[test]
    fn row_truncation_drops_high_labels() {
        let row = LabelRow::from_bools(&[false, true, false, true]);
        let cut = row.truncated(2);
        assert_eq!(cut.width(), 2);
        assert_eq!(cut.iter().collect::<Vec<_>>(), vec![1]);

        let gone = row.truncated(1);
        assert!(gone.is_empty());
    }

    #[test]
    fn push_named_resolves_positions() {
        let mut m = LabelMatrix::new(abc());
        m.push_named("first", &["C", "A"]).unwrap();
        m.push_named("second", &[]).unwrap();

        assert_eq!(m.len(), 2);
        assert_eq!(m.examples()[0].labels.iter().collect::<Vec<_>>(), vec![0, 2]);
        assert!(m.examples()[1].labels.is_empty());
        assert_eq!(m.texts(), vec!["first", "second"]);
    }

    #[test]
    fn push_named_unknown_label() {
        let mut m = LabelMatrix::new(abc());
        let err = m.push_named("x", &["Z"]).unwrap_err();
        assert!(matches!(err, MatrixError::UnknownLabel(ref l) if l == "Z"));
        assert!(m.is_empty());
    }

    #[test]
    fn push_rejects_wrong_width() {
        let mut m = LabelMatrix::new(abc());
        let err = m.push("x", LabelRow::empty(2)).unwrap_err();
        assert!(matches!(
            err,
            MatrixError::WidthMismatch {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn label_counts_per_column() {
        let mut m = LabelMatrix::new(abc());
        m.push_named("a", &["A"]).unwrap();
        m.push_named("ab", &["A", "B"]).unwrap();
        m.push_named("none", &[]).unwrap();
        assert_eq!(m.label_counts(), vec![2, 1, 0]);
    }

    #[test]
    fn limit_labels_keeps_rows_aligned() {
        let mut m = LabelMatrix::new(abc());
        m.push_named("a", &["A"]).unwrap();
        m.push_named("c", &["C"]).unwrap();

        let limited = m.limit_labels(2);
        assert_eq!(limited.universe().names(), &["A", "B"]);
        assert_eq!(limited.len(), 2);
        assert!(limited.examples()[1].labels.is_empty());
        assert_eq!(limited.examples()[1].text, "c");

        // Past the end keeps everything.
        assert_eq!(m.limit_labels(10).universe().len(), 3);
    }

    #[test]
    fn select_reorders() {
        let mut m = LabelMatrix::new(abc());
        m.push_named("zero", &["A"]).unwrap();
        m.push_named("one", &["B"]).unwrap();
        m.push_named("two", &["C"]).unwrap();

        let picked = m.select(&[2, 0]);
        assert_eq!(picked.texts(), vec!["two", "zero"]);
        assert_eq!(picked.label_counts(), vec![1, 0, 1]);
    }
}
