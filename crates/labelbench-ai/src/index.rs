//! Similarity search over labeled example texts.
//!
//! [`EmbeddingIndex`] is the seam between the classifier and whatever
//! nearest-neighbor engine backs it. [`FlatIndex`] is the brute-force
//! implementation: every query scans all stored vectors.

use labelbench_core::LabelRow;
use tracing::debug;

use crate::embedding::{TextEmbedder, cosine_sim};

const EMBED_BATCH_SIZE: usize = 256;

/// One search hit: how close the stored example is, and the labels it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub similarity: f32,
    pub labels: LabelRow,
}

/// Insert-then-query store of texts with label metadata.
pub trait EmbeddingIndex {
    /// Add texts, each with its label set. Both slices must have equal length.
    fn insert(&mut self, texts: &[&str], metadata: Vec<LabelRow>) -> anyhow::Result<()>;

    /// Up to `k` stored entries, most similar first.
    fn query(&self, text: &str, k: usize) -> anyhow::Result<Vec<Neighbor>>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Brute-force cosine index over embedded texts.
pub struct FlatIndex<E> {
    embedder: E,
    vectors: Vec<Vec<f32>>,
    metadata: Vec<LabelRow>,
}

impl<E: TextEmbedder> FlatIndex<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            vectors: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }
}

impl<E: TextEmbedder> EmbeddingIndex for FlatIndex<E> {
    fn insert(&mut self, texts: &[&str], metadata: Vec<LabelRow>) -> anyhow::Result<()> {
        anyhow::ensure!(
            texts.len() == metadata.len(),
            "got {} texts but {} metadata entries",
            texts.len(),
            metadata.len()
        );

        let dim = self.embedder.dim();
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(EMBED_BATCH_SIZE) {
            let batch = self.embedder.embed_batch(chunk)?;
            anyhow::ensure!(
                batch.len() == chunk.len(),
                "embedder returned {} vectors for {} texts",
                batch.len(),
                chunk.len()
            );
            for v in &batch {
                anyhow::ensure!(v.len() == dim, "expected {dim}-dim vector, got {}", v.len());
            }
            vectors.extend(batch);
        }

        self.vectors.extend(vectors);
        self.metadata.extend(metadata);
        debug!(inserted = texts.len(), total = self.vectors.len(), "flat index insert");
        Ok(())
    }

    fn query(&self, text: &str, k: usize) -> anyhow::Result<Vec<Neighbor>> {
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let q = self.embedder.embed(text)?;
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_sim(&q, v)))
            .collect();

        // Stable sort: equal similarity keeps insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, similarity)| Neighbor {
                similarity,
                labels: self.metadata[i].clone(),
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    /// Embedder that returns preset vectors keyed by text.
    struct TableEmbedder(Vec<(&'static str, Vec<f32>)>);

    impl TextEmbedder for TableEmbedder {
        fn dim(&self) -> usize {
            2
        }

        fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
            texts
                .iter()
                .map(|t| {
                    self.0
                        .iter()
                        .find(|(k, _)| k == t)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| anyhow::anyhow!("no vector for {t}"))
                })
                .collect()
        }
    }

    fn row(bits: &[bool]) -> LabelRow {
        LabelRow::from_bools(bits)
    }

    fn table_index() -> FlatIndex<TableEmbedder> {
        let mut index = FlatIndex::new(TableEmbedder(vec![
            ("east", vec![1.0, 0.0]),
            ("north", vec![0.0, 1.0]),
            ("northeast", vec![1.0, 1.0]),
            ("query", vec![1.0, 0.2]),
            ("east again", vec![1.0, 0.0]),
        ]));
        index
            .insert(
                &["east", "north", "northeast"],
                vec![row(&[true, false]), row(&[false, true]), row(&[true, true])],
            )
            .unwrap();
        index
    }

    #[test]
    fn query_orders_by_similarity() {
        let index = table_index();
        let hits = index.query("query", 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].labels, row(&[true, false]));
        assert_eq!(hits[1].labels, row(&[true, true]));
        assert_eq!(hits[2].labels, row(&[false, true]));
        assert!(hits[0].similarity >= hits[1].similarity);
        assert!(hits[1].similarity >= hits[2].similarity);
    }

    #[test]
    fn query_caps_at_k_and_len() {
        let index = table_index();
        assert_eq!(index.query("query", 2).unwrap().len(), 2);
        assert_eq!(index.query("query", 10).unwrap().len(), 3);
        assert!(index.query("query", 0).unwrap().is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = table_index();
        index
            .insert(&["east again"], vec![row(&[false, false])])
            .unwrap();
        let hits = index.query("east", 2).unwrap();
        assert_eq!(hits[0].labels, row(&[true, false]));
        assert_eq!(hits[1].labels, row(&[false, false]));
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = FlatIndex::new(HashingEmbedder::new(8));
        assert!(index.is_empty());
        assert!(index.query("anything", 4).unwrap().is_empty());
    }

    #[test]
    fn insert_length_mismatch_errors() {
        let mut index = FlatIndex::new(HashingEmbedder::new(8));
        let err = index.insert(&["a", "b"], vec![row(&[true])]).unwrap_err();
        assert!(err.to_string().contains("2 texts"));
        assert!(index.is_empty());
    }

    #[test]
    fn embedder_errors_propagate() {
        let index = table_index();
        let err = index.query("unknown", 1).unwrap_err();
        assert!(err.to_string().contains("no vector for unknown"));
    }

    #[test]
    fn hashing_index_finds_exact_text_first() {
        let mut index = FlatIndex::new(HashingEmbedder::default());
        index
            .insert(
                &["stock prices fell sharply", "the team won the final", "rain expected tomorrow"],
                vec![row(&[true, false]), row(&[false, true]), row(&[false, false])],
            )
            .unwrap();
        assert_eq!(index.len(), 3);

        let hits = index.query("the team won the final", 1).unwrap();
        assert_eq!(hits[0].labels, row(&[false, true]));
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
    }
}
