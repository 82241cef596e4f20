//! Text embedding capability and a model-free hashing embedder.

use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

/// Default embedding width, matching all-MiniLM-L6-v2.
pub const DEFAULT_DIM: usize = 384;

/// Maps text to a fixed-length vector.
///
/// Implementations must be usable from several threads at once; queries over
/// independent texts run in parallel.
pub trait TextEmbedder: Send + Sync {
    /// Length of every vector this embedder produces.
    fn dim(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

impl<E: TextEmbedder + ?Sized> TextEmbedder for Arc<E> {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

impl<E: TextEmbedder + ?Sized> TextEmbedder for Box<E> {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

/// Signed feature hashing over lowercase word tokens.
///
/// Deterministic and model-free: texts sharing words get similar vectors.
/// Tokens are hashed with XXH3-64, so vectors are identical across builds and
/// platforms. Output is L2-normalized; text without any word maps to the zero
/// vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

impl HashingEmbedder {
    /// `dim` of zero is raised to one.
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in tokens(text) {
            let h = xxh3_64(token.as_bytes());
            let bucket = (h % self.dim as u64) as usize;
            // Top bit picks the sign so collisions tend to cancel.
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        normalize(&mut v);
        v
    }
}

impl TextEmbedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// L2-normalize a vector in place.
pub(crate) fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity; zero when either side has no magnitude.
pub(crate) fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic_and_unit_norm() {
        let e = HashingEmbedder::new(64);
        let a = e.embed("Physics of granular flows").unwrap();
        let b = e.embed("Physics of granular flows").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "expected unit norm, got {norm}");
    }

    #[test]
    fn single_token_lands_in_its_xxh3_bucket() {
        let e = HashingEmbedder::new(32);
        let v = e.embed("Goal!").unwrap();

        let h = xxh3_64(b"goal");
        let bucket = (h % 32) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        for (i, &x) in v.iter().enumerate() {
            assert_eq!(x, if i == bucket { sign } else { 0.0 }, "dimension {i}");
        }
    }

    #[test]
    fn case_and_punctuation_ignored() {
        let e = HashingEmbedder::new(128);
        let a = e.embed("Great game, loved it!").unwrap();
        let b = e.embed("great GAME loved it").unwrap();
        assert!((cosine_sim(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_words_are_closer() {
        let e = HashingEmbedder::default();
        let q = e.embed("neural network training").unwrap();
        let near = e.embed("training a neural network").unwrap();
        let far = e.embed("quarterly bond yields").unwrap();
        assert!(cosine_sim(&q, &near) > cosine_sim(&q, &far));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(8);
        let v = e.embed("  ... ").unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
        assert_eq!(cosine_sim(&v, &v), 0.0);
    }

    #[test]
    fn batch_keeps_order() {
        let e = HashingEmbedder::new(32);
        let batch = e.embed_batch(&["one", "two"]).unwrap();
        assert_eq!(batch[0], e.embed("one").unwrap());
        assert_eq!(batch[1], e.embed("two").unwrap());
        assert!(e.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn shared_embedder_through_arc() {
        let e: Arc<dyn TextEmbedder> = Arc::new(HashingEmbedder::new(16));
        assert_eq!(e.dim(), 16);
        assert_eq!(e.embed("x").unwrap().len(), 16);
    }
}
