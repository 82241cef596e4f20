//! Sentence-transformers embeddings through ONNX Runtime.
//!
//! A model directory holds `model.onnx` and `tokenizer.json`. Token vectors
//! are averaged under the attention mask and L2-normalized.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::{Tensor, ValueType};
use tokenizers::{Encoding, PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::embedding::{DEFAULT_DIM, TextEmbedder, normalize};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

const MAX_TOKENS: usize = 256;

/// ONNX sentence embedder.
///
/// `Session::run` needs `&mut`, so the session is locked per batch while the
/// embedder itself is shared across query threads.
pub struct Embedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dim: usize,
}

impl Embedder {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        for required in [&model_path, &tokenizer_path] {
            anyhow::ensure!(required.exists(), "missing {}", required.display());
        }

        let session = Session::builder()?.commit_from_file(&model_path)?;
        let dim = session
            .outputs()
            .first()
            .and_then(|o| output_width(o.dtype()))
            .unwrap_or(DEFAULT_DIM);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("tokenizer {}: {e}", tokenizer_path.display()))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("tokenizer truncation: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        info!(dim, model = %model_path.display(), "embedding model ready");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dim,
        })
    }

    fn encode(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        let rows = encodings.len();
        let width = encodings.iter().map(|e| e.len()).max().unwrap_or(0);

        let ids = token_matrix(&encodings, width, Encoding::get_ids);
        let mask = token_matrix(&encodings, width, Encoding::get_attention_mask);
        let types = token_matrix(&encodings, width, Encoding::get_type_ids);

        let shape = [rows as i64, width as i64];
        let inputs = ort::inputs![
            "input_ids" => Tensor::from_array((shape, ids.into_boxed_slice()))?,
            "attention_mask" => Tensor::from_array((shape, mask.clone().into_boxed_slice()))?,
            "token_type_ids" => Tensor::from_array((shape, types.into_boxed_slice()))?,
        ];

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("embedding session lock poisoned"))?;
        let outputs = session.run(inputs)?;
        let (out_shape, hidden) = outputs[0].try_extract_tensor::<f32>()?;
        let out: &[i64] = out_shape;
        anyhow::ensure!(
            out.len() == 3 && out[0] as usize == rows && out[2] as usize == self.dim,
            "model returned shape {out:?}, wanted [{rows}, _, {}]",
            self.dim
        );
        let tokens = out[1] as usize;

        debug!(rows, tokens, "ran embedding model");
        Ok((0..rows)
            .map(|r| {
                let row_mask = &mask[r * width..(r + 1) * width];
                let row_hidden = &hidden[r * tokens * self.dim..(r + 1) * tokens * self.dim];
                mean_pool(row_hidden, row_mask, self.dim)
            })
            .collect())
    }
}

impl TextEmbedder for Embedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.encode(texts)
    }
}

/// Row-major `[encodings.len(), width]` matrix of one encoding field, zero padded.
fn token_matrix(encodings: &[Encoding], width: usize, field: fn(&Encoding) -> &[u32]) -> Vec<i64> {
    let mut out = vec![0i64; encodings.len() * width];
    for (row, encoding) in out.chunks_mut(width.max(1)).zip(encodings) {
        for (slot, &v) in row.iter_mut().zip(field(encoding)) {
            *slot = i64::from(v);
        }
    }
    out
}

/// Average the token vectors of one text whose mask is set, then normalize.
///
/// `hidden` is `[tokens, dim]`; mask entries past `tokens` are ignored.
fn mean_pool(hidden: &[f32], mask: &[i64], dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let mut weight = 0.0f32;
    for (token, &m) in hidden.chunks(dim).zip(mask) {
        if m == 0 {
            continue;
        }
        let m = m as f32;
        for (p, &h) in pooled.iter_mut().zip(token) {
            *p += h * m;
        }
        weight += m;
    }
    if weight > 0.0 {
        pooled.iter_mut().for_each(|p| *p /= weight);
    }
    normalize(&mut pooled);
    pooled
}

/// Trailing dimension of a tensor output, when the model declares it.
fn output_width(value_type: &ValueType) -> Option<usize> {
    match value_type {
        ValueType::Tensor { shape, .. } => shape.last().copied().filter(|&d| d > 0).map(|d| d as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_sim;
    use std::path::PathBuf;

    #[test]
    fn mean_pool_skips_padding() {
        // Two real tokens and one padding token, dim 2.
        let hidden = [1.0, 0.0, 3.0, 0.0, 100.0, 100.0];
        let pooled = mean_pool(&hidden, &[1, 1, 0], 2);
        assert_eq!(pooled, vec![1.0, 0.0]);
    }

    #[test]
    fn token_matrix_of_no_encodings_is_empty() {
        assert!(token_matrix(&[], 4, Encoding::get_ids).is_empty());
    }

    /// Local copy of the default model, e.g. fetched with
    /// `huggingface-cli download sentence-transformers/all-MiniLM-L6-v2 --local-dir models/all-MiniLM-L6-v2`.
    fn local_model() -> Option<Embedder> {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models/all-MiniLM-L6-v2");
        if !dir.join("model.onnx").exists() {
            eprintln!("skipping: no model at {}", dir.display());
            return None;
        }
        Some(Embedder::load(&dir).unwrap())
    }

    #[test]
    fn vectors_have_model_width_and_unit_norm() {
        let Some(embedder) = local_model() else { return };
        assert_eq!(embedder.dim(), 384);

        let vecs = embedder
            .embed_batch(&["so funny", "this is infuriating", "a bound on the spectral gap"])
            .unwrap();
        assert_eq!(vecs.len(), 3);
        for v in &vecs {
            assert_eq!(v.len(), 384);
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4, "norm {norm}");
        }
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn related_sentences_score_higher() {
        let Some(embedder) = local_model() else { return };
        let paper = embedder.embed("We train a convolutional network for image segmentation").unwrap();
        let related = embedder.embed("Deep neural networks for semantic segmentation").unwrap();
        let unrelated = embedder.embed("The recipe needs two cups of flour").unwrap();
        assert!(cosine_sim(&paper, &related) > cosine_sim(&paper, &unrelated));
    }
}
