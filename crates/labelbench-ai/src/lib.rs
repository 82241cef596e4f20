//! Embedding and retrieval layer: text embedders, a similarity index, and the
//! neighbor-vote multi-label classifier built on them.

pub mod embedding;
pub mod index;
pub mod retrieval;
pub mod scores;

#[cfg(feature = "onnx")]
mod embedder;
#[cfg(feature = "onnx")]
pub use embedder::{DEFAULT_MODEL, Embedder};

pub use embedding::{DEFAULT_DIM, HashingEmbedder, TextEmbedder};
pub use index::{EmbeddingIndex, FlatIndex, Neighbor};
pub use retrieval::{ClassifierError, RetrievalClassifier, RetrievalConfig, score_neighbors};
pub use scores::{PredictionTable, ScoreTable};
