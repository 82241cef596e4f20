//! Dataset source registry: where each benchmark dataset lives and which
//! columns hold its text and labels.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unknown data source: {0}")]
    UnknownSource(String),

    #[error("duplicate data source: {0}")]
    DuplicateSource(String),

    #[error("reading source config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing source config: {0}")]
    Json(#[from] serde_json::Error),
}

/// One dataset file and its column layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    pub path: PathBuf,
    pub text_column: String,
    /// Label columns in universe order.
    pub label_columns: Vec<String>,
}

impl DataSource {
    fn new(name: &str, path: PathBuf, text_column: &str, label_columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            path,
            text_column: text_column.to_string(),
            label_columns: label_columns.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Ordered set of named data sources.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<DataSource>,
}

impl SourceRegistry {
    /// The four benchmark datasets, with paths under `data_dir`.
    pub fn builtin(data_dir: &Path) -> Self {
        let sources = vec![
            DataSource::new(
                "goemotions",
                data_dir.join("goemotions/data/full_dataset/goemotions_1.csv"),
                "text",
                &[
                    "admiration", "amusement", "anger", "annoyance", "approval", "caring",
                    "confusion", "curiosity", "desire", "disappointment", "disapproval",
                    "disgust", "embarrassment", "excitement", "fear", "gratitude", "grief",
                    "joy", "love", "nervousness", "optimism", "pride", "realization",
                    "relief", "remorse", "sadness", "surprise", "neutral",
                ],
            ),
            DataSource::new(
                "just_dance",
                data_dir.join("just_dance/jd-multi-label-dataset.csv"),
                "originalText",
                &[
                    "Usability", "UX", "H-QOL", "Memorability", "Learnability", "Efficiency",
                    "Errors/Effectiveness", "Satisfaction", "Aesthetics and Appeal",
                    "Affect and Emotion", "Anticipation", "Comfort", "Detailed Usability",
                    "Enchantment", "Engagement", "Enjoyment and Fun", "Frustration", "Hedonic",
                    "Impact", "Likeability", "Motivation", "Overall Usability", "Pleasure",
                    "Support", "Trust", "User Differences", "Bodily image and Appearance",
                    "Concentration", "Energy", "Fatigue", "Learning", "Memory",
                    "Negative feelings", "Pain and Discomfort", "Personal relationships",
                    "Positive feelings", "Self-esteem", "Sexual activity", "Sleep and Rest",
                    "Social support", "Thinking",
                ],
            ),
            DataSource::new(
                "pubmed",
                data_dir.join("pubmed/PubMed Multi Label Text Classification Dataset Processed.csv"),
                "abstractText",
                &["A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "L", "M", "N", "Z"],
            ),
            DataSource::new(
                "research_papers",
                data_dir.join("research_papers/train.csv"),
                "ABSTRACT",
                &[
                    "Computer Science", "Physics", "Mathematics", "Statistics",
                    "Quantitative Biology", "Quantitative Finance",
                ],
            ),
        ];
        Self { sources }
    }

    /// Parse a JSON array of [`DataSource`]. Relative paths resolve against `data_dir`.
    pub fn from_json(json: &str, data_dir: &Path) -> Result<Self, SourceError> {
        let mut sources: Vec<DataSource> = serde_json::from_str(json)?;
        for source in &mut sources {
            if source.path.is_relative() {
                source.path = data_dir.join(&source.path);
            }
        }

        let mut registry = Self::default();
        for source in sources {
            registry.insert(source)?;
        }
        Ok(registry)
    }

    /// Load a registry from a JSON file (see [`from_json`](Self::from_json)).
    pub fn from_json_file(path: &Path, data_dir: &Path) -> Result<Self, SourceError> {
        let json = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json, data_dir)
    }

    pub fn insert(&mut self, source: DataSource) -> Result<(), SourceError> {
        if self.sources.iter().any(|s| s.name == source.name) {
            return Err(SourceError::DuplicateSource(source.name));
        }
        self.sources.push(source);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&DataSource, SourceError> {
        self.sources
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SourceError::UnknownSource(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
