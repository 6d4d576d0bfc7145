use crate::error::Result;
use serde::Deserialize;
use std::{fs, path::Path};

pub const DEFAULT_CONFIG_PATH: &str = "findoc_qa.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaSection,
    #[serde(default)]
    pub matching: MatchingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaSection {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Run `ollama stop <model>` when the session ends.
    pub stop_on_exit: bool,
}

impl Default for OllamaSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "gemma:2b".to_string(),
            timeout_secs: 60,
            stop_on_exit: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerBackend {
    Lexical,
    Ollama,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingSection {
    /// A row label is accepted only when its best score is strictly above this.
    pub threshold: f64,
    pub scorer: ScorerBackend,
    pub embedding_model: String,
}

impl Default for MatchingSection {
    fn default() -> Self {
        Self {
            threshold: crate::metrics::DEFAULT_THRESHOLD,
            scorer: ScorerBackend::Lexical,
            embedding_model: "nomic-embed-text".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Explicit paths must exist; the default path silently falls back to built-in values.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }
}
