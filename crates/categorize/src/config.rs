use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aliases::MerchantAlias;
use crate::patterns::{PatternTable, PatternTableError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid pattern table {path}: {source}")]
    Patterns {
        path: PathBuf,
        #[source]
        source: PatternTableError,
    },
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    pub endpoint: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:54321/functions/v1/categorize-transaction".to_string(),
            token_env: "KASSA_CLASSIFIER_TOKEN".to_string(),
            timeout_ms: 15_000,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub size: usize,
    pub pause_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 5,
            pause_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Feedback rows fetched per keyword.
    pub keyword_limit: usize,
    /// Distinct-category examples forwarded to the remote classifier.
    pub max_examples: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            keyword_limit: 3,
            max_examples: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub batch: BatchConfig,
    pub history: HistoryConfig,
    /// TOML pattern table replacing the built-in one.
    pub patterns: Option<PathBuf>,
    /// Appended to the built-in merchant aliases.
    pub merchant_aliases: Vec<MerchantAlias>,
}

impl EngineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.size == 0 {
            return Err(ConfigError::Invalid(
                "batch.size must be at least 1".to_string(),
            ));
        }
        if self.classifier.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "classifier.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured pattern file, or the built-in table when none is set.
    pub fn load_pattern_table(&self) -> Result<PatternTable, ConfigError> {
        match &self.patterns {
            Some(path) => load_pattern_file(path),
            None => Ok(PatternTable::builtin()),
        }
    }
}

fn load_pattern_file(path: &Path) -> Result<PatternTable, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    PatternTable::from_toml(&content).map_err(|source| ConfigError::Patterns {
        path: path.to_path_buf(),
        source,
    })
}
