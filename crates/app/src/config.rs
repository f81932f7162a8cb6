use anyhow::{Context, Result};
use kassa_categorize::EngineConfig;
use kassa_core::{CandidateSet, CategoryOption};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Ledger database; defaults to the platform data directory.
    pub database: Option<PathBuf>,
    pub engine: EngineConfig,
    /// Budget categories offered to the classifier.
    pub categories: Vec<CategoryOption>,
}

impl AppConfig {
    pub fn candidates(&self) -> CandidateSet {
        CandidateSet::new(self.categories.clone())
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("se", "kassa", "Kassa")
        .context("no home directory to place the ledger in")?;
    Ok(project_dirs.data_dir().to_path_buf())
}

/// Reads `path` when given and present; otherwise every setting is defaulted.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(p) = path else {
        return Ok(AppConfig::default());
    };
    if !p.exists() {
        tracing::info!(path = %p.display(), "config file not found; using defaults");
        return Ok(AppConfig::default());
    }

    let s = std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    let cfg: AppConfig = toml::from_str(&s).with_context(|| format!("parse {}", p.display()))?;
    cfg.engine
        .validate()
        .with_context(|| format!("validate {}", p.display()))?;
    Ok(cfg)
}

pub fn database_path(cfg: &AppConfig) -> Result<PathBuf> {
    match &cfg.database {
        Some(path) => Ok(path.clone()),
        None => {
            let dir = default_data_dir()?;
            std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
            Ok(dir.join("ledger.db"))
        }
    }
}
