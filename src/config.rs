use crate::catalog::CatalogConfig;
use crate::generation::GenerationConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file when `--config` is not given.
pub const SURVEY_CONFIG_ENV: &str = "SURVEY_CONFIG";

const DEFAULT_SURVEY_YAML: &str = include_str!("../survey.yaml");

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SurveyConfig {
    pub catalog: CatalogConfig,
    pub generation: GenerationConfig,
}

impl SurveyConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid survey config: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).context("Failed to parse survey config as YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// The configuration embedded in the binary.
    pub fn default_config() -> Result<Self> {
        Self::from_yaml(DEFAULT_SURVEY_YAML).context("Embedded survey.yaml is invalid")
    }

    /// Loads the config named by the flag, then `$SURVEY_CONFIG`, then the
    /// embedded default.
    pub fn resolve(flag: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var(SURVEY_CONFIG_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        match flag.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading survey config");
                Self::load(&path)
            }
            None => Self::default_config(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.catalog.validate().context("catalog")?;
        self.generation.validate()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
