//! Image call adapter.
//!
//! The survey core only depends on the `ImageGenerator` trait: a prompt plus an
//! optional reference image in, an encoded image or a `GenerationError` out.
//! Two backends are provided: a local image filter standing in for the model,
//! and an HTTP client for a real endpoint. `GenerationService` produces the two
//! outputs a generate-and-compare question shows side by side.

mod filter;
mod http;

pub use filter::{FilterEffect, FilterGenerator};
pub use http::HttpGenerator;

use crate::errors::GenerationError;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Input for a single generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub reference_image: Option<Vec<u8>>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reference_image: None,
        }
    }

    pub fn with_reference(mut self, bytes: Vec<u8>) -> Self {
        self.reference_image = Some(bytes);
        self
    }

    /// Attaches the reference image at `path`. A blank path attaches nothing.
    pub fn with_reference_path(self, path: &str) -> Result<Self, GenerationError> {
        let path = path.trim();
        if path.is_empty() {
            return Ok(self);
        }
        let bytes = std::fs::read(path).map_err(|e| GenerationError::ReferenceImage {
            message: format!("{}: {}", path, e),
        })?;
        Ok(self.with_reference(bytes))
    }
}

/// An encoded PNG image returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Name of the backend that produced the image.
    pub backend: String,
    /// Where the image was written, when an output directory is configured.
    pub saved_to: Option<PathBuf>,
}

/// The two outputs shown by a generate-and-compare question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPair {
    pub first: GeneratedImage,
    pub second: GeneratedImage,
}

/// External image generation collaborator.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest)
        -> Result<GeneratedImage, GenerationError>;
}

/// Backend selection for one comparison slot.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendConfig {
    Filter {
        #[serde(default)]
        effect: FilterEffect,
        #[serde(default = "default_filter_size")]
        size: u32,
    },
    Http {
        endpoint: String,
        /// Environment variable holding a bearer token, if the endpoint needs one.
        #[serde(default)]
        api_key_env: Option<String>,
    },
}

fn default_filter_size() -> u32 {
    512
}

/// The `generation` section of the survey config.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    pub first: BackendConfig,
    pub second: BackendConfig,
}

fn default_timeout_secs() -> u64 {
    30
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("generation.timeout_secs must be at least 1");
        }
        for (slot, backend) in [("first", &self.first), ("second", &self.second)] {
            match backend {
                BackendConfig::Filter { size, effect } => {
                    if *size < 16 {
                        bail!("generation.{}.size must be at least 16 pixels", slot);
                    }
                    effect.validate().with_context(|| format!("generation.{}", slot))?;
                }
                BackendConfig::Http { endpoint, .. } => {
                    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                        bail!(
                            "generation.{}.endpoint must be an http(s) URL, got '{}'",
                            slot,
                            endpoint
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

fn build_backend(slot: &str, config: &BackendConfig, timeout: Duration) -> Arc<dyn ImageGenerator> {
    match config {
        BackendConfig::Filter { effect, size } => {
            Arc::new(FilterGenerator::new(slot, effect.clone(), *size))
        }
        BackendConfig::Http {
            endpoint,
            api_key_env,
        } => {
            let api_key = api_key_env
                .as_deref()
                .and_then(|name| std::env::var(name).ok());
            Arc::new(HttpGenerator::new(slot, endpoint.clone(), api_key, timeout))
        }
    }
}

/// Runs both comparison backends for a prompt under a shared timeout.
pub struct GenerationService {
    first: Arc<dyn ImageGenerator>,
    second: Arc<dyn ImageGenerator>,
    timeout: Duration,
    output_dir: Option<PathBuf>,
}

impl GenerationService {
    pub fn new(
        first: Arc<dyn ImageGenerator>,
        second: Arc<dyn ImageGenerator>,
        timeout: Duration,
    ) -> Self {
        Self {
            first,
            second,
            timeout,
            output_dir: None,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let service = Self::new(
            build_backend("first", &config.first, timeout),
            build_backend("second", &config.second, timeout),
            timeout,
        );
        match &config.output_dir {
            Some(dir) => service.with_output_dir(dir.clone()),
            None => service,
        }
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    /// Generates the two comparison images.
    ///
    /// An empty prompt fails fast without calling either backend. Either
    /// backend failing fails the pair.
    pub async fn generate_pair(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedPair, GenerationError> {
        if request.prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        tracing::debug!(
            first = self.first.name(),
            second = self.second.name(),
            has_reference = request.reference_image.is_some(),
            "Generating comparison pair"
        );

        let work = async {
            let (first, second) = tokio::join!(
                self.first.generate(&request),
                self.second.generate(&request)
            );
            Ok::<_, GenerationError>(GeneratedPair {
                first: first?,
                second: second?,
            })
        };

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    /// Writes the pair under `<output_dir>/<session_id>/` when an output
    /// directory is configured, recording the paths on the images.
    pub fn save_pair(
        &self,
        session_id: &str,
        question_key: &str,
        pair: &mut GeneratedPair,
    ) -> Result<()> {
        let Some(root) = &self.output_dir else {
            return Ok(());
        };
        let dir = root.join(session_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create image directory: {}", dir.display()))?;

        for (label, image) in [("a", &mut pair.first), ("b", &mut pair.second)] {
            let path = dir.join(format!("{}-{}.png", question_key, label));
            write_image(&path, &image.bytes)?;
            image.saved_to = Some(path);
        }
        Ok(())
    }
}

fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write generated image: {}", path.display()))
}

#[cfg(test)]
#[path = "../tests/generation_tests.rs"]
mod tests;
