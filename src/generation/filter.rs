//! Local stand-in for the model: applies a simple image filter.
//!
//! With a reference image the filter runs on that image (image-to-image).
//! Without one a gradient placeholder is rendered, its colors derived from the
//! prompt hash so the same prompt always yields the same picture.

use super::{GeneratedImage, GenerationRequest, ImageGenerator};
use crate::errors::GenerationError;
use anyhow::{bail, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterEffect {
    #[default]
    None,
    Grayscale,
    Blur {
        sigma: f32,
    },
    Brighten {
        amount: i32,
    },
}

impl FilterEffect {
    pub fn validate(&self) -> Result<()> {
        match self {
            FilterEffect::Blur { sigma } if !(*sigma > 0.0 && sigma.is_finite()) => {
                bail!("blur sigma must be a positive number, got {}", sigma)
            }
            FilterEffect::Brighten { amount } if amount.abs() > 255 => {
                bail!("brighten amount must be within -255..=255, got {}", amount)
            }
            _ => Ok(()),
        }
    }

    fn apply(&self, image: DynamicImage) -> DynamicImage {
        match self {
            FilterEffect::None => image,
            FilterEffect::Grayscale => image.grayscale(),
            FilterEffect::Blur { sigma } => image.blur(*sigma),
            FilterEffect::Brighten { amount } => image.brighten(*amount),
        }
    }
}

pub struct FilterGenerator {
    name: String,
    effect: FilterEffect,
    size: u32,
}

impl FilterGenerator {
    pub fn new(name: impl Into<String>, effect: FilterEffect, size: u32) -> Self {
        Self {
            name: name.into(),
            effect,
            size,
        }
    }
}

#[async_trait]
impl ImageGenerator for FilterGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        let name = self.name.clone();
        let effect = self.effect.clone();
        let size = self.size;
        let request = request.clone();

        tokio::task::spawn_blocking(move || render(&name, &effect, size, &request))
            .await
            .map_err(|e| GenerationError::backend(format!("filter task failed: {}", e)))?
    }
}

fn render(
    name: &str,
    effect: &FilterEffect,
    size: u32,
    request: &GenerationRequest,
) -> Result<GeneratedImage, GenerationError> {
    let base = match &request.reference_image {
        Some(bytes) => {
            image::load_from_memory(bytes).map_err(|e| GenerationError::ReferenceImage {
                message: e.to_string(),
            })?
        }
        None => placeholder(&request.prompt, size),
    };
    encode_png(name, &effect.apply(base))
}

fn placeholder(prompt: &str, size: u32) -> DynamicImage {
    let digest = Sha256::digest(prompt.as_bytes());
    let from = [digest[0], digest[1], digest[2]];
    let to = [digest[3], digest[4], digest[5]];
    let span = (2 * size.saturating_sub(1)).max(1) as f32;

    let image = RgbImage::from_fn(size, size, |x, y| {
        let t = (x + y) as f32 / span;
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb([mix(from[0], to[0]), mix(from[1], to[1]), mix(from[2], to[2])])
    });
    DynamicImage::ImageRgb8(image)
}

pub(super) fn encode_png(
    backend: &str,
    image: &DynamicImage,
) -> Result<GeneratedImage, GenerationError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| GenerationError::InvalidImage {
            message: e.to_string(),
        })?;
    Ok(GeneratedImage {
        bytes,
        width: image.width(),
        height: image.height(),
        backend: backend.to_string(),
        saved_to: None,
    })
}
