//! HTTP backend for a real model endpoint.
//!
//! Request body: `{"prompt": "...", "reference_image": "<base64>"}` (the image
//! field is omitted when there is no reference). The endpoint answers with
//! `{"image": "<base64>"}` or `{"error": "..."}`.

use super::filter::encode_png;
use super::{GeneratedImage, GenerationRequest, ImageGenerator};
use crate::errors::GenerationError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct RequestBody<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_image: Option<String>,
}

#[derive(Deserialize)]
struct ResponseBody {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpGenerator {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpGenerator {
    pub fn new(
        name: impl Into<String>,
        endpoint: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint,
            api_key,
            timeout,
        }
    }
}

#[async_trait]
impl ImageGenerator for HttpGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        let name = self.name.clone();
        let endpoint = self.endpoint.clone();
        let api_key = self.api_key.clone();
        let timeout = self.timeout;
        let request = request.clone();

        tokio::task::spawn_blocking(move || {
            call_endpoint(&name, &endpoint, api_key.as_deref(), timeout, &request)
        })
        .await
        .map_err(|e| GenerationError::backend(format!("http task failed: {}", e)))?
    }
}

fn call_endpoint(
    name: &str,
    endpoint: &str,
    api_key: Option<&str>,
    timeout: Duration,
    request: &GenerationRequest,
) -> Result<GeneratedImage, GenerationError> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into();

    let body = serde_json::to_string(&RequestBody {
        prompt: &request.prompt,
        reference_image: request.reference_image.as_ref().map(|b| STANDARD.encode(b)),
    })
    .map_err(|e| GenerationError::backend(format!("could not encode request: {}", e)))?;

    let mut builder = agent
        .post(endpoint)
        .header("Content-Type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("Authorization", &format!("Bearer {}", key));
    }

    let mut response = builder
        .send(body.as_bytes())
        .map_err(|e| GenerationError::backend(format!("request to {} failed: {}", endpoint, e)))?;
    let status = response.status();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| GenerationError::backend(format!("could not read response: {}", e)))?;

    decode_response(name, status.as_u16(), &text)
}

fn decode_response(
    name: &str,
    status: u16,
    text: &str,
) -> Result<GeneratedImage, GenerationError> {
    let parsed: ResponseBody = serde_json::from_str(text).map_err(|e| {
        GenerationError::backend(format!("HTTP {} with unexpected body: {}", status, e))
    })?;

    match (parsed.image, parsed.error) {
        (_, Some(error)) => Err(GenerationError::backend(error)),
        (Some(encoded), None) => {
            let bytes = STANDARD
                .decode(encoded.trim())
                .map_err(|e| GenerationError::InvalidImage {
                    message: format!("image is not valid base64: {}", e),
                })?;
            let image = image::load_from_memory(&bytes).map_err(|e| {
                GenerationError::InvalidImage {
                    message: e.to_string(),
                }
            })?;
            encode_png(name, &image)
        }
        (None, None) => Err(GenerationError::backend(format!(
            "HTTP {} response carried neither an image nor an error",
            status
        ))),
    }
}
