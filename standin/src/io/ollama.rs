//! Direct generation through an Ollama server.
//!
//! Sends the rendered prompt to `/api/generate` in JSON mode and accepts the
//! model's reply only if it is well-formed JSON.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde::de::IgnoredAny;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{RequestContext, ResponseSchema};
use crate::error::{BrokerError, GenerateError};
use crate::generator::Generator;
use crate::io::config::OllamaConfig;
use crate::io::prompt::PromptBuilder;

const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    format: &'static str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Generator backed by an Ollama model.
pub struct OllamaGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    prompts: PromptBuilder,
}

impl OllamaGenerator {
    pub fn new(config: &OllamaConfig) -> Result<Self, GenerateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerateError::Backend(format!("build http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            prompts: PromptBuilder::new(),
        })
    }

    async fn request(&self, prompt: String) -> Result<Vec<u8>, GenerateError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            format: "json",
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerateError::Backend(format!("ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = truncate(&text, MAX_ERROR_BODY_BYTES);
            warn!(status = status.as_u16(), "ollama returned an error status");
            return Err(GenerateError::Backend(format!(
                "ollama responded with status {}: {text}",
                status.as_u16()
            )));
        }

        let decoded: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Backend(format!("decode ollama response: {e}")))?;
        let output = decoded.response.into_bytes();
        if serde_json::from_slice::<IgnoredAny>(&output).is_err() {
            warn!("ollama output is not valid json");
            return Err(GenerateError::InvalidOutput);
        }
        Ok(output)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    #[instrument(skip_all, fields(model = %self.model, url = %context.url))]
    async fn produce(
        &self,
        context: &RequestContext,
        schema: &ResponseSchema,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GenerateError> {
        let prompt = self
            .prompts
            .build(context, schema)
            .map_err(|e| GenerateError::Prompt(format!("{e:#}")))?;
        debug!(bytes = prompt.len(), "built prompt");

        let output = tokio::select! {
            result = self.request(prompt) => result?,
            () = cancel.cancelled() => return Err(BrokerError::Cancelled.into()),
        };
        info!(bytes = output.len(), "generated response");
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
