//! Generator abstraction for producing intercepted responses.
//!
//! The [`Generator`] trait decouples the HTTP layer from whatever produces a
//! reply: the rendezvous [`Broker`], a direct [`OllamaGenerator`] call, or the
//! [`StaticGenerator`] that echoes the sample schema. Which one is used is a
//! configuration choice ([`GeneratorKind`]); callers only see the trait.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::Broker;
use crate::core::types::{RequestContext, ResponseSchema};
use crate::error::GenerateError;
use crate::io::config::StandinConfig;
use crate::io::ollama::OllamaGenerator;

/// Produces the JSON body for an intercepted request.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a response for `context` shaped like `schema`.
    ///
    /// Implementations must stop promptly once `cancel` fires and report
    /// [`crate::error::BrokerError::Cancelled`].
    async fn produce(
        &self,
        context: &RequestContext,
        schema: &ResponseSchema,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GenerateError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Which [`Generator`] serves intercepted routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// Park requests until an external fulfiller answers them.
    #[default]
    Broker,
    /// Ask an Ollama model directly.
    Ollama,
    /// Serve the sample schema unchanged.
    Static,
}

/// Returns each route's sample document as its response.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticGenerator;

#[async_trait]
impl Generator for StaticGenerator {
    async fn produce(
        &self,
        _context: &RequestContext,
        schema: &ResponseSchema,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GenerateError> {
        Ok(serde_json::to_vec(&schema.sample)?)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Build the generator selected by `config`.
///
/// `broker` is shared with the fulfiller surfaces, so the same instance is
/// returned when the broker is selected.
pub fn build_generator(
    config: &StandinConfig,
    broker: &Arc<Broker>,
) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match config.generator.kind {
        GeneratorKind::Broker => Arc::clone(broker) as Arc<dyn Generator>,
        GeneratorKind::Ollama => Arc::new(OllamaGenerator::new(&config.ollama)?),
        GeneratorKind::Static => Arc::new(StaticGenerator),
    };
    Ok(generator)
}

/// A cancellation token that also fires after a fixed delay.
///
/// The token is a child of `parent`, so cancelling the parent cancels it too.
/// Dropping the `Deadline` stops the timer.
#[derive(Debug)]
pub struct Deadline {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl Deadline {
    pub fn new(parent: &CancellationToken, after: Duration) -> Self {
        let token = parent.child_token();
        let timer = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep(after).await;
                token.cancel();
            }
        });
        Self { token, timer }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
