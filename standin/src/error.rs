//! Error types for the broker and generators.

use thiserror::Error;

/// Outcomes of broker operations that are not a delivered payload.
///
/// All variants are ordinary reported results; none of them indicate that the
/// broker itself is in a bad state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The waiting call's cancellation signal fired before fulfilment.
    #[error("request cancelled before a response was submitted")]
    Cancelled,
    /// No live entry for this ID: unknown, already resolved, or cancelled.
    #[error("no pending request found with id {0}")]
    NotFound(String),
    /// Another fulfil call already claimed this entry.
    #[error("pending request {0} was already fulfilled")]
    AlreadyFulfilled(String),
    /// The offered payload is not well-formed JSON.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Failures surfaced by a [`crate::generator::Generator`].
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("generation backend failed: {0}")]
    Backend(String),
    #[error("generation backend returned invalid json")]
    InvalidOutput,
    #[error("failed to build prompt: {0}")]
    Prompt(String),
    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl GenerateError {
    /// Whether the caller gave up before a response was produced.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Broker(BrokerError::Cancelled))
    }
}
