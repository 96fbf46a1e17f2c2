//! Schema-driven HTTP response generation with an asynchronous rendezvous.
//!
//! Intercepted requests are answered by a [`generator::Generator`]. The
//! central implementation is the [`broker::Broker`]: it parks each request
//! under a correlation ID until an external fulfiller (a person or an agent)
//! lists it and submits a JSON payload, or until the request is cancelled.
//!
//! - **[`core`]**: Pure logic (IDs, the pending-entry registry, field hints).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Configuration files and the Ollama backend.
//!
//! [`broker`], [`generator`], and [`routes`] tie the two together for the
//! server binary.

pub mod broker;
pub mod core;
pub mod error;
pub mod generator;
pub mod io;
pub mod logging;
pub mod routes;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
