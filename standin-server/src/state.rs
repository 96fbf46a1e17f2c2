//! Shared application state for the server.

use std::sync::Arc;
use std::time::Duration;

use standin::broker::Broker;
use standin::generator::{Generator, GeneratorKind};
use standin::routes::RouteTable;
use tokio_util::sync::CancellationToken;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Rendezvous shared by the intercepting layer and every fulfiller surface.
    pub broker: Arc<Broker>,
    /// Configured generator choice.
    pub kind: GeneratorKind,
    /// Generator answering intercepted routes.
    pub generator: Arc<dyn Generator>,
    pub routes: Arc<RouteTable>,
    /// Per-request generation deadline; `None` waits for the client.
    pub request_timeout: Option<Duration>,
    /// Cancelled on shutdown so parked requests release promptly.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        broker: Arc<Broker>,
        kind: GeneratorKind,
        generator: Arc<dyn Generator>,
        routes: RouteTable,
    ) -> Self {
        Self {
            broker,
            kind,
            generator,
            routes: Arc::new(routes),
            request_timeout: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Whether fulfillers have anything to act on.
    pub fn broker_selected(&self) -> bool {
        self.kind == GeneratorKind::Broker
    }
}

#[cfg(test)]
mod tests {
    use standin::generator::StaticGenerator;

    use super::*;

    #[test]
    fn broker_selection_follows_configured_kind() {
        let broker = Arc::new(Broker::new());
        let as_generator: Arc<dyn Generator> = broker.clone();

        let selected = AppState::new(
            Arc::clone(&broker),
            GeneratorKind::Broker,
            as_generator,
            RouteTable::new(),
        );
        assert!(selected.broker_selected());

        let static_state = AppState::new(
            broker,
            GeneratorKind::Static,
            Arc::new(StaticGenerator),
            RouteTable::new(),
        );
        assert!(!static_state.broker_selected());
    }
}
