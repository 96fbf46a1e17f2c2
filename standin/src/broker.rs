//! Rendezvous broker.
//!
//! Parks an inbound call under a fresh correlation ID until an external
//! fulfiller submits its payload or the call's cancellation signal fires.
//!
//! Ownership of teardown sits with the waiting side: every exit from
//! [`Broker::register_and_wait`], including the future being dropped mid-wait,
//! runs the same cleanup guard, which removes the entry exactly once.
//! Fulfillers only ever look entries up; a fulfil that arrives after the
//! cancellation signal fired, or after the waiter has gone, reports
//! [`BrokerError::NotFound`].

use async_trait::async_trait;
use serde::Serialize;
use serde::de::IgnoredAny;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::id::new_id;
use crate::core::registry::{Offer, Registry, Slot};
use crate::core::types::{CorrelationId, PendingEntry, RequestContext, ResponseSchema};
use crate::error::{BrokerError, GenerateError};
use crate::generator::Generator;

const EVENT_CAPACITY: usize = 64;

/// How a parked call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Fulfilled,
    Cancelled,
}

/// Change notifications for fulfillers that prefer pushing over polling.
///
/// Advisory only: a lagging subscriber may miss events, so
/// [`Broker::list_pending`] stays the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrokerEvent {
    Registered {
        id: CorrelationId,
    },
    Resolved {
        id: CorrelationId,
        outcome: Resolution,
    },
}

/// Request/response rendezvous between parked calls and fulfillers.
#[derive(Debug)]
pub struct Broker {
    registry: Registry,
    events: broadcast::Sender<BrokerEvent>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            registry: Registry::new(),
            events,
        }
    }

    /// Subscribe to registration and resolution events.
    pub fn subscribe(&self) -> broadcast::Receiver<BrokerEvent> {
        self.events.subscribe()
    }

    /// Park until a fulfiller supplies a payload or `cancel` fires.
    ///
    /// The entry is visible to [`Broker::list_pending`] for exactly the
    /// duration of the wait. If a payload and cancellation arrive together,
    /// a payload that a fulfiller was told was accepted is always delivered.
    #[instrument(skip_all, fields(method = %context.method, url = %context.url))]
    pub async fn register_and_wait(
        &self,
        context: RequestContext,
        schema: Value,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BrokerError> {
        let id = new_id();
        let (slot, mut rx) = Slot::new(cancel);
        self.registry
            .insert(PendingEntry::new(id.clone(), context, schema), slot);
        let mut cleanup = Cleanup {
            broker: self,
            id: &id,
            outcome: Resolution::Cancelled,
        };
        info!(id = %id, "request parked awaiting fulfilment");
        self.publish(BrokerEvent::Registered { id: id.clone() });

        let result = tokio::select! {
            biased;
            received = &mut rx => received.map_err(|_| BrokerError::Cancelled),
            () = cancel.cancelled() => {
                // Closing first makes any later offer fail, so a fulfiller is
                // never told Ok for a payload nobody will read.
                rx.close();
                rx.try_recv().map_err(|_| BrokerError::Cancelled)
            }
        };

        match &result {
            Ok(payload) => {
                cleanup.outcome = Resolution::Fulfilled;
                info!(id = %id, bytes = payload.len(), "request fulfilled");
            }
            Err(_) => info!(id = %id, "request cancelled before fulfilment"),
        }
        result
    }

    /// Snapshot of every parked call, oldest first.
    pub fn list_pending(&self) -> Vec<PendingEntry> {
        self.registry.list()
    }

    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    /// Deliver `payload` to the call parked under `id`.
    ///
    /// Never waits on the parked call: the registry lock is released before
    /// the slot is touched, and the slot accepts a single offer.
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub fn fulfill(&self, id: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        if let Err(err) = serde_json::from_slice::<IgnoredAny>(&payload) {
            warn!(error = %err, "rejected malformed payload");
            return Err(BrokerError::InvalidPayload(err.to_string()));
        }

        let Some(slot) = self.registry.lookup(id) else {
            warn!("no pending request for id");
            return Err(BrokerError::NotFound(id.to_string()));
        };

        match slot.offer(payload) {
            Offer::Accepted => {
                debug!("payload handed to waiter");
                Ok(())
            }
            Offer::Taken => {
                warn!("pending request already fulfilled");
                Err(BrokerError::AlreadyFulfilled(id.to_string()))
            }
            Offer::Abandoned => {
                debug!("waiter left before payload arrived");
                Err(BrokerError::NotFound(id.to_string()))
            }
        }
    }

    fn publish(&self, event: BrokerEvent) {
        let _ = self.events.send(event);
    }
}

/// Removes a parked entry when its wait ends, however it ends.
struct Cleanup<'a> {
    broker: &'a Broker,
    id: &'a CorrelationId,
    outcome: Resolution,
}

impl Drop for Cleanup<'_> {
    fn drop(&mut self) {
        if self.broker.registry.remove(self.id.as_str()) {
            self.broker.publish(BrokerEvent::Resolved {
                id: self.id.clone(),
                outcome: self.outcome,
            });
        }
    }
}

#[async_trait]
impl Generator for Broker {
    async fn produce(
        &self,
        context: &RequestContext,
        schema: &ResponseSchema,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GenerateError> {
        let payload = self
            .register_and_wait(context.clone(), schema.sample.clone(), cancel)
            .await?;
        Ok(payload)
    }

    fn name(&self) -> &'static str {
        "broker"
    }
}
