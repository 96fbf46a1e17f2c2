//! Pending-entry registry.
//!
//! Maps each correlation ID to the entry a fulfiller sees and to the
//! single-slot completion primitive the parked caller waits on. One lock
//! serializes structural changes to the map; it is held only for the map
//! operation itself and never across an await or a slot interaction.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::types::{CorrelationId, PendingEntry};

/// Result of a single, non-blocking attempt to complete a [`Slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The payload was handed to the waiter.
    Accepted,
    /// An earlier offer already claimed the slot.
    Taken,
    /// The waiter stopped listening before the payload arrived.
    Abandoned,
}

/// One-time-writable completion primitive for a single parked call.
///
/// Only the first [`Slot::offer`] can succeed. Offers never wait: the sender
/// is claimed under a lock scoped to this slot, then the send itself is a
/// single attempt on a oneshot channel.
///
/// The slot shares its waiter's cancellation token. Once that token has
/// fired, offers are refused even if the waiter has not yet been scheduled
/// to observe it.
#[derive(Debug)]
pub struct Slot {
    sender: Mutex<Option<oneshot::Sender<Vec<u8>>>>,
    cancel: CancellationToken,
}

impl Slot {
    /// Create a slot bound to `cancel` and the receiver its waiter observes.
    pub fn new(cancel: &CancellationToken) -> (Arc<Self>, oneshot::Receiver<Vec<u8>>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            cancel: cancel.clone(),
        });
        (slot, rx)
    }

    pub fn offer(&self, payload: Vec<u8>) -> Offer {
        let tx = {
            let mut sender = self.sender.lock();
            if sender.is_some() && self.cancel.is_cancelled() {
                return Offer::Abandoned;
            }
            sender.take()
        };
        let Some(tx) = tx else {
            return Offer::Taken;
        };
        match tx.send(payload) {
            Ok(()) => Offer::Accepted,
            Err(_) => Offer::Abandoned,
        }
    }
}

#[derive(Debug)]
struct Registered {
    entry: PendingEntry,
    slot: Arc<Slot>,
}

/// Shared map of outstanding rendezvous.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<HashMap<CorrelationId, Registered>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entry` under its own ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is already registered. IDs come from
    /// [`crate::core::id::new_id`], so a collision is a generator defect.
    pub fn insert(&self, entry: PendingEntry, slot: Arc<Slot>) {
        let id = entry.id.clone();
        let previous = self.entries.lock().insert(id, Registered { entry, slot });
        assert!(previous.is_none(), "correlation id registered twice");
    }

    /// Find the slot for `id` without removing the entry.
    pub fn lookup(&self, id: &str) -> Option<Arc<Slot>> {
        self.entries
            .lock()
            .get(id)
            .map(|registered| Arc::clone(&registered.slot))
    }

    /// Remove `id`, returning whether it was present. Absent IDs are a no-op.
    pub fn remove(&self, id: &str) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Snapshot of every entry, oldest first.
    pub fn list(&self) -> Vec<PendingEntry> {
        let mut entries: Vec<PendingEntry> = self
            .entries
            .lock()
            .values()
            .map(|registered| registered.entry.clone())
            .collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::id::new_id;
    use crate::core::types::RequestContext;

    fn entry(url: &str) -> PendingEntry {
        PendingEntry::new(
            new_id(),
            RequestContext::new("GET", url, [], b""),
            json!({"status": "string"}),
        )
    }

    #[test]
    fn insert_lookup_remove() {
        let registry = Registry::new();
        let pending = entry("/a");
        let id = pending.id.clone();
        let (slot, _rx) = Slot::new(&CancellationToken::new());

        registry.insert(pending, slot);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(id.as_str()).is_some());
        // lookup does not remove
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(id.as_str()));
        assert!(registry.lookup(id.as_str()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_absent_id_is_noop() {
        let registry = Registry::new();
        assert!(!registry.remove("missing"));

        let pending = entry("/a");
        let id = pending.id.clone();
        let (slot, _rx) = Slot::new(&CancellationToken::new());
        registry.insert(pending, slot);
        assert!(registry.remove(id.as_str()));
        assert!(!registry.remove(id.as_str()));
    }

    #[test]
    fn list_is_a_detached_snapshot() {
        let registry = Registry::new();
        let first = entry("/first");
        let first_id = first.id.clone();
        let (slot, _rx) = Slot::new(&CancellationToken::new());
        registry.insert(first, slot);

        let snapshot = registry.list();
        registry.remove(first_id.as_str());
        let (slot, _rx2) = Slot::new(&CancellationToken::new());
        registry.insert(entry("/second"), slot);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, first_id);
        assert_eq!(registry.list()[0].url, "/second");
    }

    #[test]
    fn list_orders_oldest_first() {
        let registry = Registry::new();
        let mut older = entry("/older");
        let newer = entry("/newer");
        older.timestamp = newer.timestamp - chrono::Duration::seconds(5);

        let (slot_a, _rx_a) = Slot::new(&CancellationToken::new());
        let (slot_b, _rx_b) = Slot::new(&CancellationToken::new());
        registry.insert(newer, slot_a);
        registry.insert(older, slot_b);

        let urls: Vec<String> = registry.list().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["/older", "/newer"]);
    }

    #[test]
    fn slot_accepts_only_first_offer() {
        let (slot, mut rx) = Slot::new(&CancellationToken::new());
        assert_eq!(slot.offer(b"1".to_vec()), Offer::Accepted);
        assert_eq!(slot.offer(b"2".to_vec()), Offer::Taken);
        assert_eq!(rx.try_recv().expect("payload"), b"1".to_vec());
    }

    #[test]
    fn slot_reports_abandoned_waiter() {
        let (slot, rx) = Slot::new(&CancellationToken::new());
        drop(rx);
        assert_eq!(slot.offer(b"{}".to_vec()), Offer::Abandoned);
        assert_eq!(slot.offer(b"{}".to_vec()), Offer::Taken);
    }

    #[test]
    fn slot_refuses_offers_once_cancelled() {
        let cancel = CancellationToken::new();
        let (slot, mut rx) = Slot::new(&cancel);
        cancel.cancel();

        assert_eq!(slot.offer(b"{}".to_vec()), Offer::Abandoned);
        assert_eq!(slot.offer(b"{}".to_vec()), Offer::Abandoned);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cancel_after_accepted_offer_still_reports_taken() {
        let cancel = CancellationToken::new();
        let (slot, mut rx) = Slot::new(&cancel);
        assert_eq!(slot.offer(b"1".to_vec()), Offer::Accepted);
        cancel.cancel();

        assert_eq!(slot.offer(b"2".to_vec()), Offer::Taken);
        assert_eq!(rx.try_recv().expect("payload"), b"1".to_vec());
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_insert_is_a_programming_error() {
        let registry = Registry::new();
        let pending = entry("/dup");
        let (slot_a, _rx_a) = Slot::new(&CancellationToken::new());
        let (slot_b, _rx_b) = Slot::new(&CancellationToken::new());
        registry.insert(pending.clone(), slot_a);
        registry.insert(pending, slot_b);
    }
}
