//! Test-only helpers for driving the broker.

use std::time::Duration;

use serde_json::Value;

use crate::broker::Broker;
use crate::core::types::{PendingEntry, RequestContext};

/// A request context with no headers or body.
pub fn request(method: &str, url: &str) -> RequestContext {
    RequestContext::new(method, url, [], b"")
}

/// A JSON request context carrying `body`.
pub fn json_request(method: &str, url: &str, body: &Value) -> RequestContext {
    let raw = serde_json::to_vec(body).unwrap_or_default();
    RequestContext::new(
        method,
        url,
        [("content-type", "application/json")],
        &raw,
    )
}

/// Poll until at least `count` entries are pending, or panic after `timeout`.
pub async fn wait_for_pending(broker: &Broker, count: usize, timeout: Duration) -> Vec<PendingEntry> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let pending = broker.list_pending();
        if pending.len() >= count {
            return pending;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {count} pending requests, saw {}",
            pending.len()
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
