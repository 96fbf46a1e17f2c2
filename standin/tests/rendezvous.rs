//! End-to-end rendezvous scenarios between parked calls and fulfillers.
//!
//! These tests run on the multi-threaded runtime so waiters and fulfillers
//! genuinely race.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use standin::broker::Broker;
use standin::error::BrokerError;
use standin::generator::Deadline;
use standin::test_support::{json_request, request, wait_for_pending};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(2);

/// Register → list → fulfil → delivered → list empty.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fulfilled_call_returns_payload_and_clears_registry() {
    let broker = Arc::new(Broker::new());
    let waiter = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            broker
                .register_and_wait(
                    request("GET", "/status"),
                    json!({"status": "string"}),
                    &CancellationToken::new(),
                )
                .await
        })
    };

    let pending = wait_for_pending(&broker, 1, WAIT).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].schema, json!({"status": "string"}));

    broker
        .fulfill(pending[0].id.as_str(), br#"{"status":"ok"}"#.to_vec())
        .expect("fulfill");

    let payload = tokio::time::timeout(WAIT, waiter)
        .await
        .expect("waiter finished")
        .expect("join")
        .expect("payload");
    assert_eq!(payload, br#"{"status":"ok"}"#.to_vec());
    assert!(broker.list_pending().is_empty());
}

/// Cancellation that fires first wins, even when the waiter has not yet run
/// since the signal and a fulfil lands immediately afterwards.
#[tokio::test(flavor = "current_thread")]
async fn fulfil_after_cancel_is_refused_before_waiter_runs() {
    let broker = Arc::new(Broker::new());
    let cancel = CancellationToken::new();
    let waiter = {
        let broker = Arc::clone(&broker);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            broker
                .register_and_wait(request("GET", "/late"), json!({}), &cancel)
                .await
        })
    };

    let pending = wait_for_pending(&broker, 1, WAIT).await;
    let id = pending[0].id.clone();

    // No await between the two: the waiter cannot observe the signal first.
    cancel.cancel();
    let fulfilled = broker.fulfill(id.as_str(), br#"{"late":true}"#.to_vec());

    assert_eq!(fulfilled, Err(BrokerError::NotFound(id.to_string())));
    let result = waiter.await.expect("join");
    assert_eq!(result, Err(BrokerError::Cancelled));
    assert!(broker.list_pending().is_empty());
}

/// A 50ms deadline with no fulfiller ends in Cancelled and leaves nothing behind.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deadline_cancels_unfulfilled_call() {
    let broker = Arc::new(Broker::new());
    let waiter = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            let deadline = Deadline::new(&CancellationToken::new(), Duration::from_millis(50));
            broker
                .register_and_wait(request("GET", "/slow"), json!({}), deadline.token())
                .await
        })
    };

    let pending = wait_for_pending(&broker, 1, WAIT).await;
    let id = pending[0].id.clone();

    let result = tokio::time::timeout(WAIT, waiter)
        .await
        .expect("waiter finished")
        .expect("join");
    assert_eq!(result, Err(BrokerError::Cancelled));
    assert!(broker.list_pending().is_empty());
    assert_eq!(
        broker.fulfill(id.as_str(), b"{}".to_vec()),
        Err(BrokerError::NotFound(id.to_string()))
    );
}

/// Two fulfillers racing on one entry: exactly one wins, neither blocks.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fulfils_deliver_once() {
    for _ in 0..50 {
        let broker = Arc::new(Broker::new());
        let waiter = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move {
                broker
                    .register_and_wait(request("POST", "/race"), json!({}), &CancellationToken::new())
                    .await
            })
        };
        let id = wait_for_pending(&broker, 1, WAIT).await[0].id.to_string();

        let attempts: Vec<_> = ["1", "2"]
            .into_iter()
            .map(|payload| {
                let broker = Arc::clone(&broker);
                let id = id.clone();
                tokio::task::spawn_blocking(move || broker.fulfill(&id, payload.as_bytes().to_vec()))
            })
            .collect();

        let mut outcomes = Vec::new();
        for attempt in attempts {
            let outcome = tokio::time::timeout(WAIT, attempt)
                .await
                .expect("fulfil returned promptly")
                .expect("join");
            outcomes.push(outcome);
        }

        let wins = outcomes.iter().filter(|o| o.is_ok()).count();
        assert_eq!(wins, 1, "outcomes: {outcomes:?}");
        assert!(outcomes.iter().all(|o| matches!(
            o,
            Ok(()) | Err(BrokerError::AlreadyFulfilled(_)) | Err(BrokerError::NotFound(_))
        )));

        let payload = waiter.await.expect("join").expect("payload");
        assert!(payload == b"1" || payload == b"2");
        assert!(broker.list_pending().is_empty());
    }
}

/// N concurrent waiters get N distinct IDs, all visible before any resolves.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_waiters_get_distinct_entries() {
    const N: usize = 32;
    let broker = Arc::new(Broker::new());

    let waiters: Vec<_> = (0..N)
        .map(|i| {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move {
                broker
                    .register_and_wait(
                        json_request("POST", "/orders", &json!({"n": i})),
                        json!({"order": i}),
                        &CancellationToken::new(),
                    )
                    .await
            })
        })
        .collect();

    let pending = wait_for_pending(&broker, N, WAIT).await;
    let ids: HashSet<String> = pending.iter().map(|e| e.id.to_string()).collect();
    assert_eq!(ids.len(), N);

    for entry in &pending {
        let payload = serde_json::to_vec(&entry.schema).expect("payload");
        broker.fulfill(entry.id.as_str(), payload).expect("fulfill");
    }

    for waiter in waiters {
        let payload = waiter.await.expect("join").expect("payload");
        let value: serde_json::Value = serde_json::from_slice(&payload).expect("json");
        assert!(value.get("order").is_some());
    }
    assert!(broker.list_pending().is_empty());
}

/// Each waiter receives the payload submitted for its own ID.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn payloads_route_to_their_own_waiters() {
    let broker = Arc::new(Broker::new());
    let waiters: Vec<_> = (0..8)
        .map(|i| {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move {
                let url = format!("/items/{i}");
                let payload = broker
                    .register_and_wait(request("GET", &url), json!({}), &CancellationToken::new())
                    .await;
                (url, payload)
            })
        })
        .collect();

    for entry in wait_for_pending(&broker, 8, WAIT).await {
        let payload = serde_json::to_vec(&json!({"url": entry.url})).expect("payload");
        broker.fulfill(entry.id.as_str(), payload).expect("fulfill");
    }

    for waiter in waiters {
        let (url, payload) = waiter.await.expect("join");
        let value: serde_json::Value =
            serde_json::from_slice(&payload.expect("payload")).expect("json");
        assert_eq!(value["url"], url);
    }
}

/// Cancelling one waiter leaves the others untouched.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_is_scoped_to_one_entry() {
    let broker = Arc::new(Broker::new());
    let cancel_a = CancellationToken::new();

    let a = {
        let broker = Arc::clone(&broker);
        let cancel = cancel_a.clone();
        tokio::spawn(async move {
            broker
                .register_and_wait(request("GET", "/a"), json!({}), &cancel)
                .await
        })
    };
    wait_for_pending(&broker, 1, WAIT).await;
    let b = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            broker
                .register_and_wait(request("GET", "/b"), json!({}), &CancellationToken::new())
                .await
        })
    };
    wait_for_pending(&broker, 2, WAIT).await;

    cancel_a.cancel();
    assert_eq!(a.await.expect("join"), Err(BrokerError::Cancelled));

    let remaining = broker.list_pending();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].url, "/b");

    broker
        .fulfill(remaining[0].id.as_str(), b"true".to_vec())
        .expect("fulfill");
    assert_eq!(b.await.expect("join"), Ok(b"true".to_vec()));
}

#[test]
fn unknown_id_is_not_found_without_side_effects() {
    let broker = Broker::new();
    let mut events = broker.subscribe();
    assert_eq!(
        broker.fulfill("nonexistent", b"{}".to_vec()),
        Err(BrokerError::NotFound("nonexistent".to_string()))
    );
    assert!(broker.list_pending().is_empty());
    assert!(events.try_recv().is_err());
}
