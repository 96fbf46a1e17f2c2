//! Data carried through a rendezvous.
//!
//! The broker never interprets `schema` or the fulfilled payload; both are
//! opaque values handed from one side to the other unmodified.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token linking one blocked call to the fulfil action that completes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub(crate) fn from_string(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The parts of an inbound HTTP call shown to whoever produces its reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl RequestContext {
    /// Build a context from already-decoded request parts.
    ///
    /// Repeated header names are grouped in arrival order. An empty body is
    /// recorded as absent; non-UTF-8 bytes are replaced lossily.
    pub fn new<'a, I>(method: &str, url: impl Into<String>, headers: I, body: &[u8]) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            grouped
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }

        Self {
            method: method.to_uppercase(),
            url: url.into(),
            headers: grouped,
            body: (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned()),
        }
    }
}

/// Expected shape of a route's response.
///
/// `sample` is an example document whose structure a generated response must
/// follow; `hints` attaches free-text instructions to field paths (see
/// [`crate::core::hints`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub sample: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hints: BTreeMap<String, String>,
}

impl From<Value> for ResponseSchema {
    fn from(sample: Value) -> Self {
        Self {
            sample,
            hints: BTreeMap::new(),
        }
    }
}

/// One outstanding rendezvous, as shown to a fulfiller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub id: CorrelationId,
    pub method: String,
    pub url: String,
    pub context: RequestContext,
    pub schema: Value,
    pub timestamp: DateTime<Utc>,
}

impl PendingEntry {
    /// Describe a call that is about to park under `id`.
    pub fn new(id: CorrelationId, context: RequestContext, schema: Value) -> Self {
        Self {
            id,
            method: context.method.clone(),
            url: context.url.clone(),
            context,
            schema,
            timestamp: Utc::now(),
        }
    }
}
