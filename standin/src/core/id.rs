//! Correlation ID generation.

use uuid::Uuid;

use crate::core::types::CorrelationId;

/// Mint a fresh correlation ID.
///
/// Random v4 UUIDs; collisions across a process lifetime are negligible even
/// under concurrent callers, and no caller-visible state is shared.
pub fn new_id() -> CorrelationId {
    CorrelationId::from_string(Uuid::new_v4().to_string())
}
