// Per-conversation continuation state
//
// Decision: expiry is judged at read time against the stored unix timestamp;
// there is no background sweep, stale rows are simply treated as absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session retention window. Sits just under the platform's own 24h
/// session-linkage ceiling.
pub const SESSION_TTL_HOURS: i64 = 22;

/// Stored mapping from a conversation to its continuation token plus expiry.
///
/// At most one live record exists per conversation; writes overwrite
/// unconditionally (last-writer-wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub conversation_id: String,
    /// Opaque token from the generation service; empty means no prior context
    pub continuation_token: String,
    /// Absolute unix-seconds timestamp after which the record is logically gone
    pub expires_at: i64,
}

impl SessionRecord {
    /// Build a record expiring `SESSION_TTL_HOURS` from `now`, rounded down
    /// to the second: `floor((now_ms + 22h) / 1000)`.
    pub fn new(
        conversation_id: impl Into<String>,
        continuation_token: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at =
            (now.timestamp_millis() + SESSION_TTL_HOURS * 60 * 60 * 1000).div_euclid(1000);
        Self {
            conversation_id: conversation_id.into(),
            continuation_token: continuation_token.into(),
            expires_at,
        }
    }

    /// Whether the record is logically gone at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }
}
