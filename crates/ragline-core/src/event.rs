// Inbound event - one discrete unit of work derived from a webhook delivery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One message event extracted from a webhook delivery.
///
/// Constructed once by the inbound gateway, passed by value into exactly one
/// workflow execution, and discarded when that execution concludes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Stable platform-provided message id, used as the idempotency key
    pub message_id: String,
    /// Hash of the platform source id; keys the session store without raw PII
    pub conversation_id: String,
    /// Opaque token required to deliver a response to this specific event
    pub reply_handle: String,
    /// User-supplied message text
    pub text: String,
    /// Display name of the message author
    pub author_display_name: String,
    /// When the platform recorded the message
    pub received_at: DateTime<Utc>,
}

/// Derive the session key from a platform source id (group id for group
/// chats, user id for 1:1 - the same derivation covers both).
pub fn conversation_id_for(source_id: &str) -> String {
    let digest = Sha256::digest(source_id.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_is_sha256_hex() {
        // SHA-256("abc")
        assert_eq!(
            conversation_id_for("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn conversation_id_is_stable_per_source() {
        assert_eq!(conversation_id_for("U1234"), conversation_id_for("U1234"));
        assert_ne!(conversation_id_for("U1234"), conversation_id_for("U1235"));
    }
}
