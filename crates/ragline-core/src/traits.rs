// Collaborator traits the orchestrator is written against
//
// Decision: constructor-injected trait objects instead of global singleton
// clients, so every collaborator can be substituted with a test double.

use async_trait::async_trait;

use crate::error::Result;
use crate::generation::{GenerationRequest, GenerationResult};
use crate::session::SessionRecord;

/// Key-value store of per-conversation continuation state.
///
/// `get` on an absent or logically expired key returns `Ok(None)`, never an
/// error. `put` overwrites unconditionally; concurrent writers for the same
/// conversation race last-writer-wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, conversation_id: &str) -> Result<Option<SessionRecord>>;

    async fn put(&self, record: &SessionRecord) -> Result<()>;
}

/// External RAG invocation. May fail transiently (rate limits, timeouts);
/// callers decide the retry policy, this collaborator never retries
/// internally.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult>;
}

/// Messaging-platform operations used by the relay.
///
/// `reply` is assumed idempotent for identical (reply_handle, text) pairs
/// within a short window, so retrying delivery is safe.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Deliver `text` to the conversation the reply handle belongs to
    async fn reply(&self, reply_handle: &str, text: &str) -> Result<()>;

    /// Best-effort "working on it" indicator for the conversation
    async fn show_typing(&self, source_id: &str) -> Result<()>;

    /// Display name of a platform user
    async fn display_name(&self, user_id: &str) -> Result<String>;
}
