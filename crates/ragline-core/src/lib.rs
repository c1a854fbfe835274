// Ragline core - shared domain types and collaborator traits
//
// Decision: this crate has no dependency on storage or HTTP clients; it is
// purely domain types plus the traits the orchestrator is written against.

pub mod backoff;
pub mod error;
pub mod event;
pub mod generation;
pub mod session;
pub mod traits;

pub use backoff::BackoffPolicy;
pub use error::{RelayError, Result};
pub use event::InboundEvent;
pub use generation::{GenerationParams, GenerationRequest, GenerationResult};
pub use session::SessionRecord;
pub use traits::{GenerationClient, MessagingClient, SessionStore};
