// Ragline storage - session persistence
//
// Decision: Postgres via sqlx for deployments, an in-memory store with the
// same read/write semantics for tests and local runs.

pub mod memory;
pub mod models;
pub mod repositories;
pub mod session_store;

pub use memory::MemorySessionStore;
pub use repositories::Database;
pub use session_store::PgSessionStore;
