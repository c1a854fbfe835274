// Database-backed SessionStore implementation
//
// Absent and expired keys are both reported as None; the orchestrator then
// runs the turn without prior context.

use async_trait::async_trait;
use chrono::Utc;

use ragline_core::{RelayError, Result, SessionRecord, SessionStore};

use crate::repositories::Database;

/// Postgres-backed session store
#[derive(Clone)]
pub struct PgSessionStore {
    db: Database,
}

impl PgSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<SessionRecord>> {
        let row = self
            .db
            .get_session(conversation_id)
            .await
            .map_err(|e| RelayError::persistence(e.to_string()))?;

        let record = match row {
            Some(row) => SessionRecord::from(row),
            None => return Ok(None),
        };

        // Stale rows may physically linger; never return them as valid
        if record.is_expired(Utc::now()) {
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn put(&self, record: &SessionRecord) -> Result<()> {
        self.db
            .put_session(
                &record.conversation_id,
                &record.continuation_token,
                record.expires_at,
            )
            .await
            .map_err(|e| RelayError::persistence(e.to_string()))
    }
}
