// In-memory SessionStore
//
// Same read/write semantics as the Postgres store. Used by tests and as the
// fallback when no DATABASE_URL is configured.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use ragline_core::{Result, SessionRecord, SessionStore};

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physically stored records, expired ones included
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<SessionRecord>> {
        let records = self.records.read().await;
        let record = match records.get(conversation_id) {
            Some(record) => record.clone(),
            None => return Ok(None),
        };

        if record.is_expired(Utc::now()) {
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn put(&self, record: &SessionRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.conversation_id.clone(), record.clone());
        Ok(())
    }
}
