// Database row types

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use ragline_core::SessionRecord;

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub conversation_id: String,
    pub continuation_token: String,
    pub expires_at: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        SessionRecord {
            conversation_id: row.conversation_id,
            continuation_token: row.continuation_token,
            expires_at: row.expires_at,
        }
    }
}
