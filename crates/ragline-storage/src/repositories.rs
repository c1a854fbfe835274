// Repository layer for database operations

use anyhow::Result;
use sqlx::PgPool;

use crate::models::SessionRow;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL and apply pending migrations
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get_session(&self, conversation_id: &str) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT conversation_id, continuation_token, expires_at, updated_at
            FROM sessions
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Unconditional upsert: last writer wins, no concurrency token
    pub async fn put_session(
        &self,
        conversation_id: &str,
        continuation_token: &str,
        expires_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (conversation_id, continuation_token, expires_at, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (conversation_id) DO UPDATE
            SET continuation_token = EXCLUDED.continuation_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            "#,
        )
        .bind(conversation_id)
        .bind(continuation_token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
