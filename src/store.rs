use sqlx::{Row, SqlitePool};

use crate::error::ClientResult;
use crate::types::{Credential, SessionRecord};

/// Durable, append-only pairing history backed by SQLite.
///
/// The current session is the row with the newest `created_at`. Rows are
/// never updated; a new pairing inserts a new row.
#[derive(Clone)]
pub struct SessionStore {
    db: SqlitePool,
}

impl SessionStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Inserts a new timestamped record for `credential`.
    ///
    /// The insert runs in its own transaction, so after a crash the row is
    /// either fully present or absent.
    pub async fn append(&self, credential: &Credential) -> ClientResult<SessionRecord> {
        let created_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut tx = self.db.begin().await?;
        let id = sqlx::query("INSERT INTO sessions (url, token, created_at) VALUES (?1, ?2, ?3)")
            .bind(&credential.url)
            .bind(&credential.token)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
        tx.commit().await?;

        tracing::debug!(id, url = %credential.url, "session record appended");
        Ok(SessionRecord { id, credential: credential.clone(), created_at })
    }

    /// Most recent credential, or `None` when nothing has been paired yet.
    pub async fn latest(&self) -> ClientResult<Option<Credential>> {
        let row = sqlx::query(
            "SELECT url, token FROM sessions ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| Credential { url: r.get("url"), token: r.get("token") }))
    }

    /// Records newest first.
    pub async fn history(&self, limit: i64) -> ClientResult<Vec<SessionRecord>> {
        let rows = sqlx::query(
            "SELECT id, url, token, created_at FROM sessions ORDER BY created_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit.max(0))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SessionRecord {
                id: r.get("id"),
                credential: Credential { url: r.get("url"), token: r.get("token") },
                created_at: r.get("created_at"),
            })
            .collect())
    }

    /// Drops every record, leaving no current session.
    pub async fn clear(&self) -> ClientResult<u64> {
        let removed = sqlx::query("DELETE FROM sessions").execute(&self.db).await?.rows_affected();
        tracing::info!(removed, "session store cleared");
        Ok(removed)
    }
}
