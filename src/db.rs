use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};

/// Opens (and creates if missing) the SQLite database behind `db_url`.
pub async fn connect(db_url: &str) -> anyhow::Result<SqlitePool> {
    let in_memory = db_url.contains(":memory:");
    if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        tracing::info!("Creating SQLite database at {}", db_url);
        Sqlite::create_database(db_url).await?;
    }
    let options: SqliteConnectOptions = db_url.parse()?;
    // Every in-memory connection is its own database, so keep exactly one alive
    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 4 })
        .idle_timeout(if in_memory { None } else { Some(std::time::Duration::from_secs(600)) })
        .max_lifetime(if in_memory { None } else { Some(std::time::Duration::from_secs(1800)) })
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                let _ = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect_with(options)
        .await?;
    init_db(&pool).await?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // WAL + FULL sync: an appended session row is either committed or absent after a crash
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=FULL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }

    // Append-only pairing history; the newest created_at is the current session
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL,
            token TEXT NOT NULL,
            created_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    if let Err(e) = sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at DESC, id DESC)",
    )
    .execute(pool)
    .await
    {
        tracing::warn!("Failed to create index idx_sessions_created: {}", e);
    }

    Ok(())
}
