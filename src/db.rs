use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use uuid::Uuid;

use crate::now_ts;

pub async fn connect(database_url: &str) -> sqlx::Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(16)
        .connect(database_url)
        .await
}

/// Creates the schema and seeds the system admin account on first run.
pub async fn init(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            alias TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            is_verified INTEGER NOT NULL DEFAULT 0,
            warning_count INTEGER NOT NULL DEFAULT 0,
            is_typing_blocked INTEGER NOT NULL DEFAULT 0,
            is_blocked INTEGER NOT NULL DEFAULT 0,
            block_type TEXT NOT NULL DEFAULT 'none',
            blocked_at INTEGER,
            block_expires_at INTEGER,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_online INTEGER NOT NULL DEFAULT 0,
            last_seen INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Aliases are only reserved while the account is live.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_alias
         ON users (alias) WHERE is_deleted = 0",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            sender_id TEXT NOT NULL,
            alias TEXT NOT NULL,
            content TEXT NOT NULL,
            is_filtered INTEGER NOT NULL DEFAULT 0,
            filter_reason TEXT,
            kind TEXT NOT NULL DEFAULT 'message',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages (created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages (sender_id)")
        .execute(pool)
        .await?;

    seed_admin(pool).await
}

async fn seed_admin(pool: &SqlitePool) -> sqlx::Result<()> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE role = 'admin' LIMIT 1")
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Ok(());
    }

    let id = Uuid::now_v7().to_string();
    let now = now_ts();
    sqlx::query(
        "INSERT INTO users (id, alias, role, is_verified, last_seen, created_at)
         VALUES (?, 'SystemAdmin', 'admin', 1, ?, ?)",
    )
    .bind(&id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(admin_id = %id, "seeded admin account");
    Ok(())
}
