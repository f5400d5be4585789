use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::now_ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageKind {
    Message,
    System,
    Warning,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub alias: String,
    pub content: String,
    pub is_filtered: bool,
    pub filter_reason: Option<String>,
    pub kind: MessageKind,
    pub created_at: i64,
}

pub async fn insert(
    pool: &SqlitePool,
    sender_id: &str,
    alias: &str,
    content: &str,
    kind: MessageKind,
    filter_reason: Option<&str>,
) -> sqlx::Result<Message> {
    // Warning records exist for audit only and are always marked filtered.
    let is_filtered = kind == MessageKind::Warning;
    let message = Message {
        id: Uuid::now_v7().to_string(),
        sender_id: sender_id.to_owned(),
        alias: alias.to_owned(),
        content: content.to_owned(),
        is_filtered,
        filter_reason: filter_reason.map(str::to_owned),
        kind,
        created_at: now_ts(),
    };

    sqlx::query(
        "INSERT INTO messages (id, sender_id, alias, content, is_filtered, filter_reason, kind, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.sender_id)
    .bind(&message.alias)
    .bind(&message.content)
    .bind(message.is_filtered)
    .bind(&message.filter_reason)
    .bind(message.kind)
    .bind(message.created_at)
    .execute(pool)
    .await?;

    Ok(message)
}

/// Wipes the room. Chat history is scoped to the time since the most
/// recent disconnect of anyone, not to individual sessions.
pub async fn delete_all(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM messages").execute(pool).await?;
    Ok(())
}

pub async fn count_all(pool: &SqlitePool) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_filtered(pool: &SqlitePool) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE is_filtered = 1")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_by_sender(pool: &SqlitePool, sender_id: &str) -> sqlx::Result<(i64, i64)> {
    let (total, flagged): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(is_filtered), 0) FROM messages WHERE sender_id = ?",
    )
    .bind(sender_id)
    .fetch_one(pool)
    .await?;
    Ok((total, flagged))
}

pub async fn list_page(pool: &SqlitePool, limit: i64, offset: i64) -> sqlx::Result<Vec<Message>> {
    sqlx::query_as("SELECT * FROM messages ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}
