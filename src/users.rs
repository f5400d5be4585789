use anyhow::bail;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::now_ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BlockType {
    None,
    #[serde(rename = "24h")]
    #[sqlx(rename = "24h")]
    Temporary,
    Permanent,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub alias: String,
    pub role: Role,
    pub is_verified: bool,
    pub warning_count: i64,
    pub is_typing_blocked: bool,
    pub is_blocked: bool,
    pub block_type: BlockType,
    pub blocked_at: Option<i64>,
    pub block_expires_at: Option<i64>,
    pub is_deleted: bool,
    pub is_online: bool,
    pub last_seen: i64,
    pub created_at: i64,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub async fn find(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Creates a user under a freshly generated alias, retrying on collision.
pub async fn create(pool: &SqlitePool, verified: bool) -> anyhow::Result<User> {
    for _ in 0..32 {
        let alias = generate_alias();
        let taken: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM users WHERE alias = ? AND is_deleted = 0")
                .bind(&alias)
                .fetch_optional(pool)
                .await?;
        if taken.is_some() {
            continue;
        }

        let id = Uuid::now_v7().to_string();
        let now = now_ts();
        sqlx::query(
            "INSERT INTO users (id, alias, is_verified, last_seen, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&alias)
        .bind(verified)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        return Ok(User {
            id,
            alias,
            role: Role::User,
            is_verified: verified,
            warning_count: 0,
            is_typing_blocked: false,
            is_blocked: false,
            block_type: BlockType::None,
            blocked_at: None,
            block_expires_at: None,
            is_deleted: false,
            is_online: false,
            last_seen: now,
            created_at: now,
        });
    }

    bail!("could not find a free alias");
}

/// Writes back every enforcement-owned field of the record.
pub async fn save_enforcement(pool: &SqlitePool, user: &User) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE users SET
            warning_count = ?, is_typing_blocked = ?,
            is_blocked = ?, block_type = ?, blocked_at = ?, block_expires_at = ?,
            is_deleted = ?, is_online = ?
         WHERE id = ?",
    )
    .bind(user.warning_count)
    .bind(user.is_typing_blocked)
    .bind(user.is_blocked)
    .bind(user.block_type)
    .bind(user.blocked_at)
    .bind(user.block_expires_at)
    .bind(user.is_deleted)
    .bind(user.is_online)
    .bind(&user.id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_online(pool: &SqlitePool, id: &str, online: bool) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET is_online = ?, last_seen = ? WHERE id = ?")
        .bind(online)
        .bind(now_ts())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

const ADJECTIVES: &[&str] = &[
    "Mystic", "Silent", "Cosmic", "Neon", "Cyber", "Shadow", "Crystal",
    "Thunder", "Frost", "Storm", "Dark", "Bright", "Solar", "Lunar",
    "Stellar", "Quantum", "Nova", "Astral", "Crimson", "Azure", "Golden",
    "Silver", "Iron", "Steel", "Arctic", "Blazing", "Electric", "Sonic",
    "Swift", "Bold", "Brave", "Fierce", "Wild", "Rogue", "Noble", "Ancient",
];

const CREATURES: &[&str] = &[
    "Phoenix", "Dragon", "Griffin", "Unicorn", "Sphinx", "Kraken", "Hydra",
    "Chimera", "Centaur", "Basilisk", "Pegasus", "Leviathan", "Specter",
    "Phantom", "Spirit", "Raven", "Wolf", "Falcon", "Eagle", "Hawk",
    "Viper", "Cobra", "Panther", "Jaguar", "Tiger", "Lion", "Bear",
    "Fox", "Owl", "Lynx", "Puma",
];

/// Adjective + creature + number, e.g. "SilentFalcon4821". The caller is
/// responsible for the uniqueness check.
pub fn generate_alias() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).unwrap_or(&"Silent");
    let creature = CREATURES.choose(&mut rng).unwrap_or(&"Fox");
    let number: u32 = rng.random_range(1..=9999);
    format!("{adjective}{creature}{number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init(&pool).await.unwrap();
        pool
    }

    #[test]
    fn alias_shape() {
        let alias = generate_alias();
        assert!(alias.chars().next().unwrap().is_ascii_uppercase());
        assert!(alias.chars().rev().take_while(|c| c.is_ascii_digit()).count() >= 1);
    }

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let pool = pool().await;
        let created = create(&pool, true).await.unwrap();
        let found = find(&pool, &created.id).await.unwrap().unwrap();
        assert_eq!(found.alias, created.alias);
        assert_eq!(found.role, Role::User);
        assert_eq!(found.block_type, BlockType::None);
        assert!(found.is_verified);
        assert!(!found.is_online);
    }

    #[tokio::test]
    async fn enforcement_fields_persist() {
        let pool = pool().await;
        let mut user = create(&pool, true).await.unwrap();
        user.warning_count = 3;
        user.is_blocked = true;
        user.block_type = BlockType::Temporary;
        user.block_expires_at = Some(user.created_at + 86_400);
        save_enforcement(&pool, &user).await.unwrap();

        let found = find(&pool, &user.id).await.unwrap().unwrap();
        assert_eq!(found.warning_count, 3);
        assert!(found.is_blocked);
        assert_eq!(found.block_type, BlockType::Temporary);
        assert_eq!(found.block_expires_at, Some(user.created_at + 86_400));
    }

    #[tokio::test]
    async fn online_flag_tracks_last_seen() {
        let pool = pool().await;
        let user = create(&pool, true).await.unwrap();
        set_online(&pool, &user.id, true).await.unwrap();
        let found = find(&pool, &user.id).await.unwrap().unwrap();
        assert!(found.is_online);
        assert!(found.last_seen >= user.created_at);
    }
}
