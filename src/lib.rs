pub mod admin;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod enforcement;
pub mod error;
pub mod messages;
pub mod moderation;
pub mod notify;
pub mod presence;
pub mod users;

use std::sync::Arc;

use axum::extract::FromRef;
use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::auth::TokenService;
use crate::config::Config;
use crate::moderation::ModerationService;
use crate::notify::{AccountNotifier, LogNotifier};
use crate::presence::PresenceRegistry;

pub use error::{ApiError, ApiResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: SqlitePool,
    pub presence: Arc<PresenceRegistry>,
    pub moderation: Arc<ModerationService>,
    pub tokens: TokenService,
    pub user_locks: Arc<UserLocks>,
    pub notifier: Arc<dyn AccountNotifier>,
    pub service_key: Arc<str>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: &Config) -> AppState {
        AppState {
            db,
            presence: Arc::new(PresenceRegistry::new()),
            moderation: Arc::new(ModerationService::from_config(&config.moderation)),
            tokens: TokenService::new(&config.token_secret, config.token_ttl_secs),
            user_locks: Arc::new(UserLocks::new()),
            notifier: Arc::new(LogNotifier),
            service_key: config.service_key.as_str().into(),
        }
    }
}

/// Per-user async locks serializing enforcement read-modify-writes.
/// A user can hold several connections at once; without this, concurrent
/// violations could race on the warning count.
#[derive(Default)]
pub struct UserLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new() -> UserLocks {
        UserLocks::default()
    }

    pub fn acquire(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(user_id.to_owned()).or_default().clone()
    }
}

pub fn now_ts() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

pub fn rfc3339(ts: i64) -> String {
    time::OffsetDateTime::from_unix_timestamp(ts)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
