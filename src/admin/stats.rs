use axum::extract::State;
use axum::response::Json;
use axum::debug_handler;
use serde_json::{Value, json};

use crate::error::ApiResult;
use crate::{AppState, messages, now_ts};

use super::ServiceGuard;
use super::users::count_users;

const WEEK_SECS: i64 = 7 * 24 * 60 * 60;

#[debug_handler]
pub(crate) async fn dashboard(
    _guard: ServiceGuard,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let db = &state.db;
    let (recent_signups,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE role != 'admin' AND created_at >= ?")
            .bind(now_ts() - WEEK_SECS)
            .fetch_one(db)
            .await?;

    Ok(Json(json!({
        "success": true,
        "stats": {
            "totalUsers": count_users(db, "").await?,
            "activeUsers": count_users(db, " AND is_blocked = 0 AND is_deleted = 0").await?,
            "blockedUsers": count_users(db, " AND is_blocked = 1").await?,
            "onlineUsers": count_users(db, " AND is_online = 1").await?,
            "totalMessages": messages::count_all(db).await?,
            "flaggedMessages": messages::count_filtered(db).await?,
            "deletedAccounts": count_users(db, " AND is_deleted = 1").await?,
            "recentSignups": recent_signups,
        },
    })))
}
