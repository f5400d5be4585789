use axum::extract::{Path, State};
use axum::response::Json;
use axum::debug_handler;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::chat::ServerEvent;
use crate::error::{ApiError, ApiResult};
use crate::notify::AccountAction;
use crate::users::{BlockType, User};
use crate::{AppState, enforcement, now_ts, users};

use super::ServiceGuard;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BlockBody {
    block_type: BlockType,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize, Default)]
pub(crate) struct ReasonBody {
    #[serde(default)]
    reason: Option<String>,
}

async fn load(state: &AppState, id: &str) -> ApiResult<User> {
    users::find(&state.db, id).await?.ok_or(ApiError::NotFound("User"))
}

/// Blocked users lose the right to stay connected, not just to send: the
/// room is told and every one of their live connections is closed now.
fn evict(state: &AppState, user: &User) {
    state.presence.broadcast(ServerEvent::UserBlocked { user_id: user.id.clone() });
    let kicked = state.presence.kick(&user.id);
    if kicked > 0 {
        tracing::info!(alias = %user.alias, connections = kicked, "closed live connections");
    }
}

#[debug_handler]
pub(crate) async fn block_user(
    _guard: ServiceGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<BlockBody>,
) -> ApiResult<Json<Value>> {
    if body.block_type == BlockType::None {
        return Err(ApiError::BadRequest("blockType must be 24h or permanent".to_owned()));
    }

    let lock = state.user_locks.acquire(&id);
    let _serialized = lock.lock().await;

    let mut user = load(&state, &id).await?;
    enforcement::block(&mut user, body.block_type, now_ts())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    users::save_enforcement(&state.db, &user).await?;

    state
        .notifier
        .account_action(&user, AccountAction::Blocked(body.block_type), body.reason.as_deref());
    evict(&state, &user);

    let message = match body.block_type {
        BlockType::Temporary => "User blocked for 24 hours",
        _ => "User blocked permanently",
    };
    Ok(Json(json!({ "success": true, "message": message })))
}

#[debug_handler]
pub(crate) async fn unblock_user(
    _guard: ServiceGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let lock = state.user_locks.acquire(&id);
    let _serialized = lock.lock().await;

    let mut user = load(&state, &id).await?;
    enforcement::unblock(&mut user);
    users::save_enforcement(&state.db, &user).await?;

    state.notifier.account_action(&user, AccountAction::Unblocked, None);

    Ok(Json(json!({ "success": true, "message": "User unblocked successfully" })))
}

#[debug_handler]
pub(crate) async fn delete_user(
    _guard: ServiceGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> ApiResult<Json<Value>> {
    let reason = body.reason;

    let lock = state.user_locks.acquire(&id);
    let _serialized = lock.lock().await;

    let mut user = load(&state, &id).await?;
    enforcement::soft_delete(&mut user).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    users::save_enforcement(&state.db, &user).await?;

    state.notifier.account_action(&user, AccountAction::Deleted, reason.as_deref());
    evict(&state, &user);

    Ok(Json(json!({ "success": true, "message": "User account deleted" })))
}

#[debug_handler]
pub(crate) async fn reset_warnings(
    _guard: ServiceGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let lock = state.user_locks.acquire(&id);
    let _serialized = lock.lock().await;

    let mut user = load(&state, &id).await?;
    enforcement::reset_warnings(&mut user);
    users::save_enforcement(&state.db, &user).await?;

    Ok(Json(json!({ "success": true, "message": "Warnings reset successfully" })))
}

#[debug_handler]
pub(crate) async fn resend_verification(
    _guard: ServiceGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = load(&state, &id).await?;
    if user.is_verified {
        return Err(ApiError::BadRequest("Account is already verified".to_owned()));
    }

    state.notifier.resend_verification(&user);

    Ok(Json(json!({ "success": true, "message": "Verification notification sent" })))
}
