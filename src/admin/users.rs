use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::debug_handler;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::error::{ApiError, ApiResult};
use crate::users::User;
use crate::{AppState, messages, users};

use super::ServiceGuard;

#[derive(Deserialize, Default)]
pub(crate) struct ListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
    filter: Option<String>,
}

#[derive(Deserialize, Default)]
pub(crate) struct PageQuery {
    page: Option<i64>,
    limit: Option<i64>,
}

pub(crate) async fn count_users(db: &SqlitePool, clause: &str) -> sqlx::Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM users WHERE role != 'admin'{clause}");
    let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(db).await?;
    Ok(count)
}

fn filter_clause(filter: Option<&str>) -> &'static str {
    match filter {
        Some("blocked") => " AND is_blocked = 1",
        Some("active") => " AND is_blocked = 0 AND is_deleted = 0",
        Some("deleted") => " AND is_deleted = 1",
        Some("warned") => " AND warning_count > 0",
        _ => "",
    }
}

#[debug_handler]
pub(crate) async fn list(
    _guard: ServiceGuard,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * limit;

    let mut clause = String::from(filter_clause(query.filter.as_deref()));
    let pattern = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));
    if pattern.is_some() {
        clause += " AND alias LIKE ?";
    }

    let sql = format!(
        "SELECT * FROM users WHERE role != 'admin'{clause}
         ORDER BY created_at DESC LIMIT ? OFFSET ?"
    );
    let mut rows = sqlx::query_as::<_, User>(&sql);
    if let Some(pattern) = &pattern {
        rows = rows.bind(pattern);
    }
    let page_users = rows.bind(limit).bind(offset).fetch_all(&state.db).await?;

    let count_sql = format!("SELECT COUNT(*) FROM users WHERE role != 'admin'{clause}");
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    if let Some(pattern) = &pattern {
        count_query = count_query.bind(pattern);
    }
    let (total,) = count_query.fetch_one(&state.db).await?;

    Ok(Json(json!({
        "success": true,
        "users": page_users,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total + limit - 1) / limit,
        },
        "stats": {
            "totalUsers": count_users(&state.db, "").await?,
            "activeUsers": count_users(&state.db, " AND is_blocked = 0 AND is_deleted = 0").await?,
            "blockedUsers": count_users(&state.db, " AND is_blocked = 1").await?,
            "onlineUsers": count_users(&state.db, " AND is_online = 1").await?,
        },
    })))
}

#[debug_handler]
pub(crate) async fn details(
    _guard: ServiceGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = users::find(&state.db, &id).await?.ok_or(ApiError::NotFound("User"))?;
    let (message_count, flagged_messages) = messages::count_by_sender(&state.db, &user.id).await?;

    Ok(Json(json!({
        "success": true,
        "user": user,
        "messageCount": message_count,
        "flaggedMessages": flagged_messages,
    })))
}

#[derive(Deserialize, Default)]
pub(crate) struct CreateBody {
    #[serde(default)]
    verified: Option<bool>,
}

/// Provisioning entry point for the external auth service: it owns
/// credentials and verification, we own the anonymous identity.
#[debug_handler]
pub(crate) async fn create(
    _guard: ServiceGuard,
    State(state): State<AppState>,
    Json(body): Json<CreateBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let verified = body.verified.unwrap_or(true);
    let user = users::create(&state.db, verified).await?;

    tracing::info!(user_id = %user.id, alias = %user.alias, "user created");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "user": user }))))
}

#[debug_handler]
pub(crate) async fn messages(
    _guard: ServiceGuard,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = (page - 1) * limit;

    let page_messages = messages::list_page(&state.db, limit, offset).await?;
    let total = messages::count_all(&state.db).await?;

    Ok(Json(json!({
        "success": true,
        "messages": page_messages,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total + limit - 1) / limit,
        },
    })))
}
