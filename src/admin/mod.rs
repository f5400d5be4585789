//! Control-plane HTTP surface consumed by the external admin dashboard
//! and the auth collaborator. Authenticated with a shared service key.

mod enforce;
mod stats;
mod users;

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use axum::debug_handler;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::{AppState, users as user_store};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats::dashboard))
        .route("/users", get(users::list).post(users::create))
        .route("/users/{id}", get(users::details).delete(enforce::delete_user))
        .route("/users/{id}/block", put(enforce::block_user))
        .route("/users/{id}/unblock", put(enforce::unblock_user))
        .route("/users/{id}/reset-warnings", put(enforce::reset_warnings))
        .route("/users/{id}/resend-verification", post(enforce::resend_verification))
        .route("/messages", get(users::messages))
        .route("/token/issue", post(issue_token))
}

/// Rejects any request without the configured `X-Service-Key` header.
pub(crate) struct ServiceGuard;

impl FromRequestParts<AppState> for ServiceGuard {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<ServiceGuard, ApiError> {
        let key = parts
            .headers
            .get("x-service-key")
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        if key != state.service_key.as_ref() {
            tracing::warn!("admin request with invalid service key");
            return Err(ApiError::Unauthorized);
        }
        Ok(ServiceGuard)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IssueTokenBody {
    user_id: String,
    ttl_secs: Option<i64>,
}

/// The external auth service mints gateway tokens here after it has done
/// its own credential checks.
#[debug_handler]
pub(crate) async fn issue_token(
    _guard: ServiceGuard,
    State(state): State<AppState>,
    Json(body): Json<IssueTokenBody>,
) -> ApiResult<Json<Value>> {
    let user = user_store::find(&state.db, &body.user_id)
        .await?
        .filter(|u| !u.is_deleted)
        .ok_or(ApiError::NotFound("User"))?;

    let token = match body.ttl_secs {
        Some(ttl) => state.tokens.issue_with_ttl(&user.id, ttl)?,
        None => state.tokens.issue(&user.id)?,
    };

    Ok(Json(json!({ "success": true, "token": token, "user": user })))
}
