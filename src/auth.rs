use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::{AppState, enforcement, now_ts, users};
use crate::users::User;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 bearer tokens. Issuance happens on the control plane; the
/// gateway only verifies.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: i64) -> TokenService {
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn issue(&self, user_id: &str) -> ApiResult<String> {
        self.issue_with_ttl(user_id, self.ttl_secs)
    }

    pub fn issue_with_ttl(&self, user_id: &str, ttl_secs: i64) -> ApiResult<String> {
        let now = now_ts();
        let claims = Claims { sub: user_id.to_owned(), iat: now, exp: now + ttl_secs };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(e.into()))
    }

    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::InvalidToken)
    }
}

/// Connection-time authentication: token → user, refusing deleted and
/// still-blocked accounts. Expired temporary blocks are resolved (and
/// persisted) here; there is no background sweep.
pub async fn resolve_connection(state: &AppState, token: &str) -> ApiResult<User> {
    let claims = state.tokens.verify(token)?;

    let Some(mut user) = users::find(&state.db, &claims.sub).await? else {
        return Err(ApiError::Unauthorized);
    };
    if user.is_deleted {
        return Err(ApiError::Unauthorized);
    }

    if enforcement::check_block_expiry(&mut user, now_ts()) {
        users::save_enforcement(&state.db, &user).await?;
    }
    if user.is_blocked {
        return Err(ApiError::Forbidden("Account is blocked".to_owned()));
    }

    Ok(user)
}
