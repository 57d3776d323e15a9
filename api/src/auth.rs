use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tuiter_shared::User;

use crate::{
    db::with_conn,
    error::{ApiError, ApiResult},
    users, AppState,
};

/// Path placeholder standing for the caller's own user id.
pub const ME: &str = "me";

// ── JWT Claims ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,   // user id
    pub exp: usize, // expiry (unix timestamp)
}

// ── Extract authenticated user from Authorization header ──

pub fn extract_user_id(headers: &HeaderMap, jwt_secret: &str) -> ApiResult<i64> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    Ok(data.claims.sub)
}

/// Turns a `{uid}` path segment into a concrete user id. `"me"` is resolved
/// from the bearer token; anything else must be a numeric id.
pub fn resolve_user(uid: &str, headers: &HeaderMap, jwt_secret: &str) -> ApiResult<i64> {
    if uid == ME {
        return extract_user_id(headers, jwt_secret).map_err(|_| ApiError::IdentityUnresolved);
    }

    uid.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid user id: {uid}")))
}

/// Like [`resolve_user`], for requests that write on the user's behalf: a
/// bearer token is required and its subject must be the user in the path.
pub fn authorize_user(uid: &str, headers: &HeaderMap, jwt_secret: &str) -> ApiResult<i64> {
    let user_id = resolve_user(uid, headers, jwt_secret)?;
    let caller = extract_user_id(headers, jwt_secret)?;

    if caller != user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(user_id)
}

/// Parses a numeric id from the path, naming the resource in the error.
pub fn parse_id(raw: &str, what: &str) -> ApiResult<i64> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} id: {raw}")))
}

// ── Handlers ──

/// GET /api/auth/profile — return current user
pub async fn profile(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<User>> {
    let user_id = extract_user_id(&headers, &state.jwt_secret)?;
    let user = with_conn(&state.db, move |conn| users::find_by_id(conn, user_id)).await?;
    Ok(Json(user))
}
