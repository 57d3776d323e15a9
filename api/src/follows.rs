use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rusqlite::{params, Connection};
use tuiter_shared::Follow;

use crate::{
    auth,
    db::{self, with_conn},
    error::{ApiError, ApiResult},
    users, AppState,
};

enum Side {
    Following,
    Followers,
}

fn list(conn: &Connection, user_id: i64, side: Side) -> ApiResult<Vec<Follow>> {
    db::ensure_user(conn, user_id)?;

    let column = match side {
        Side::Following => "user_following",
        Side::Followers => "user_followed",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT id, user_following, user_followed, created_at FROM follows
         WHERE {column} = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(id, following, followed, created_at)| -> ApiResult<Follow> {
            Ok(Follow {
                id,
                user_following: users::find_by_id(conn, following)?,
                user_followed: users::find_by_id(conn, followed)?,
                created_at,
            })
        })
        .collect()
}

pub fn follow(conn: &Connection, user_id: i64, target_id: i64) -> ApiResult<Follow> {
    if user_id == target_id {
        return Err(ApiError::BadRequest("Users cannot follow themselves".to_string()));
    }
    db::ensure_user(conn, user_id)?;
    db::ensure_user(conn, target_id)?;

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO follows (user_following, user_followed) VALUES (?1, ?2)",
        params![user_id, target_id],
    )?;
    if inserted == 0 {
        return Err(ApiError::Conflict(format!(
            "User {user_id} already follows user {target_id}"
        )));
    }

    let id = conn.last_insert_rowid();
    let created_at: String = conn.query_row(
        "SELECT created_at FROM follows WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;
    Ok(Follow {
        id,
        user_following: users::find_by_id(conn, user_id)?,
        user_followed: users::find_by_id(conn, target_id)?,
        created_at,
    })
}

pub fn unfollow(conn: &Connection, user_id: i64, target_id: i64) -> ApiResult<()> {
    let deleted = conn.execute(
        "DELETE FROM follows WHERE user_following = ?1 AND user_followed = ?2",
        params![user_id, target_id],
    )?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Follow".to_string()));
    }
    Ok(())
}

// ── Handlers ──

/// GET /api/users/{uid}/follows — users that uid follows
pub async fn list_following(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<Json<Vec<Follow>>> {
    let user_id = auth::resolve_user(&uid, &headers, &state.jwt_secret)?;
    let follows = with_conn(&state.db, move |conn| list(conn, user_id, Side::Following)).await?;
    Ok(Json(follows))
}

/// GET /api/users/{uid}/followers
pub async fn list_followers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<Json<Vec<Follow>>> {
    let user_id = auth::resolve_user(&uid, &headers, &state.jwt_secret)?;
    let follows = with_conn(&state.db, move |conn| list(conn, user_id, Side::Followers)).await?;
    Ok(Json(follows))
}

/// POST /api/users/{uid}/follows/{target}
pub async fn follow_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((uid, target)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<Follow>)> {
    let user_id = auth::authorize_user(&uid, &headers, &state.jwt_secret)?;
    let target_id = auth::parse_id(&target, "user")?;
    let edge = with_conn(&state.db, move |conn| follow(conn, user_id, target_id)).await?;
    Ok((StatusCode::CREATED, Json(edge)))
}

/// DELETE /api/users/{uid}/follows/{target}
pub async fn unfollow_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((uid, target)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let user_id = auth::authorize_user(&uid, &headers, &state.jwt_secret)?;
    let target_id = auth::parse_id(&target, "user")?;
    with_conn(&state.db, move |conn| unfollow(conn, user_id, target_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
