use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rusqlite::{params, Connection};
use tuiter_shared::{Bookmark, Tuit};

use crate::{
    auth,
    db::{self, with_conn},
    error::{ApiError, ApiResult},
    tuits, AppState,
};

pub fn list(conn: &Connection, user_id: i64) -> ApiResult<Vec<Bookmark>> {
    db::ensure_user(conn, user_id)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {}, b.id, b.bookmarked_by, b.created_at
         FROM bookmarks b JOIN tuits t ON t.id = b.tuit_id
         WHERE b.bookmarked_by = ?1
         ORDER BY b.id DESC",
        tuits::COLUMNS
    ))?;
    let bookmarks = stmt
        .query_map([user_id], |row| {
            Ok(Bookmark {
                tuit: tuits::row_to_tuit(row)?,
                id: row.get(8)?,
                bookmarked_by: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(bookmarks)
}

pub fn add(conn: &Connection, user_id: i64, tuit_id: i64) -> ApiResult<Tuit> {
    db::ensure_user(conn, user_id)?;
    let tuit = tuits::find_by_id(conn, tuit_id)?;

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO bookmarks (bookmarked_by, tuit_id) VALUES (?1, ?2)",
        params![user_id, tuit_id],
    )?;
    if inserted == 0 {
        return Err(ApiError::Conflict(format!(
            "Tuit {tuit_id} is already bookmarked"
        )));
    }
    Ok(tuit)
}

pub fn remove(conn: &Connection, user_id: i64, tuit_id: i64) -> ApiResult<()> {
    let deleted = conn.execute(
        "DELETE FROM bookmarks WHERE bookmarked_by = ?1 AND tuit_id = ?2",
        params![user_id, tuit_id],
    )?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Bookmark".to_string()));
    }
    Ok(())
}

// ── Handlers ──

/// GET /api/users/{uid}/bookmarks
pub async fn list_bookmarks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<Json<Vec<Bookmark>>> {
    let user_id = auth::resolve_user(&uid, &headers, &state.jwt_secret)?;
    let bookmarks = with_conn(&state.db, move |conn| list(conn, user_id)).await?;
    Ok(Json(bookmarks))
}

/// POST /api/users/{uid}/bookmarks/{tid}
pub async fn bookmark_tuit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((uid, tid)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<Tuit>)> {
    let user_id = auth::authorize_user(&uid, &headers, &state.jwt_secret)?;
    let tuit_id = auth::parse_id(&tid, "tuit")?;
    let tuit = with_conn(&state.db, move |conn| add(conn, user_id, tuit_id)).await?;
    Ok((StatusCode::CREATED, Json(tuit)))
}

/// DELETE /api/users/{uid}/bookmarks/{tid}
pub async fn unbookmark_tuit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((uid, tid)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let user_id = auth::authorize_user(&uid, &headers, &state.jwt_secret)?;
    let tuit_id = auth::parse_id(&tid, "tuit")?;
    with_conn(&state.db, move |conn| remove(conn, user_id, tuit_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
