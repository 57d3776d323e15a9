use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rusqlite::{params, Connection, OptionalExtension};
use tuiter_shared::{CreateTuit, Stats, Tuit};

use crate::{
    auth,
    db::{self, with_conn},
    error::{ApiError, ApiResult},
    stats, AppState,
};

/// Column list matching [`row_to_tuit`]; queries alias `tuits` as `t`.
pub const COLUMNS: &str =
    "t.id, t.tuit, t.posted_by, t.posted_on, t.replies, t.retuits, t.likes, t.dislikes";

pub const MAX_TUIT_LENGTH: usize = 280;

pub fn row_to_tuit(row: &rusqlite::Row) -> rusqlite::Result<Tuit> {
    Ok(Tuit {
        id: row.get(0)?,
        tuit: row.get(1)?,
        posted_by: row.get(2)?,
        posted_on: row.get(3)?,
        stats: Stats {
            replies: row.get(4)?,
            retuits: row.get(5)?,
            likes: row.get(6)?,
            dislikes: row.get(7)?,
        },
    })
}

/// Sanitizes the text into a safe HTML fragment. The length limit applies to
/// what the author typed, not to the escaped form that is stored.
fn clean_text(raw: &str) -> ApiResult<String> {
    if raw.trim().chars().count() > MAX_TUIT_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Tuit must be at most {MAX_TUIT_LENGTH} characters"
        )));
    }

    let text = ammonia::clean(raw);
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Tuit must not be empty".to_string()));
    }
    Ok(text.to_string())
}

// ── Store ──

pub fn find_by_id(conn: &Connection, tuit_id: i64) -> ApiResult<Tuit> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM tuits t WHERE t.id = ?1"),
        [tuit_id],
        row_to_tuit,
    )
    .optional()?
    .ok_or(ApiError::PostNotFound(tuit_id))
}

pub fn list(conn: &Connection) -> ApiResult<Vec<Tuit>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM tuits t ORDER BY t.posted_on DESC, t.id DESC"
    ))?;
    let tuits = stmt
        .query_map([], row_to_tuit)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tuits)
}

pub fn list_by_user(conn: &Connection, user_id: i64) -> ApiResult<Vec<Tuit>> {
    db::ensure_user(conn, user_id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM tuits t WHERE t.posted_by = ?1
         ORDER BY t.posted_on DESC, t.id DESC"
    ))?;
    let tuits = stmt
        .query_map([user_id], row_to_tuit)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tuits)
}

pub fn create(conn: &Connection, user_id: i64, raw: &str) -> ApiResult<Tuit> {
    let text = clean_text(raw)?;
    db::ensure_user(conn, user_id)?;
    conn.execute(
        "INSERT INTO tuits (tuit, posted_by) VALUES (?1, ?2)",
        params![text, user_id],
    )?;
    find_by_id(conn, conn.last_insert_rowid())
}

/// Replaces the text. Counters are left alone.
pub fn update(conn: &Connection, tuit_id: i64, raw: &str) -> ApiResult<Tuit> {
    let text = clean_text(raw)?;
    let updated = conn.execute(
        "UPDATE tuits SET tuit = ?2 WHERE id = ?1",
        params![tuit_id, text],
    )?;
    if updated == 0 {
        return Err(ApiError::PostNotFound(tuit_id));
    }
    find_by_id(conn, tuit_id)
}

/// Fails unless `caller` posted the tuit.
pub fn ensure_author(conn: &Connection, tuit_id: i64, caller: i64) -> ApiResult<()> {
    if find_by_id(conn, tuit_id)?.posted_by != caller {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

pub fn delete(conn: &Connection, tuit_id: i64) -> ApiResult<()> {
    let deleted = conn.execute("DELETE FROM tuits WHERE id = ?1", [tuit_id])?;
    if deleted == 0 {
        return Err(ApiError::PostNotFound(tuit_id));
    }
    Ok(())
}

// ── Handlers ──

/// GET /api/tuits
pub async fn list_tuits(State(state): State<AppState>) -> ApiResult<Json<Vec<Tuit>>> {
    let tuits = with_conn(&state.db, |conn| list(conn)).await?;
    Ok(Json(tuits))
}

/// GET /api/tuits/{tid}
pub async fn get_tuit(
    State(state): State<AppState>,
    Path(tid): Path<String>,
) -> ApiResult<Json<Tuit>> {
    let tuit_id = auth::parse_id(&tid, "tuit")?;
    let tuit = with_conn(&state.db, move |conn| find_by_id(conn, tuit_id)).await?;
    Ok(Json(tuit))
}

/// GET /api/users/{uid}/tuits
pub async fn list_user_tuits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<Json<Vec<Tuit>>> {
    let user_id = auth::resolve_user(&uid, &headers, &state.jwt_secret)?;
    let tuits = with_conn(&state.db, move |conn| list_by_user(conn, user_id)).await?;
    Ok(Json(tuits))
}

/// POST /api/users/{uid}/tuits
pub async fn create_tuit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
    Json(payload): Json<CreateTuit>,
) -> ApiResult<(StatusCode, Json<Tuit>)> {
    let user_id = auth::authorize_user(&uid, &headers, &state.jwt_secret)?;
    let tuit = with_conn(&state.db, move |conn| create(conn, user_id, &payload.tuit)).await?;
    Ok((StatusCode::CREATED, Json(tuit)))
}

/// PUT /api/tuits/{tid}
pub async fn update_tuit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tid): Path<String>,
    Json(payload): Json<CreateTuit>,
) -> ApiResult<Json<Tuit>> {
    let caller = auth::extract_user_id(&headers, &state.jwt_secret)?;
    let tuit_id = auth::parse_id(&tid, "tuit")?;
    let tuit = with_conn(&state.db, move |conn| {
        ensure_author(conn, tuit_id, caller)?;
        update(conn, tuit_id, &payload.tuit)
    })
    .await?;
    Ok(Json(tuit))
}

/// DELETE /api/tuits/{tid}
pub async fn delete_tuit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tid): Path<String>,
) -> ApiResult<StatusCode> {
    let caller = auth::extract_user_id(&headers, &state.jwt_secret)?;
    let tuit_id = auth::parse_id(&tid, "tuit")?;
    with_conn(&state.db, move |conn| {
        ensure_author(conn, tuit_id, caller)?;
        delete(conn, tuit_id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/tuits/{tid}/stats/recount
pub async fn recount_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tid): Path<String>,
) -> ApiResult<Json<Stats>> {
    auth::extract_user_id(&headers, &state.jwt_secret)?;
    let tuit_id = auth::parse_id(&tid, "tuit")?;
    let stats = with_conn(&state.db, move |conn| {
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let stats = stats::recount(&tx, tuit_id)?;
        tx.commit()?;
        Ok(stats)
    })
    .await?;
    Ok(Json(stats))
}
