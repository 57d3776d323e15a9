//! HTTP surface for likes and dislikes. Each route comes in a like and a
//! dislike flavour that share one implementation keyed by [`ReactionKind`].

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use tuiter_shared::{Reaction, ReactionKind, ToggleResponse, Tuit, User};

use crate::{
    auth,
    db::{self, with_conn},
    error::ApiResult,
    reactions, stats, toggle, AppState,
};

async fn toggle_reaction(
    state: AppState,
    headers: HeaderMap,
    uid: String,
    tid: String,
    kind: ReactionKind,
) -> ApiResult<Json<ToggleResponse>> {
    let user_id = auth::authorize_user(&uid, &headers, &state.jwt_secret)?;
    let tuit_id = auth::parse_id(&tid, "tuit")?;

    let response = with_conn(&state.db, move |conn| {
        toggle::toggle(conn, user_id, tuit_id, kind)
    })
    .await?;
    Ok(Json(response))
}

async fn find_reaction(
    state: AppState,
    headers: HeaderMap,
    uid: String,
    tid: String,
    kind: ReactionKind,
) -> ApiResult<Json<Option<Reaction>>> {
    let user_id = auth::resolve_user(&uid, &headers, &state.jwt_secret)?;
    let tuit_id = auth::parse_id(&tid, "tuit")?;

    let reaction = with_conn(&state.db, move |conn| {
        let found = reactions::find(conn, user_id, tuit_id)?;
        Ok(found.filter(|r| r.kind == kind))
    })
    .await?;

    Ok(Json(reaction))
}

async fn tuits_reacted_by(
    state: AppState,
    headers: HeaderMap,
    uid: String,
    kind: ReactionKind,
) -> ApiResult<Json<Vec<Tuit>>> {
    let user_id = auth::resolve_user(&uid, &headers, &state.jwt_secret)?;
    let tuits = with_conn(&state.db, move |conn| {
        db::ensure_user(conn, user_id)?;
        reactions::tuits_by_user(conn, user_id, kind)
    })
    .await?;
    Ok(Json(tuits))
}

async fn users_reacting_to(state: AppState, tid: String, kind: ReactionKind) -> ApiResult<Json<Vec<User>>> {
    let tuit_id = auth::parse_id(&tid, "tuit")?;
    let users = with_conn(&state.db, move |conn| {
        stats::get(conn, tuit_id)?;
        reactions::users_by_tuit(conn, tuit_id, kind)
    })
    .await?;
    Ok(Json(users))
}

// ── Likes ──

/// PUT /api/users/{uid}/likes/{tid}
pub async fn toggle_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((uid, tid)): Path<(String, String)>,
) -> ApiResult<Json<ToggleResponse>> {
    toggle_reaction(state, headers, uid, tid, ReactionKind::Like).await
}

/// GET /api/users/{uid}/likes/{tid}
pub async fn find_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((uid, tid)): Path<(String, String)>,
) -> ApiResult<Json<Option<Reaction>>> {
    find_reaction(state, headers, uid, tid, ReactionKind::Like).await
}

/// GET /api/users/{uid}/likes
pub async fn liked_tuits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<Json<Vec<Tuit>>> {
    tuits_reacted_by(state, headers, uid, ReactionKind::Like).await
}

/// GET /api/tuits/{tid}/likes
pub async fn users_who_liked(
    State(state): State<AppState>,
    Path(tid): Path<String>,
) -> ApiResult<Json<Vec<User>>> {
    users_reacting_to(state, tid, ReactionKind::Like).await
}

// ── Dislikes ──

/// PUT /api/users/{uid}/dislikes/{tid}
pub async fn toggle_dislike(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((uid, tid)): Path<(String, String)>,
) -> ApiResult<Json<ToggleResponse>> {
    toggle_reaction(state, headers, uid, tid, ReactionKind::Dislike).await
}

/// GET /api/users/{uid}/dislikes/{tid}
pub async fn find_dislike(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((uid, tid)): Path<(String, String)>,
) -> ApiResult<Json<Option<Reaction>>> {
    find_reaction(state, headers, uid, tid, ReactionKind::Dislike).await
}

/// GET /api/users/{uid}/dislikes
pub async fn disliked_tuits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<Json<Vec<Tuit>>> {
    tuits_reacted_by(state, headers, uid, ReactionKind::Dislike).await
}

/// GET /api/tuits/{tid}/dislikes
pub async fn users_who_disliked(
    State(state): State<AppState>,
    Path(tid): Path<String>,
) -> ApiResult<Json<Vec<User>>> {
    users_reacting_to(state, tid, ReactionKind::Dislike).await
}
