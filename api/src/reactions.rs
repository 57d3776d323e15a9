//! Like/dislike facts keyed by the (user, tuit) pair.
//!
//! The table's unique pair key guarantees at most one reaction per pair; the
//! kind column says which one it is.

use rusqlite::{params, Connection, OptionalExtension};
use tuiter_shared::{Reaction, ReactionKind, Tuit, User};

use crate::{
    error::{ApiError, ApiResult},
    tuits, users,
};

fn row_to_reaction(row: &rusqlite::Row) -> rusqlite::Result<Reaction> {
    let kind: String = row.get(1)?;
    let kind = ReactionKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown reaction kind {kind:?}").into(),
        )
    })?;

    Ok(Reaction {
        id: row.get(0)?,
        kind,
        user_id: row.get(2)?,
        tuit_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Current reaction of `user_id` on `tuit_id`, whichever kind it is.
pub fn find(conn: &Connection, user_id: i64, tuit_id: i64) -> ApiResult<Option<Reaction>> {
    let reaction = conn
        .query_row(
            "SELECT id, kind, user_id, tuit_id, created_at FROM reactions
             WHERE user_id = ?1 AND tuit_id = ?2",
            params![user_id, tuit_id],
            row_to_reaction,
        )
        .optional()?;
    Ok(reaction)
}

/// Records a reaction. Fails if the pair already has one.
pub fn set(conn: &Connection, user_id: i64, tuit_id: i64, kind: ReactionKind) -> ApiResult<()> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO reactions (user_id, tuit_id, kind) VALUES (?1, ?2, ?3)",
        params![user_id, tuit_id, kind.as_str()],
    )?;

    if inserted == 0 {
        return Err(ApiError::DuplicateReaction {
            user_id,
            tuit_id,
            kind,
        });
    }
    Ok(())
}

/// Removes the pair's reaction if it is of `kind`. Returns whether a row was deleted.
pub fn clear(conn: &Connection, user_id: i64, tuit_id: i64, kind: ReactionKind) -> ApiResult<bool> {
    let deleted = conn.execute(
        "DELETE FROM reactions WHERE user_id = ?1 AND tuit_id = ?2 AND kind = ?3",
        params![user_id, tuit_id, kind.as_str()],
    )?;
    Ok(deleted > 0)
}

pub fn count(conn: &Connection, tuit_id: i64, kind: ReactionKind) -> ApiResult<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM reactions WHERE tuit_id = ?1 AND kind = ?2",
        params![tuit_id, kind.as_str()],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// Tuits the user has reacted to with `kind`, most recent reaction first.
pub fn tuits_by_user(conn: &Connection, user_id: i64, kind: ReactionKind) -> ApiResult<Vec<Tuit>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM reactions r
         JOIN tuits t ON t.id = r.tuit_id
         WHERE r.user_id = ?1 AND r.kind = ?2
         ORDER BY r.id DESC",
        tuits::COLUMNS
    ))?;

    let rows = stmt
        .query_map(params![user_id, kind.as_str()], tuits::row_to_tuit)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Users who reacted to the tuit with `kind`.
pub fn users_by_tuit(conn: &Connection, tuit_id: i64, kind: ReactionKind) -> ApiResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM reactions r
         JOIN users u ON u.id = r.user_id
         WHERE r.tuit_id = ?1 AND r.kind = ?2
         ORDER BY r.id ASC",
        users::COLUMNS
    ))?;

    let rows = stmt
        .query_map(params![tuit_id, kind.as_str()], users::row_to_user)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Tuits the user has reacted to at all. Used before deleting the user so
/// their counters can be rebuilt afterwards.
pub fn reacted_tuits(conn: &Connection, user_id: i64) -> ApiResult<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT tuit_id FROM reactions WHERE user_id = ?1")?;
    let ids = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}
