use rusqlite::{params, Connection, OptionalExtension};
use tuiter_shared::{ReactionKind, Stats};

use crate::{
    error::{ApiError, ApiResult},
    reactions,
};

pub fn get(conn: &Connection, tuit_id: i64) -> ApiResult<Stats> {
    conn.query_row(
        "SELECT replies, retuits, likes, dislikes FROM tuits WHERE id = ?1",
        [tuit_id],
        |row| {
            Ok(Stats {
                replies: row.get(0)?,
                retuits: row.get(1)?,
                likes: row.get(2)?,
                dislikes: row.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or(ApiError::PostNotFound(tuit_id))
}

/// Overwrites all four counters in one statement.
pub fn set(conn: &Connection, tuit_id: i64, stats: &Stats) -> ApiResult<()> {
    let updated = conn.execute(
        "UPDATE tuits SET replies = ?2, retuits = ?3, likes = ?4, dislikes = ?5 WHERE id = ?1",
        params![
            tuit_id,
            stats.replies,
            stats.retuits,
            stats.likes,
            stats.dislikes
        ],
    )?;

    if updated == 0 {
        return Err(ApiError::PostNotFound(tuit_id));
    }
    Ok(())
}

/// Rebuilds the reaction counters from the reaction records themselves.
pub fn recount(conn: &Connection, tuit_id: i64) -> ApiResult<Stats> {
    let mut stats = get(conn, tuit_id)?;
    stats.likes = reactions::count(conn, tuit_id, ReactionKind::Like)?;
    stats.dislikes = reactions::count(conn, tuit_id, ReactionKind::Dislike)?;
    set(conn, tuit_id, &stats)?;
    Ok(stats)
}

/// Counter for `kind`, mutable.
pub fn counter_mut(stats: &mut Stats, kind: ReactionKind) -> &mut i64 {
    match kind {
        ReactionKind::Like => &mut stats.likes,
        ReactionKind::Dislike => &mut stats.dislikes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_tuit, seed_user, test_connection};

    #[test]
    fn missing_tuit_is_post_not_found() {
        let conn = test_connection();
        assert!(matches!(get(&conn, 99), Err(ApiError::PostNotFound(99))));
        assert!(matches!(
            set(&conn, 99, &Stats::default()),
            Err(ApiError::PostNotFound(99))
        ));
    }

    #[test]
    fn set_overwrites_every_counter() {
        let conn = test_connection();
        let alice = seed_user(&conn, "alice");
        let tuit = seed_tuit(&conn, alice, "hello");

        let stats = Stats {
            replies: 3,
            retuits: 2,
            likes: 1,
            dislikes: 4,
        };
        set(&conn, tuit, &stats).unwrap();
        assert_eq!(get(&conn, tuit).unwrap(), stats);
    }

    #[test]
    fn recount_repairs_drifted_counters() {
        let conn = test_connection();
        let alice = seed_user(&conn, "alice");
        let bob = seed_user(&conn, "bob");
        let tuit = seed_tuit(&conn, alice, "hello");
        reactions::set(&conn, alice, tuit, ReactionKind::Like).unwrap();
        reactions::set(&conn, bob, tuit, ReactionKind::Dislike).unwrap();

        set(
            &conn,
            tuit,
            &Stats {
                replies: 5,
                retuits: 0,
                likes: 9,
                dislikes: 0,
            },
        )
        .unwrap();

        let fixed = recount(&conn, tuit).unwrap();
        assert_eq!((fixed.likes, fixed.dislikes), (1, 1));
        assert_eq!(fixed.replies, 5, "non-reaction counters are kept");
        assert_eq!(get(&conn, tuit).unwrap(), fixed);
    }
}
