//! Like/dislike toggling.
//!
//! A (user, tuit) pair is in one of three states: no reaction, liked or
//! disliked. Requesting the kind the pair already holds undoes it; requesting
//! the other kind replaces it. The tuit's embedded counters move with every
//! transition.
//!
//! Each toggle runs in an `IMMEDIATE` transaction, so the write lock is held
//! from the first read of the counters until commit. Concurrent toggles on the
//! same tuit are serialized by SQLite and cannot lose each other's updates,
//! and a failure part-way through leaves nothing behind.

use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;
use tuiter_shared::{ReactionKind, ToggleResponse};

use crate::{db, error::ApiResult, reactions, stats};

/// Next state of a pair currently at `current` when `requested` comes in.
pub fn transition(current: Option<ReactionKind>, requested: ReactionKind) -> Option<ReactionKind> {
    if current == Some(requested) {
        None
    } else {
        Some(requested)
    }
}

pub fn toggle(
    conn: &mut Connection,
    user_id: i64,
    tuit_id: i64,
    requested: ReactionKind,
) -> ApiResult<ToggleResponse> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut counters = stats::get(&tx, tuit_id)?;
    db::ensure_user(&tx, user_id)?;

    let current = reactions::find(&tx, user_id, tuit_id)?.map(|r| r.kind);
    let next = transition(current, requested);

    if let Some(old) = current {
        reactions::clear(&tx, user_id, tuit_id, old)?;
        let counter = stats::counter_mut(&mut counters, old);
        *counter = (*counter - 1).max(0);
    }
    if let Some(new) = next {
        reactions::set(&tx, user_id, tuit_id, new)?;
        *stats::counter_mut(&mut counters, new) += 1;
    }

    stats::set(&tx, tuit_id, &counters)?;
    tx.commit()?;

    debug!(user_id, tuit_id, ?current, ?next, "reaction toggled");

    Ok(ToggleResponse {
        reaction: next,
        stats: counters,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        db::{seed_tuit, seed_user, test_connection},
        error::ApiError,
    };
    use tuiter_shared::{
        ReactionKind::{Dislike, Like},
        Stats,
    };

    fn setup() -> (Connection, i64, i64) {
        let conn = test_connection();
        let user = seed_user(&conn, "alice");
        let tuit = seed_tuit(&conn, user, "hello");
        (conn, user, tuit)
    }

    fn counts(conn: &Connection, tuit: i64) -> (i64, i64) {
        let s = stats::get(conn, tuit).unwrap();
        (s.likes, s.dislikes)
    }

    #[test]
    fn transition_table() {
        assert_eq!(transition(None, Like), Some(Like));
        assert_eq!(transition(Some(Like), Like), None);
        assert_eq!(transition(Some(Dislike), Like), Some(Like));
        assert_eq!(transition(None, Dislike), Some(Dislike));
        assert_eq!(transition(Some(Dislike), Dislike), None);
        assert_eq!(transition(Some(Like), Dislike), Some(Dislike));
    }

    #[test]
    fn like_dislike_dislike_walkthrough() {
        let (mut conn, a, p) = setup();
        assert_eq!(counts(&conn, p), (0, 0));

        let out = toggle(&mut conn, a, p, Like).unwrap();
        assert_eq!(out.reaction, Some(Like));
        assert_eq!(counts(&conn, p), (1, 0));
        assert_eq!(reactions::find(&conn, a, p).unwrap().unwrap().kind, Like);

        let out = toggle(&mut conn, a, p, Dislike).unwrap();
        assert_eq!(out.reaction, Some(Dislike));
        assert_eq!(counts(&conn, p), (0, 1));
        assert_eq!(reactions::find(&conn, a, p).unwrap().unwrap().kind, Dislike);

        let out = toggle(&mut conn, a, p, Dislike).unwrap();
        assert_eq!(out.reaction, None);
        assert_eq!(counts(&conn, p), (0, 0));
        assert!(reactions::find(&conn, a, p).unwrap().is_none());
    }

    #[test]
    fn liking_twice_restores_the_original_counter() {
        let (mut conn, a, p) = setup();
        let bob = seed_user(&conn, "bob");
        toggle(&mut conn, bob, p, Like).unwrap();
        let before = stats::get(&conn, p).unwrap();

        toggle(&mut conn, a, p, Like).unwrap();
        let out = toggle(&mut conn, a, p, Like).unwrap();

        assert_eq!(out.reaction, None);
        assert_eq!(out.stats, before);
        assert!(reactions::find(&conn, a, p).unwrap().is_none());
    }

    #[test]
    fn outcome_matches_stored_counters() {
        let (mut conn, a, p) = setup();
        let out = toggle(&mut conn, a, p, Dislike).unwrap();
        assert_eq!(out.stats, stats::get(&conn, p).unwrap());
    }

    #[test]
    fn missing_tuit_fails_without_creating_a_reaction() {
        let (mut conn, a, _) = setup();
        let err = toggle(&mut conn, a, 404, Like).unwrap_err();
        assert!(matches!(err, ApiError::PostNotFound(404)));
        assert!(reactions::find(&conn, a, 404).unwrap().is_none());
    }

    #[test]
    fn unknown_user_fails_without_touching_counters() {
        let (mut conn, _, p) = setup();
        let err = toggle(&mut conn, 999, p, Dislike).unwrap_err();
        assert!(matches!(err, ApiError::UserNotFound(999)));
        assert_eq!(counts(&conn, p), (0, 0));
    }

    #[test]
    fn counters_never_go_negative() {
        let (mut conn, a, p) = setup();
        toggle(&mut conn, a, p, Like).unwrap();
        // Simulate a counter that drifted low.
        stats::set(&conn, p, &Stats::default()).unwrap();

        let out = toggle(&mut conn, a, p, Like).unwrap();
        assert_eq!(out.stats.likes, 0);
    }

    /// Drives every request sequence of a fixed length for two users and checks
    /// the pair invariant and counter consistency after each step.
    #[test]
    fn every_sequence_keeps_pairs_exclusive_and_counters_exact() {
        let events = [(0usize, Like), (0, Dislike), (1, Like), (1, Dislike)];
        let len = 5;

        for seq in 0..events.len().pow(len) {
            let conn = test_connection();
            let users = [seed_user(&conn, "a"), seed_user(&conn, "b")];
            let tuit = seed_tuit(&conn, users[0], "p");
            let mut conn = conn;
            let mut model: HashMap<usize, ReactionKind> = HashMap::new();

            let mut code = seq;
            for _ in 0..len {
                let (who, kind) = events[code % events.len()];
                code /= events.len();

                let out = toggle(&mut conn, users[who], tuit, kind).unwrap();
                match transition(model.get(&who).copied(), kind) {
                    Some(k) => model.insert(who, k),
                    None => model.remove(&who),
                };
                assert_eq!(out.reaction, model.get(&who).copied());

                for (i, &uid) in users.iter().enumerate() {
                    let stored = reactions::find(&conn, uid, tuit).unwrap().map(|r| r.kind);
                    assert_eq!(stored, model.get(&i).copied());
                }

                let likes = model.values().filter(|k| **k == Like).count() as i64;
                let dislikes = model.values().filter(|k| **k == Dislike).count() as i64;
                assert_eq!(counts(&conn, tuit), (likes, dislikes));
                assert_eq!(reactions::count(&conn, tuit, Like).unwrap(), likes);
                assert_eq!(reactions::count(&conn, tuit, Dislike).unwrap(), dislikes);
            }
        }
    }
}
