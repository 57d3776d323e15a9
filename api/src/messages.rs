use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rusqlite::{params, Connection, OptionalExtension};
use tuiter_shared::{CreateMessage, Message};

use crate::{
    auth,
    db::{self, with_conn},
    error::{ApiError, ApiResult},
    AppState,
};

const MAX_MESSAGE_LENGTH: usize = 2000;

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        from: row.get(1)?,
        to: row.get(2)?,
        message: row.get(3)?,
        sent_on: row.get(4)?,
    })
}

enum Direction {
    Sent,
    Received,
}

fn list(conn: &Connection, user_id: i64, direction: Direction) -> ApiResult<Vec<Message>> {
    db::ensure_user(conn, user_id)?;

    let column = match direction {
        Direction::Sent => "from_user",
        Direction::Received => "to_user",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT id, from_user, to_user, message, sent_on FROM messages
         WHERE {column} = ?1 ORDER BY id DESC"
    ))?;
    let messages = stmt
        .query_map([user_id], row_to_message)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

/// Stores the message as sanitized HTML. The length limit applies to the text
/// as sent, before escaping.
pub fn send(conn: &Connection, from: i64, to: i64, raw: &str) -> ApiResult<Message> {
    let body = ammonia::clean(raw);
    let body = body.trim();
    if body.is_empty() || raw.trim().chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Message must be 1-{MAX_MESSAGE_LENGTH} characters"
        )));
    }
    db::ensure_user(conn, from)?;
    db::ensure_user(conn, to)?;

    conn.execute(
        "INSERT INTO messages (from_user, to_user, message) VALUES (?1, ?2, ?3)",
        params![from, to, body],
    )?;
    let message = conn.query_row(
        "SELECT id, from_user, to_user, message, sent_on FROM messages WHERE id = ?1",
        [conn.last_insert_rowid()],
        row_to_message,
    )?;
    Ok(message)
}

/// Removes a message. Only its sender may do so.
pub fn delete(conn: &Connection, message_id: i64, caller: i64) -> ApiResult<Message> {
    let message = conn
        .query_row(
            "SELECT id, from_user, to_user, message, sent_on FROM messages WHERE id = ?1",
            [message_id],
            row_to_message,
        )
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("Message {message_id}")))?;
    if message.from != caller {
        return Err(ApiError::Forbidden);
    }

    conn.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;
    Ok(message)
}

// ── Handlers ──

/// GET /api/users/{uid}/messages — messages uid has sent
pub async fn list_sent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let user_id = auth::resolve_user(&uid, &headers, &state.jwt_secret)?;
    let messages = with_conn(&state.db, move |conn| list(conn, user_id, Direction::Sent)).await?;
    Ok(Json(messages))
}

/// GET /api/users/{uid}/messages_received
pub async fn list_received(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let user_id = auth::resolve_user(&uid, &headers, &state.jwt_secret)?;
    let messages =
        with_conn(&state.db, move |conn| list(conn, user_id, Direction::Received)).await?;
    Ok(Json(messages))
}

/// POST /api/users/{from}/messages/{to}
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((from, to)): Path<(String, String)>,
    Json(payload): Json<CreateMessage>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let from_id = auth::authorize_user(&from, &headers, &state.jwt_secret)?;
    let to_id = auth::parse_id(&to, "user")?;
    let message =
        with_conn(&state.db, move |conn| send(conn, from_id, to_id, &payload.message)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// DELETE /api/messages/{mid}
pub async fn delete_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(mid): Path<String>,
) -> ApiResult<Json<Message>> {
    let caller = auth::extract_user_id(&headers, &state.jwt_secret)?;
    let message_id = auth::parse_id(&mid, "message")?;
    let message = with_conn(&state.db, move |conn| delete(conn, message_id, caller)).await?;
    Ok(Json(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_user, test_connection};

    #[test]
    fn sent_and_received_are_separate_views() {
        let conn = test_connection();
        let alice = seed_user(&conn, "alice");
        let bob = seed_user(&conn, "bob");

        send(&conn, alice, bob, "hi bob").unwrap();
        send(&conn, bob, alice, "hi alice").unwrap();
        send(&conn, alice, bob, "<i>again</i>").unwrap();

        let sent: Vec<String> = list(&conn, alice, Direction::Sent)
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(sent, vec!["<i>again</i>", "hi bob"]);

        let received = list(&conn, alice, Direction::Received).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].from, bob);
    }

    #[test]
    fn empty_messages_and_unknown_recipients_are_refused() {
        let conn = test_connection();
        let alice = seed_user(&conn, "alice");

        assert!(matches!(send(&conn, alice, alice, "   "), Err(ApiError::BadRequest(_))));
        assert!(matches!(send(&conn, alice, 42, "hello"), Err(ApiError::UserNotFound(42))));
    }

    #[test]
    fn delete_returns_the_removed_message() {
        let conn = test_connection();
        let alice = seed_user(&conn, "alice");
        let bob = seed_user(&conn, "bob");
        let sent = send(&conn, alice, bob, "oops").unwrap();

        assert!(matches!(delete(&conn, sent.id, bob), Err(ApiError::Forbidden)));
        let removed = delete(&conn, sent.id, alice).unwrap();
        assert_eq!(removed.message, "oops");
        assert!(matches!(delete(&conn, sent.id, alice), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn limit_counts_characters_as_sent() {
        let conn = test_connection();
        let alice = seed_user(&conn, "alice");
        let bob = seed_user(&conn, "bob");

        let sent = send(&conn, alice, bob, &"<".repeat(MAX_MESSAGE_LENGTH)).unwrap();
        assert_eq!(sent.message, "&lt;".repeat(MAX_MESSAGE_LENGTH));
        assert!(matches!(
            send(&conn, alice, bob, &"x".repeat(MAX_MESSAGE_LENGTH + 1)),
            Err(ApiError::BadRequest(_))
        ));
    }
}
