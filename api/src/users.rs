use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rand::rngs::OsRng;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::info;
use tuiter_shared::{AccountType, CreateUser, Location, MaritalStatus, ProfileFields, User};

use crate::{
    auth,
    db::with_conn,
    error::{ApiError, ApiResult},
    reactions, stats, AppState,
};

/// Column list matching [`row_to_user`]; queries alias `users` as `u`.
pub const COLUMNS: &str = "u.id, u.username, u.first_name, u.last_name, u.email, \
     u.profile_photo, u.header_image, u.account_type, u.marital_status, u.biography, \
     u.date_of_birth, u.joined, u.latitude, u.longitude";

const MIN_PASSWORD_LENGTH: usize = 4;
const MAX_USERNAME_LENGTH: usize = 50;

fn account_type_to_str(t: AccountType) -> &'static str {
    match t {
        AccountType::Personal => "PERSONAL",
        AccountType::Academic => "ACADEMIC",
        AccountType::Professional => "PROFESSIONAL",
    }
}

fn marital_status_to_str(s: MaritalStatus) -> &'static str {
    match s {
        MaritalStatus::Married => "MARRIED",
        MaritalStatus::Single => "SINGLE",
        MaritalStatus::Widowed => "WIDOWED",
    }
}

pub fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let account_type = match row.get::<_, String>(7)?.as_str() {
        "ACADEMIC" => AccountType::Academic,
        "PROFESSIONAL" => AccountType::Professional,
        _ => AccountType::Personal,
    };
    let marital_status = match row.get::<_, String>(8)?.as_str() {
        "MARRIED" => MaritalStatus::Married,
        "WIDOWED" => MaritalStatus::Widowed,
        _ => MaritalStatus::Single,
    };

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        profile_photo: row.get(5)?,
        header_image: row.get(6)?,
        account_type,
        marital_status,
        biography: row.get(9)?,
        date_of_birth: row.get(10)?,
        joined: row.get(11)?,
        location: Location {
            latitude: row.get(12)?,
            longitude: row.get(13)?,
        },
    })
}

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))
}

// ── Store ──

pub fn find_by_id(conn: &Connection, user_id: i64) -> ApiResult<User> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users u WHERE u.id = ?1"),
        [user_id],
        row_to_user,
    )
    .optional()?
    .ok_or(ApiError::UserNotFound(user_id))
}

pub fn list(conn: &Connection) -> ApiResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM users u ORDER BY u.id"))?;
    let users = stmt
        .query_map([], row_to_user)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub fn create(conn: &Connection, new_user: &CreateUser) -> ApiResult<User> {
    let username = new_user.username.trim();
    if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Username must be 1-{MAX_USERNAME_LENGTH} characters"
        )));
    }
    if new_user.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let password_hash = hash_password(&new_user.password)?;
    let p = &new_user.profile;
    let location = p.location.unwrap_or_default();

    let inserted = conn.execute(
        "INSERT INTO users (username, password_hash, first_name, last_name, email,
                            profile_photo, header_image, account_type, marital_status,
                            biography, date_of_birth, latitude, longitude)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(username) DO NOTHING",
        params![
            username,
            password_hash,
            p.first_name,
            p.last_name,
            p.email,
            p.profile_photo,
            p.header_image,
            account_type_to_str(p.account_type.unwrap_or_default()),
            marital_status_to_str(p.marital_status.unwrap_or_default()),
            p.biography,
            p.date_of_birth,
            location.latitude,
            location.longitude,
        ],
    )?;

    if inserted == 0 {
        return Err(ApiError::Conflict(format!("Username {username} is taken")));
    }

    find_by_id(conn, conn.last_insert_rowid())
}

/// Applies the fields present in `changes`; absent ones keep their value.
pub fn update(conn: &Connection, user_id: i64, changes: &ProfileFields) -> ApiResult<User> {
    let updated = conn.execute(
        "UPDATE users SET
            first_name     = COALESCE(?2, first_name),
            last_name      = COALESCE(?3, last_name),
            email          = COALESCE(?4, email),
            profile_photo  = COALESCE(?5, profile_photo),
            header_image   = COALESCE(?6, header_image),
            account_type   = COALESCE(?7, account_type),
            marital_status = COALESCE(?8, marital_status),
            biography      = COALESCE(?9, biography),
            date_of_birth  = COALESCE(?10, date_of_birth),
            latitude       = COALESCE(?11, latitude),
            longitude      = COALESCE(?12, longitude)
         WHERE id = ?1",
        params![
            user_id,
            changes.first_name,
            changes.last_name,
            changes.email,
            changes.profile_photo,
            changes.header_image,
            changes.account_type.map(account_type_to_str),
            changes.marital_status.map(marital_status_to_str),
            changes.biography,
            changes.date_of_birth,
            changes.location.map(|l| l.latitude),
            changes.location.map(|l| l.longitude),
        ],
    )?;

    if updated == 0 {
        return Err(ApiError::UserNotFound(user_id));
    }
    find_by_id(conn, user_id)
}

/// Deletes the user and everything they own. Counters of tuits the user had
/// reacted to are rebuilt, since their reactions go with them.
pub fn delete(conn: &mut Connection, user_id: i64) -> ApiResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let reacted = reactions::reacted_tuits(&tx, user_id)?;
    let deleted = tx.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
    if deleted == 0 {
        return Err(ApiError::UserNotFound(user_id));
    }

    for tuit_id in reacted {
        match stats::recount(&tx, tuit_id) {
            // The user's own tuits were deleted with them.
            Ok(_) | Err(ApiError::PostNotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    tx.commit()?;
    Ok(())
}

/// Deletes the accounts named `username`. Only their owner may do so.
pub fn delete_by_username(conn: &mut Connection, username: &str, caller: i64) -> ApiResult<usize> {
    let ids: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT id FROM users WHERE username = ?1")?;
        let ids = stmt
            .query_map([username], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids
    };
    if ids.iter().any(|&id| id != caller) {
        return Err(ApiError::Forbidden);
    }

    for &id in &ids {
        delete(conn, id)?;
    }
    Ok(ids.len())
}

// ── Handlers ──

/// GET /api/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let users = with_conn(&state.db, |conn| list(conn)).await?;
    Ok(Json(users))
}

/// GET /api/users/{uid}
pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<Json<User>> {
    let user_id = auth::resolve_user(&uid, &headers, &state.jwt_secret)?;
    let user = with_conn(&state.db, move |conn| find_by_id(conn, user_id)).await?;
    Ok(Json(user))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = with_conn(&state.db, move |conn| create(conn, &payload)).await?;
    info!(user_id = user.id, username = %user.username, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /api/users/{uid}
pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
    Json(payload): Json<ProfileFields>,
) -> ApiResult<Json<User>> {
    let user_id = auth::authorize_user(&uid, &headers, &state.jwt_secret)?;
    let user = with_conn(&state.db, move |conn| update(conn, user_id, &payload)).await?;
    Ok(Json(user))
}

/// DELETE /api/users/{uid}
pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> ApiResult<StatusCode> {
    let user_id = auth::authorize_user(&uid, &headers, &state.jwt_secret)?;
    with_conn(&state.db, move |conn| delete(conn, user_id)).await?;
    info!(user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/users/username/{username}/delete
pub async fn delete_users_by_username(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let caller = auth::extract_user_id(&headers, &state.jwt_secret)?;
    let deleted =
        with_conn(&state.db, move |conn| delete_by_username(conn, &username, caller)).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

#[cfg(test)]
mod tests {
    use tuiter_shared::ReactionKind;

    use super::*;
    use crate::{
        db::{seed_tuit, test_connection},
        toggle::toggle,
    };

    fn signup(conn: &Connection, username: &str) -> User {
        create(
            conn,
            &CreateUser {
                username: username.to_string(),
                password: "hunter2".to_string(),
                profile: ProfileFields::default(),
            },
        )
        .unwrap()
    }

    #[test]
    fn password_is_stored_hashed() {
        let conn = test_connection();
        let user = signup(&conn, "alice");

        let hash: String = conn
            .query_row(
                "SELECT password_hash FROM users WHERE id = ?1",
                [user.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_ne!(hash, "hunter2");
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn duplicate_username_conflicts() {
        let conn = test_connection();
        signup(&conn, "alice");
        let err = create(
            &conn,
            &CreateUser {
                username: "alice".to_string(),
                password: "another".to_string(),
                profile: ProfileFields::default(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn update_keeps_absent_fields() {
        let conn = test_connection();
        let user = signup(&conn, "alice");

        update(
            &conn,
            user.id,
            &ProfileFields {
                biography: Some("first".to_string()),
                account_type: Some(AccountType::Academic),
                ..Default::default()
            },
        )
        .unwrap();
        let user = update(
            &conn,
            user.id,
            &ProfileFields {
                email: Some("a@example.com".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(user.biography.as_deref(), Some("first"));
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
        assert_eq!(user.account_type, AccountType::Academic);
        assert_eq!(user.marital_status, MaritalStatus::Single);
    }

    #[test]
    fn deleting_a_user_recounts_tuits_they_reacted_to() {
        let mut conn = test_connection();
        let alice = signup(&conn, "alice").id;
        let bob = signup(&conn, "bob").id;
        let tuit = seed_tuit(&conn, alice, "hello");
        let own = seed_tuit(&conn, bob, "mine");

        toggle(&mut conn, bob, tuit, ReactionKind::Like).unwrap();
        toggle(&mut conn, alice, tuit, ReactionKind::Like).unwrap();
        toggle(&mut conn, bob, own, ReactionKind::Dislike).unwrap();

        delete(&mut conn, bob).unwrap();

        assert_eq!(stats::get(&conn, tuit).unwrap().likes, 1);
        assert!(matches!(stats::get(&conn, own), Err(ApiError::PostNotFound(_))));
        assert!(matches!(find_by_id(&conn, bob), Err(ApiError::UserNotFound(_))));
    }

    #[test]
    fn delete_by_username_reports_count() {
        let mut conn = test_connection();
        let alice = signup(&conn, "alice").id;
        let bob = signup(&conn, "bob").id;

        assert!(matches!(
            delete_by_username(&mut conn, "alice", bob),
            Err(ApiError::Forbidden)
        ));
        assert_eq!(delete_by_username(&mut conn, "alice", alice).unwrap(), 1);
        assert_eq!(delete_by_username(&mut conn, "alice", alice).unwrap(), 0);
        assert!(find_by_id(&conn, bob).is_ok());
    }
}
