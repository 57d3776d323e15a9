use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    DbPool,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a pooled SQLite database. Every connection enforces foreign keys and
/// waits on a locked database instead of failing immediately.
pub fn open_pool(path: &str, max_size: u32) -> Result<DbPool, r2d2::Error> {
    let manager = r2d2_sqlite::SqliteConnectionManager::file(path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });

    r2d2::Pool::builder().max_size(max_size).build(manager)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;
    migrate(&conn)?;
    info!("database schema ready");
    Ok(())
}

pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            username        TEXT UNIQUE NOT NULL,
            password_hash   TEXT NOT NULL,
            first_name      TEXT,
            last_name       TEXT,
            email           TEXT,
            profile_photo   TEXT,
            header_image    TEXT,
            account_type    TEXT NOT NULL DEFAULT 'PERSONAL'
                            CHECK (account_type IN ('PERSONAL', 'ACADEMIC', 'PROFESSIONAL')),
            marital_status  TEXT NOT NULL DEFAULT 'SINGLE'
                            CHECK (marital_status IN ('MARRIED', 'SINGLE', 'WIDOWED')),
            biography       TEXT,
            date_of_birth   TEXT,
            latitude        REAL NOT NULL DEFAULT 0.0,
            longitude       REAL NOT NULL DEFAULT 0.0,
            joined          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS tuits (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            tuit        TEXT NOT NULL,
            posted_by   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            posted_on   TEXT NOT NULL DEFAULT (datetime('now')),
            replies     INTEGER NOT NULL DEFAULT 0 CHECK (replies >= 0),
            retuits     INTEGER NOT NULL DEFAULT 0 CHECK (retuits >= 0),
            likes       INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
            dislikes    INTEGER NOT NULL DEFAULT 0 CHECK (dislikes >= 0)
        );
        CREATE INDEX IF NOT EXISTS idx_tuits_posted_by ON tuits(posted_by);

        -- One row per (user, tuit): a pair can hold a like or a dislike, never both.
        CREATE TABLE IF NOT EXISTS reactions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            tuit_id     INTEGER NOT NULL REFERENCES tuits(id) ON DELETE CASCADE,
            kind        TEXT NOT NULL CHECK (kind IN ('like', 'dislike')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, tuit_id)
        );
        CREATE INDEX IF NOT EXISTS idx_reactions_tuit ON reactions(tuit_id, kind);

        CREATE TABLE IF NOT EXISTS follows (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_following  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            user_followed   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_following, user_followed)
        );
        CREATE INDEX IF NOT EXISTS idx_follows_followed ON follows(user_followed);

        CREATE TABLE IF NOT EXISTS bookmarks (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            bookmarked_by   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            tuit_id         INTEGER NOT NULL REFERENCES tuits(id) ON DELETE CASCADE,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(bookmarked_by, tuit_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            from_user   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            to_user     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            message     TEXT NOT NULL,
            sent_on     TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_messages_from ON messages(from_user);
        CREATE INDEX IF NOT EXISTS idx_messages_to ON messages(to_user);
        ",
    )
}

/// Runs blocking database work on the blocking thread pool with a pooled connection.
pub async fn with_conn<T, F>(pool: &DbPool, f: F) -> ApiResult<T>
where
    F: FnOnce(&mut Connection) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

/// In-memory database with the full schema, for unit tests.
#[cfg(test)]
pub fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    migrate(&conn).unwrap();
    conn
}

#[cfg(test)]
pub fn seed_user(conn: &Connection, username: &str) -> i64 {
    conn.execute(
        "INSERT INTO users (username, password_hash) VALUES (?1, 'x')",
        [username],
    )
    .unwrap();
    conn.last_insert_rowid()
}

#[cfg(test)]
pub fn seed_tuit(conn: &Connection, posted_by: i64, text: &str) -> i64 {
    conn.execute(
        "INSERT INTO tuits (tuit, posted_by) VALUES (?1, ?2)",
        rusqlite::params![text, posted_by],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub(crate) fn ensure_user(conn: &Connection, user_id: i64) -> ApiResult<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        [user_id],
        |row| row.get(0),
    )?;

    if exists {
        Ok(())
    } else {
        Err(ApiError::UserNotFound(user_id))
    }
}
