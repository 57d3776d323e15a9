pub mod auth;
pub mod bookmarks;
pub mod config;
pub mod db;
pub mod error;
pub mod follows;
pub mod likes;
pub mod messages;
pub mod reactions;
pub mod stats;
pub mod toggle;
pub mod tuits;
pub mod users;

use axum::{
    routing::{delete, get, post},
    Router,
};

pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub jwt_secret: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Auth
        .route("/api/auth/profile", get(auth::profile))
        // Users
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{uid}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/api/users/username/{username}/delete",
            delete(users::delete_users_by_username),
        )
        // Tuits
        .route("/api/tuits", get(tuits::list_tuits))
        .route(
            "/api/tuits/{tid}",
            get(tuits::get_tuit)
                .put(tuits::update_tuit)
                .delete(tuits::delete_tuit),
        )
        .route("/api/tuits/{tid}/stats/recount", post(tuits::recount_stats))
        .route(
            "/api/users/{uid}/tuits",
            get(tuits::list_user_tuits).post(tuits::create_tuit),
        )
        // Likes / dislikes
        .route("/api/users/{uid}/likes", get(likes::liked_tuits))
        .route(
            "/api/users/{uid}/likes/{tid}",
            get(likes::find_like).put(likes::toggle_like),
        )
        .route("/api/tuits/{tid}/likes", get(likes::users_who_liked))
        .route("/api/users/{uid}/dislikes", get(likes::disliked_tuits))
        .route(
            "/api/users/{uid}/dislikes/{tid}",
            get(likes::find_dislike).put(likes::toggle_dislike),
        )
        .route("/api/tuits/{tid}/dislikes", get(likes::users_who_disliked))
        // Follows
        .route("/api/users/{uid}/follows", get(follows::list_following))
        .route("/api/users/{uid}/followers", get(follows::list_followers))
        .route(
            "/api/users/{uid}/follows/{target}",
            post(follows::follow_user).delete(follows::unfollow_user),
        )
        // Bookmarks
        .route("/api/users/{uid}/bookmarks", get(bookmarks::list_bookmarks))
        .route(
            "/api/users/{uid}/bookmarks/{tid}",
            post(bookmarks::bookmark_tuit).delete(bookmarks::unbookmark_tuit),
        )
        // Messages
        .route("/api/users/{uid}/messages", get(messages::list_sent))
        .route(
            "/api/users/{uid}/messages_received",
            get(messages::list_received),
        )
        .route(
            "/api/users/{uid}/messages/{to}",
            post(messages::send_message),
        )
        .route("/api/messages/{mid}", delete(messages::delete_message))
        .with_state(state)
}
