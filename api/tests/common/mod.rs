#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use tuiter_api::{auth::Claims, db, AppState, DbPool};

pub const SECRET: &str = "integration-secret";

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    _dir: TempDir,
}

/// Fresh service on its own file-backed database.
pub fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tuiter.db");
    let pool = db::open_pool(path.to_str().unwrap(), 8).unwrap();
    db::run_migrations(&pool).unwrap();

    let router = tuiter_api::app(AppState {
        db: pool.clone(),
        jwt_secret: SECRET.to_string(),
    });

    TestApp {
        router,
        pool,
        _dir: dir,
    }
}

pub fn token_for(user_id: i64) -> String {
    let claims = Claims {
        sub: user_id,
        exp: 4_102_444_800, // 2100-01-01
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub async fn call(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let body = match body {
        Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
        None => Body::empty(),
    };

    let req = builder.body(body).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn signup(app: &TestApp, username: &str) -> i64 {
    let (status, user) = call(
        &app.router,
        "POST",
        "/api/users",
        None,
        Some(json!({ "username": username, "password": "secret-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {user}");
    user["id"].as_i64().unwrap()
}

pub async fn post_tuit(app: &TestApp, user_id: i64, text: &str) -> i64 {
    let (status, tuit) = call(
        &app.router,
        "POST",
        &format!("/api/users/{user_id}/tuits"),
        Some(&token_for(user_id)),
        Some(json!({ "tuit": text })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "posting tuit failed: {tuit}");
    tuit["id"].as_i64().unwrap()
}

pub async fn stats_of(app: &TestApp, tuit_id: i64) -> Value {
    let (status, tuit) = call(&app.router, "GET", &format!("/api/tuits/{tuit_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    tuit["stats"].clone()
}
