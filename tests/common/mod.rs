#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fundlift::db::Database;
use fundlift::jwt::{Claims, DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, JwtConfig};
use fundlift::{ServerConfig, create_app};
use jsonwebtoken::{EncodingKey, Header};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

pub const TEST_ACCESS_SECRET: &[u8] = b"test-access-signing-secret-32ch!";
pub const TEST_REFRESH_SECRET: &[u8] = b"test-refresh-signing-secret-32c!";

/// Create a test app backed by an in-memory database.
pub async fn create_test_app() -> (axum::Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        access_secret: TEST_ACCESS_SECRET.to_vec(),
        refresh_secret: TEST_REFRESH_SECRET.to_vec(),
        access_ttl: DEFAULT_ACCESS_TTL,
        refresh_ttl: DEFAULT_REFRESH_TTL,
        secure_cookies: false,
    };
    (create_app(&config), db)
}

/// A JwtConfig matching the test app's secrets, for minting tokens directly.
pub fn test_jwt() -> JwtConfig {
    JwtConfig::new(
        TEST_ACCESS_SECRET,
        TEST_REFRESH_SECRET,
        DEFAULT_ACCESS_TTL,
        DEFAULT_REFRESH_TTL,
    )
}

/// Sign an access token whose `exp` is already in the past. The signature is
/// genuine, so verification yields the expired (renewable) outcome rather
/// than an invalid one.
pub fn craft_expired_access_token(sub: i64, email: &str, name: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        sub,
        email: email.to_string(),
        name: name.to_string(),
        iat: now - 600,
        exp: now - 60,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_ACCESS_SECRET),
    )
    .unwrap()
}

pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!("accessToken={}; refreshToken={}", access_token, refresh_token)
}

/// Build a JSON POST request.
pub fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Extract Set-Cookie headers from a response.
pub fn extract_set_cookies(response: &axum::http::Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Check whether the Set-Cookie list clears the named cookie (Max-Age=0).
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=", cookie_name)) && c.contains("Max-Age=0"))
}

/// Pull the value of a freshly set (non-cleared) cookie out of Set-Cookie headers.
pub fn set_cookie_value(cookies: &[String], cookie_name: &str) -> Option<String> {
    cookies
        .iter()
        .filter(|c| !c.contains("Max-Age=0"))
        .find_map(|c| {
            let rest = c.strip_prefix(&format!("{}=", cookie_name))?;
            Some(rest.split(';').next().unwrap_or(rest).to_string())
        })
}

pub async fn response_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&body).expect("Response body was not JSON")
}

/// Register a user through the API and return (user_id, access_token, refresh_token).
pub async fn register_user(
    app: &axum::Router,
    email: &str,
    name: &str,
    password: &str,
) -> (i64, String, String) {
    let response = app
        .clone()
        .oneshot(json_post(
            "/api/sessions/register",
            serde_json::json!({ "email": email, "name": name, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookies = extract_set_cookies(&response);
    let access = set_cookie_value(&cookies, "accessToken").expect("No access token cookie");
    let refresh = set_cookie_value(&cookies, "refreshToken").expect("No refresh token cookie");

    let body = response_json(response).await;
    let id = body["id"].as_i64().expect("No user id in response");

    (id, access, refresh)
}
