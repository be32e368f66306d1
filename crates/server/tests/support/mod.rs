#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::Service;

use server::routes;
use server::state::AppState;
use service::auth::hasher::Argon2Hasher;
use service::auth::repository::mock::MemoryUserRepository;
use service::auth::token::JwtTokenIssuer;
use service::auth::InputRules;
use service::loader::LoaderConfig;

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryUserRepository>,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub fn app() -> TestApp {
    app_with_timeout(Duration::from_secs(10))
}

pub fn app_with_timeout(request_timeout: Duration) -> TestApp {
    let repo = Arc::new(MemoryUserRepository::new());
    let hasher = Argon2Hasher::new(argon2::Params::new(64, 1, 1, None).expect("argon2 params"));
    let tokens = JwtTokenIssuer::new("test-secret", "chirper", chrono::Duration::hours(1));
    let state = AppState::new(
        repo.clone(),
        Arc::new(hasher),
        Arc::new(tokens),
        InputRules::default(),
        LoaderConfig::default(),
    );
    let cors = tower_http::cors::CorsLayer::very_permissive();
    TestApp { router: routes::build_router(state, cors, request_timeout), repo }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Reply {
        let resp = self.router.clone().call(req).await.expect("infallible router");
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = to_bytes(resp.into_body(), usize::MAX).await.expect("read body");
        Reply { status, headers, body }
    }

    /// Register through the API and return the issued access token and user id.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> (String, String) {
        let reply = self
            .send(post_json(
                "/auth/register",
                serde_json::json!({
                    "username": username,
                    "email": email,
                    "password": password,
                    "confirm_password": password,
                }),
            ))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "register: {}", reply.text());
        let body = reply.json();
        let token = body["access_token"].as_str().expect("token").to_string();
        let id = body["user"]["id"].as_str().expect("id").to_string();
        (token, id)
    }
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

pub fn get_with_header(uri: &str, name: &str, value: &str) -> Request<Body> {
    Request::builder().uri(uri).header(name, value).body(Body::empty()).expect("request")
}
