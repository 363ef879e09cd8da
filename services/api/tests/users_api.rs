//! End-to-end flows through the router, backed by the in-memory store.

use accounts_core::ports::{Mailer, PortError, PortResult};
use api_lib::{
    accounts::{AccountService, Links},
    adapters::MemoryAccountStore,
    security::{Clock, TokenIssuer},
    web::{self, AppState},
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

const STRONG: &str = "h+z67{GxLSL~]Cl(I88AqV7w";

//=========================================================================================
// Test Doubles
//=========================================================================================

#[derive(Default)]
struct RecordingMailer {
    links: Mutex<Vec<String>>,
    fail: bool,
    /// Fails only messages with this subject.
    fail_subject: Option<&'static str>,
}

impl RecordingMailer {
    /// Last path segment of the most recent link, i.e. the token.
    fn last_token(&self) -> String {
        let links = self.links.lock().unwrap();
        let link = links.last().expect("a mail was sent");
        link.rsplit('/').next().unwrap().to_string()
    }

    fn sent(&self) -> usize {
        self.links.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, _recipient: &str, subject: &str, body: &str) -> PortResult<()> {
        if self.fail || self.fail_subject == Some(subject) {
            return Err(PortError::Unexpected("connection refused".to_string()));
        }
        self.links.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn advance(&self, by: ChronoDuration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

struct TestApp {
    router: Router,
    mailer: Arc<RecordingMailer>,
    clock: Arc<ManualClock>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_mailer(RecordingMailer::default())
    }

    fn with_mailer(mailer: RecordingMailer) -> Self {
        let mailer = Arc::new(mailer);
        let clock = Arc::new(ManualClock(Mutex::new(Utc::now())));
        let tokens = Arc::new(
            TokenIssuer::new(
                "arc",
                "test-secret",
                Duration::from_secs(900),
                Duration::from_secs(7 * 24 * 3600),
            )
            .unwrap()
            .with_clock(clock.clone()),
        );
        let accounts = AccountService::new(
            Arc::new(MemoryAccountStore::new()),
            mailer.clone(),
            tokens.clone(),
            Links::new("http://localhost:3000", "frontend-password-reset-path"),
        );
        let state = Arc::new(AppState { accounts, tokens });

        Self {
            router: web::router(state, Duration::from_secs(30)),
            mailer,
            clock,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn get(&self, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn register(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.json(Method::POST, "/users", json!({ "email": email, "password": password }))
            .await
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.json(Method::POST, "/users/login", json!({ "email": email, "password": password }))
            .await
    }

    /// Registers and activates an account.
    async fn active_account(&self, email: &str, password: &str) {
        let (status, _) = self.register(email, password).await;
        assert_eq!(status, StatusCode::CREATED);
        let token = self.mailer.last_token();
        let (status, _) = self.get(&format!("/users/activate/{}", token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

//=========================================================================================
// Registration and Activation
//=========================================================================================

#[tokio::test]
async fn register_returns_public_user() {
    let app = TestApp::new();
    let (status, body) = app.register("a@b.com", STRONG).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "a@b.com");
    assert!(body.get("created").is_some());
    assert!(body.get("id").is_none());
    assert!(body.get("password").is_none());
    assert_eq!(app.mailer.sent(), 1);
}

#[tokio::test]
async fn register_accepts_passphrase_with_substitutions() {
    let app = TestApp::new();
    let (status, body) = app.register("a@b.com", "Tr0ub4dor&3").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "a@b.com");
    assert!(body.get("created").is_some());
    assert!(body.get("id").is_none());
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_rejects_weak_password() {
    let app = TestApp::new();
    let (status, body) = app.register("a@b.com", "pass").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "weak password" }));
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = TestApp::new();
    assert_eq!(app.register("a@b.com", STRONG).await.0, StatusCode::CREATED);

    let (status, body) = app.register("a@b.com", STRONG).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "error": "already registered" }));
}

#[tokio::test]
async fn register_reports_field_errors() {
    let app = TestApp::new();

    let (status, body) = app.json(Method::POST, "/users", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty email");

    let (status, body) = app.register("not-an-email", STRONG).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid email");

    let (status, body) = app.json(Method::POST, "/users", json!({ "email": "a@b.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty password");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\":"))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid json body" }));
}

#[tokio::test]
async fn register_mail_failure_is_internal() {
    let app = TestApp::with_mailer(RecordingMailer {
        fail: true,
        ..Default::default()
    });

    let (status, body) = app.register("a@b.com", STRONG).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal server error" }));

    // The account exists but is stuck pending.
    assert_eq!(app.register("a@b.com", STRONG).await.0, StatusCode::CONFLICT);
}

#[tokio::test]
async fn activation_unlocks_login() {
    let app = TestApp::new();
    app.register("a@b.com", STRONG).await;

    let (status, body) = app.login("a@b.com", STRONG).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "account not activated" }));

    let token = app.mailer.last_token();
    let (status, body) = app.get(&format!("/users/activate/{}", token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "a@b.com");
    assert!(body.get("id").is_none());

    let (status, body) = app.login("a@b.com", STRONG).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["authToken"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refreshToken"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn activation_token_is_single_use() {
    let app = TestApp::new();
    app.register("a@b.com", STRONG).await;
    let token = app.mailer.last_token();
    let uri = format!("/users/activate/{}", token);

    assert_eq!(app.get(&uri, None).await.0, StatusCode::OK);

    let (status, body) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "invalid activation token" }));

    let (status, _) = app.get("/users/activate/garbage", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

//=========================================================================================
// Login and Bearer Tokens
//=========================================================================================

#[tokio::test]
async fn login_does_not_distinguish_unknown_email() {
    let app = TestApp::new();
    app.active_account("a@b.com", STRONG).await;

    let (wrong_status, wrong_body) = app.login("a@b.com", "not-the-password").await;
    let (unknown_status, unknown_body) = app.login("nobody@b.com", STRONG).await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["error"], "invalid credentials");
}

#[tokio::test]
async fn login_email_is_case_insensitive() {
    let app = TestApp::new();
    app.active_account("John.Doe@Sixpack.com", STRONG).await;

    assert_eq!(app.login("john.doe@sixpack.com", STRONG).await.0, StatusCode::OK);
}

#[tokio::test]
async fn me_requires_access_token() {
    let app = TestApp::new();
    app.active_account("a@b.com", STRONG).await;
    let (_, body) = app.login("a@b.com", STRONG).await;
    let access = body["authToken"].as_str().unwrap().to_string();
    let refresh = body["refreshToken"].as_str().unwrap().to_string();

    let (status, me) = app.get("/users/me", Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@b.com");
    assert!(me["id"].as_str().is_some());

    assert_eq!(app.get("/users/me", None).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/users/me", Some("garbage")).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/users/me", Some(&refresh)).await.0, StatusCode::UNAUTHORIZED);

    // Past the access window the access token is dead.
    app.clock.advance(ChronoDuration::minutes(16));
    assert_eq!(app.get("/users/me", Some(&access)).await.0, StatusCode::UNAUTHORIZED);
}

//=========================================================================================
// Password Reset and Strength
//=========================================================================================

#[tokio::test]
async fn password_reset_flow() {
    let app = TestApp::new();
    app.active_account("a@b.com", STRONG).await;

    let (status, body) = app
        .json(Method::POST, "/users/reset-password", json!({ "email": "a@b.com" }))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);
    let reset_token = app.mailer.last_token();

    let new_password = "Xq9#vL2!mR7&pW4@zT6^kB";
    let (status, body) = app
        .json(
            Method::PATCH,
            "/users/reset-password",
            json!({ "resetToken": reset_token, "password": new_password }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "a@b.com");
    assert!(body.get("authToken").is_none());

    let (status, body) = app
        .json(
            Method::PATCH,
            "/users/reset-password",
            json!({ "passwordResetToken": reset_token, "password": new_password }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "invalid password reset token");

    assert_eq!(app.login("a@b.com", STRONG).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("a@b.com", new_password).await.0, StatusCode::OK);
}

#[tokio::test]
async fn password_reset_request_hides_unknown_email() {
    let app = TestApp::new();

    let (status, _) = app
        .json(Method::POST, "/users/reset-password", json!({ "email": "nobody@b.com" }))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(app.mailer.sent(), 0);

    let (status, body) = app
        .json(Method::POST, "/users/reset-password", json!({ "email": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty email");
}

#[tokio::test]
async fn password_reset_mail_failure_is_internal() {
    let app = TestApp::with_mailer(RecordingMailer {
        fail_subject: Some("Password reset"),
        ..Default::default()
    });
    app.active_account("a@b.com", STRONG).await;

    let (status, body) = app
        .json(Method::POST, "/users/reset-password", json!({ "email": "a@b.com" }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal server error" }));
}

#[tokio::test]
async fn password_reset_validates_input() {
    let app = TestApp::new();

    let (status, body) = app
        .json(Method::PATCH, "/users/reset-password", json!({ "password": STRONG }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty password reset token");

    let (status, body) = app
        .json(
            Method::PATCH,
            "/users/reset-password",
            json!({ "resetToken": "00000000-0000-0000-0000-000000000000", "password": "pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "weak password");
}

#[tokio::test]
async fn check_password_scores_strength() {
    let app = TestApp::new();

    let (status, body) = app
        .json(Method::POST, "/users/check-password", json!({ "password": STRONG }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["strength"].as_u64().unwrap() >= 3);

    let (status, body) = app
        .json(Method::POST, "/users/check-password", json!({ "password": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty password");
}

//=========================================================================================
// Service Routes
//=========================================================================================

#[tokio::test]
async fn health_and_request_id() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new();
    let (status, body) = app.get("/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/users/login"].is_object());
}

