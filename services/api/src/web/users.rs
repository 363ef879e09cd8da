//! services/api/src/web/users.rs
//!
//! Axum handlers for the `/users` endpoints and their JSON payloads.

use accounts_core::domain::{Account, SessionTokens, TokenClaims};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::accounts::AccountError;
use crate::web::error::{invalid_json, ErrorResponse};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

// Absent fields deserialize as empty strings so the field checks report them.

#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(alias = "passwordResetToken")]
    pub reset_token: String,
    pub password: String,
}

/// Account data returned to clients. The id is only present on `/users/me`.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub email: String,
    pub created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl UserResponse {
    fn public(account: Account) -> Self {
        Self {
            id: None,
            email: account.email,
            created: account.created_at,
            updated: account.updated_at,
            auth_token: None,
            refresh_token: None,
        }
    }

    fn with_tokens(account: Account, tokens: SessionTokens) -> Self {
        Self {
            auth_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            ..Self::public(account)
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StrengthResponse {
    /// 0 (trivial) to 4 (very strong).
    pub strength: u8,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /users - Register a new account and mail its activation link
#[utoipa::path(
    post,
    path = "/users",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created, activation pending", body = UserResponse),
        (status = 400, description = "Invalid email or weak password", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AccountError> {
    let Json(req) = body.map_err(invalid_json)?;
    let account = state.accounts.register(&req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::public(account))))
}

/// GET /users/activate/{token} - Activate an account
#[utoipa::path(
    get,
    path = "/users/activate/{token}",
    params(
        ("token" = String, Path, description = "Activation token from the registration email.")
    ),
    responses(
        (status = 200, description = "Account activated", body = UserResponse),
        (status = 404, description = "Unknown or already used token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn activate_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<UserResponse>, AccountError> {
    let account = state.accounts.activate(&token).await?;
    Ok(Json(UserResponse::public(account)))
}

/// POST /users/login - Log in and receive an access and a refresh token
#[utoipa::path(
    post,
    path = "/users/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials or account not activated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AccountError> {
    let Json(req) = body.map_err(invalid_json)?;
    let correlation_id = correlation_id(&headers);
    let (account, tokens) = state
        .accounts
        .login(&req.email, &req.password, &correlation_id)
        .await?;
    Ok(Json(UserResponse::with_tokens(account, tokens)))
}

/// POST /users/reset-password - Request a password reset link
///
/// Answers 202 whether or not the email belongs to an active account.
#[utoipa::path(
    post,
    path = "/users/reset-password",
    request_body = EmailRequest,
    responses(
        (status = 202, description = "Reset link sent if the account exists"),
        (status = 400, description = "Invalid email", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn request_password_reset_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<StatusCode, AccountError> {
    let Json(req) = body.map_err(invalid_json)?;
    state.accounts.request_password_reset(&req.email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// PATCH /users/reset-password - Set a new password with a reset token
#[utoipa::path(
    patch,
    path = "/users/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = UserResponse),
        (status = 400, description = "Empty token or weak password", body = ErrorResponse),
        (status = 404, description = "Unknown or already used token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AccountError> {
    let Json(req) = body.map_err(invalid_json)?;
    let account = state
        .accounts
        .reset_password(&req.reset_token, &req.password)
        .await?;
    Ok(Json(UserResponse::public(account)))
}

/// POST /users/check-password - Score a password's strength
#[utoipa::path(
    post,
    path = "/users/check-password",
    request_body = PasswordRequest,
    responses(
        (status = 200, description = "Strength score", body = StrengthResponse),
        (status = 400, description = "Empty password", body = ErrorResponse)
    )
)]
pub async fn check_password_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PasswordRequest>, JsonRejection>,
) -> Result<Json<StrengthResponse>, AccountError> {
    let Json(req) = body.map_err(invalid_json)?;
    let strength = state.accounts.check_password_strength(&req.password)?;
    Ok(Json(StrengthResponse { strength }))
}

/// GET /users/me - The account behind the bearer token
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current account", body = UserResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 404, description = "Account no longer exists", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<TokenClaims>,
) -> Result<Json<UserResponse>, AccountError> {
    let account = state.accounts.account(claims.subject).await?;
    let id = account.id;
    Ok(Json(UserResponse {
        id: Some(id),
        ..UserResponse::public(account)
    }))
}

/// The request id set by the request-id layer, or a fresh one.
fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn account() -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            activation_token: Some(Uuid::new_v4()),
            password_reset_token: None,
            activated_at: None,
            active: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn public_user_hides_id_and_secrets() {
        let json = serde_json::to_value(UserResponse::public(account())).unwrap();
        let obj = json.as_object().unwrap();

        assert!(obj.contains_key("email"));
        assert!(obj.contains_key("created"));
        for hidden in ["id", "password", "updated", "authToken", "refreshToken", "activationToken"] {
            assert!(!obj.contains_key(hidden), "{hidden} leaked");
        }
    }

    #[test]
    fn tokens_use_camel_case() {
        let tokens = SessionTokens {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        };
        let json = serde_json::to_value(UserResponse::with_tokens(account(), tokens)).unwrap();
        assert_eq!(json["authToken"], "access");
        assert_eq!(json["refreshToken"], "refresh");
    }

    #[test]
    fn reset_request_accepts_both_token_names() {
        let a: ResetPasswordRequest = serde_json::from_str(r#"{"resetToken":"t","password":"p"}"#).unwrap();
        let b: ResetPasswordRequest =
            serde_json::from_str(r#"{"passwordResetToken":"t","password":"p"}"#).unwrap();
        assert_eq!(a.reset_token, "t");
        assert_eq!(b.reset_token, "t");

        let empty: ResetPasswordRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.reset_token.is_empty() && empty.password.is_empty());
    }

    #[test]
    fn correlation_id_prefers_request_id_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-42"));
        assert_eq!(correlation_id(&headers), "req-42");
        assert!(Uuid::parse_str(&correlation_id(&HeaderMap::new())).is_ok());
    }
}
