//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::accounts::AccountError;
use crate::web::state::AppState;

/// Middleware that validates the `Authorization: Bearer` access token.
///
/// If valid, inserts the verified `TokenClaims` into request extensions for
/// handlers to use. Refresh tokens are not accepted here.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AccountError> {
    // 1. Extract the bearer token
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AccountError::Unauthorized("missing bearer token"))?;

    // 2. Verify signature, issuer and time window
    let claims = state.tokens.verify(token).map_err(|e| {
        debug!(error = %e, "bearer token rejected");
        AccountError::Unauthorized("invalid token")
    })?;

    // 3. Only access tokens authorize requests
    if claims.not_before.is_some() {
        return Err(AccountError::Unauthorized("invalid token"));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
