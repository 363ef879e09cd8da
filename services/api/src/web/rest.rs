//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, plus the service-level
//! endpoints that don't belong to the accounts flow.

use axum::response::{IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::web::error::ErrorResponse;
use crate::web::users::{
    self, CredentialsRequest, EmailRequest, PasswordRequest, ResetPasswordRequest, StrengthResponse,
    UserResponse,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        users::register_handler,
        users::activate_handler,
        users::login_handler,
        users::request_password_reset_handler,
        users::reset_password_handler,
        users::check_password_handler,
        users::me_handler,
    ),
    components(
        schemas(
            CredentialsRequest,
            EmailRequest,
            PasswordRequest,
            ResetPasswordRequest,
            UserResponse,
            StrengthResponse,
            ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Accounts API", description = "Registration, activation, login and password reset.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

//=========================================================================================
// Service Handlers
//=========================================================================================

/// GET /health - Liveness probe
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
    }))
}
