pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod users;

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::MatchedPath,
    http::{Request, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Json, Router,
};
use std::{sync::Arc, time::Duration};
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info_span, warn, Span};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use error::ErrorResponse;

pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;

/// Builds the complete application: account routes, docs and the request layers.
pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/users", post(users::register_handler))
        .route("/users/activate/{token}", get(users::activate_handler))
        .route("/users/login", post(users::login_handler))
        .route(
            "/users/reset-password",
            post(users::request_password_reset_handler).patch(users::reset_password_handler),
        )
        .route("/users/check-password", post(users::check_password_handler))
        .route("/health", get(rest::health_handler));

    // Protected routes (bearer access token required)
    let protected_routes = Router::new()
        .route("/users/me", get(users::me_handler))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(HandleErrorLayer::new(handle_layer_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// Turns failures raised by the service layers into the usual error body.
async fn handle_layer_error(err: BoxError) -> Response {
    let (status, message) = if err.is::<Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timed out")
    } else {
        warn!(error = %err, "request failed in middleware");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    };
    let body = ErrorResponse {
        error: message.to_string(),
    };
    (status, Json(body)).into_response()
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
