//! HTTP surface: login, admin endpoints and admission middleware.

mod handlers;
mod middleware;
mod response;
mod server;
mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use handlers::{LoginRequest, LoginResponse};
pub use response::{lock_message, ApiError, ApiResponse, RETRY_AFTER_HEADER};
pub use server::HttpServer;
pub use state::AppState;

/// Build the application router with admission control and request tracing.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/admin/unlock/{identity}", post(handlers::unlock))
        .route(
            "/auth/admin/login-attempts/{identity}",
            get(handlers::login_attempts),
        );

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(handlers::health))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admission_control,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
