use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .merge(quiz_routes(app_state.clone()))
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Session-backed routes. Generation has its own per-minute budget; the
/// other routes share the hourly one. The limiters wrap session resolution,
/// so rejected calls never get a cookie.
fn quiz_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let session_layer = middleware::from_fn_with_state(
        app_state.clone(),
        middlewares::session::session_middleware,
    );

    let generate_route = Router::new()
        .route("/ask-gemini", post(handlers::quiz::ask_gemini))
        .route_layer(session_layer.clone())
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::generation_rate_limit_middleware,
        ));

    let session_routes = Router::new()
        .route("/", get(handlers::pages::home))
        .route("/submit-quiz", post(handlers::quiz::submit_quiz))
        .route("/set-language", post(handlers::quiz::set_language))
        .route("/download_pdf", get(handlers::reports::download_pdf))
        .route("/scorecard.png", get(handlers::reports::scorecard_png))
        .route_layer(session_layer)
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::rate_limit::rate_limit_middleware,
        ));

    generate_route.merge(session_routes)
}
