//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, rate
//! limiting, and bearer authentication for the protected route group.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::rate_limit::{self, RateLimiter};
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS: allow the frontend dev/prod origins on localhost. The port
    // comes from config; port+1 covers the typical dev-server offset.
    let port = state.config.general.port;
    let dev_port = port.saturating_add(1);
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            [
                format!("http://127.0.0.1:{}", port),
                format!("http://localhost:{}", port),
                format!("http://127.0.0.1:{}", dev_port),
                format!("http://localhost:{}", dev_port),
            ]
            .iter()
            .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Routes that do NOT require authentication.
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/shared/{token}", get(handlers::resolve_shared));

    // Rate limiter: 100 requests per second across the protected group.
    let limiter = RateLimiter::new(100);

    let max_upload = state.config.general.max_upload_bytes;
    let protected_routes = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route(
            "/conversations",
            post(handlers::create_conversation)
                .get(handlers::list_conversations)
                .delete(handlers::delete_all_conversations),
        )
        .route(
            "/conversations/{id}",
            get(handlers::get_conversation_messages).delete(handlers::delete_conversation),
        )
        .route(
            "/conversations/{id}/info",
            get(handlers::get_conversation_info),
        )
        .route(
            "/conversations/{id}/messages",
            post(handlers::send_message).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/conversations/{id}/share", post(handlers::set_share))
        .route("/translate", post(handlers::translate))
        .route("/translate/detect", post(handlers::detect_language))
        .route("/translations", get(handlers::list_translations))
        .route("/documents/generate", post(handlers::generate_document))
        .route("/documents", get(handlers::list_documents))
        .route(
            "/documents/{id}",
            get(handlers::get_document).delete(handlers::delete_document),
        )
        .route(
            "/users/me",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .layer(axum::middleware::from_fn(rate_limit::rate_limit_middleware))
        .layer(axum::Extension(limiter))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB default; uploads override per-route
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
pub async fn start_server(state: AppState) -> Result<(), counsel_core::error::CounselError> {
    let port = state.config.general.port;
    let addr = format!("127.0.0.1:{}", port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| counsel_core::error::CounselError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| counsel_core::error::CounselError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
