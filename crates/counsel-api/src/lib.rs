//! Counsel API crate - axum HTTP server and route handlers.
//!
//! Provides the REST surface of the gateway: JWT-authenticated
//! conversation, translation, document, and profile endpoints, public
//! share-link resolution, and health checks, with CORS, tracing,
//! compression, and rate limiting.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
