//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the check engine
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::{limit::GlobalConcurrencyLimitLayer, ServiceBuilder};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Upper bound on requests handled at once across the whole router.
pub const MAX_IN_FLIGHT_REQUESTS: usize = 1024;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(Extension(services))
        .layer(ServiceBuilder::new().layer(GlobalConcurrencyLimitLayer::new(MAX_IN_FLIGHT_REQUESTS)))
}
