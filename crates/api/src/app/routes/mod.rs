use axum::Router;

pub mod inventory;
pub mod system;

/// Router for the business endpoints.
pub fn router() -> Router {
    Router::new().nest("/api/wms/inventory/check", inventory::router())
}
