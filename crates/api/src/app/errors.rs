use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stocktake_core::DomainError;
use stocktake_infra::engine::CheckError;
use stocktake_infra::store::StoreError;

pub fn check_error_to_response(err: CheckError) -> axum::response::Response {
    let status = match &err {
        CheckError::Validation(_) => StatusCode::BAD_REQUEST,
        CheckError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        CheckError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    json_error(status, format!("Failed to process inventory check: {err}"))
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    let status = match &err {
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        StoreError::Constraint(_) | StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, format!("Failed to query check records: {err}"))
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, format!("Invalid request: {err}"))
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, format!("Invalid request: {}", rejection.body_text()))
}

pub fn query_rejection_to_response(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, format!("Invalid request: {}", rejection.body_text()))
}

pub fn path_rejection_to_response(rejection: PathRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, format!("Invalid request: {}", rejection.body_text()))
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "code": -1,
            "message": message.into(),
        })),
    )
        .into_response()
}
