use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stocktake_core::MaterialCode;
use stocktake_inventory::InventoryCheckInput;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/upload", post(upload_check))
        .route("/batch", post(upload_batch))
        .route("/records/:material_code", get(records_by_material))
        .route("/unprocessed", get(unprocessed_records))
}

pub async fn upload_check(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::InventoryCheckRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "invalid request payload");
            return errors::json_rejection_to_response(rejection);
        }
    };

    let input = InventoryCheckInput::from(body);
    match services.process_check(&input).await {
        Ok(receipt) => (StatusCode::OK, Json(dto::CommonResponse::success(receipt))).into_response(),
        Err(e) => errors::check_error_to_response(e),
    }
}

pub async fn upload_batch(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::BatchCheckRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "invalid batch payload");
            return errors::json_rejection_to_response(rejection);
        }
    };

    let inputs: Vec<InventoryCheckInput> = body.items.into_iter().map(InventoryCheckInput::from).collect();
    let results = services.process_batch(&inputs).await;

    (
        StatusCode::OK,
        Json(dto::CommonResponse::success(dto::BatchCheckResponse::from_results(results))),
    )
        .into_response()
}

pub async fn records_by_material(
    Extension(services): Extension<Arc<AppServices>>,
    material_code: Result<Path<String>, PathRejection>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> axum::response::Response {
    let Path(material_code) = match material_code {
        Ok(p) => p,
        Err(rejection) => return errors::path_rejection_to_response(rejection),
    };
    let Query(page) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };

    let material_code = match MaterialCode::try_from(material_code) {
        Ok(code) => code,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.records_by_material(&material_code, page.into()).await {
        Ok(records) => (StatusCode::OK, Json(dto::CommonResponse::success(records))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn unprocessed_records(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(page) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };

    match services.unprocessed_records(page.into()).await {
        Ok(records) => (StatusCode::OK, Json(dto::CommonResponse::success(records))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
