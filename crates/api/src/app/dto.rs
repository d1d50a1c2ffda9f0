use serde::{Deserialize, Serialize};

use stocktake_infra::engine::{BatchSummary, CheckError, CheckErrorKind, CheckReceipt};
use stocktake_infra::store::Pagination;
use stocktake_inventory::InventoryCheckInput;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /check/upload`.
#[derive(Debug, Deserialize)]
pub struct InventoryCheckRequest {
    pub checker_id: String,
    pub location_code: String,
    pub material_code: String,
    pub actual_quantity: i64,
}

impl From<InventoryCheckRequest> for InventoryCheckInput {
    fn from(req: InventoryCheckRequest) -> Self {
        InventoryCheckInput::new(req.checker_id, req.location_code, req.material_code, req.actual_quantity)
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchCheckRequest {
    pub items: Vec<InventoryCheckRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<PageQuery> for Pagination {
    fn from(q: PageQuery) -> Self {
        Pagination::new(q.limit, q.offset)
    }
}

// -------------------------
// Response DTOs
// -------------------------

/// Envelope for every JSON response: `code` 0 on success, -1 on failure.
#[derive(Debug, Serialize)]
pub struct CommonResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> CommonResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchItemError {
    pub kind: CheckErrorKind,
    pub message: String,
}

/// Outcome of one batch item; `index` is its position in the request.
#[derive(Debug, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<CheckReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchItemError>,
}

#[derive(Debug, Serialize)]
pub struct BatchCheckResponse {
    pub summary: BatchSummary,
    pub results: Vec<BatchItemResult>,
}

impl BatchCheckResponse {
    pub fn from_results(results: Vec<Result<CheckReceipt, CheckError>>) -> Self {
        let summary = BatchSummary::from_results(&results);
        let results = results
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(receipt) => BatchItemResult {
                    index,
                    success: true,
                    receipt: Some(receipt),
                    error: None,
                },
                Err(err) => BatchItemResult {
                    index,
                    success: false,
                    receipt: None,
                    error: Some(BatchItemError {
                        kind: err.kind(),
                        message: err.to_string(),
                    }),
                },
            })
            .collect();

        Self { summary, results }
    }
}
