use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use flowgraph_infra::services::ServiceError;
use flowgraph_workflow::WorkflowError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::NotFound(entity) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{entity} not found"))
        }
        ServiceError::Domain(domain) => match domain {
            WorkflowError::SelfLoop => json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invariant_violation",
                domain.to_string(),
            ),
            WorkflowError::DuplicateEdge => {
                json_error(StatusCode::CONFLICT, "conflict", domain.to_string())
            }
            WorkflowError::NodeDefinitionNotFound | WorkflowError::EdgeNotFound => {
                json_error(StatusCode::NOT_FOUND, "not_found", domain.to_string())
            }
        },
        ServiceError::Repository(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            e.to_string(),
        ),
        ServiceError::Transaction(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "transaction_error",
            e.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_id<T: std::str::FromStr>(
    raw: &str,
    what: &'static str,
) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
