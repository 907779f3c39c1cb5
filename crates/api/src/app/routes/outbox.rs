use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/dead-letters", get(list_dead_letters))
}

#[derive(Debug, Deserialize)]
pub struct DeadLetterQuery {
    pub limit: Option<i64>,
}

/// Messages that exhausted their retries. They stay in the outbox until an
/// operator intervenes, so this endpoint is the place to watch.
pub async fn list_dead_letters(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<DeadLetterQuery>,
) -> axum::response::Response {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let max_retries = services.outbox_config.max_retries;

    let total = match services.outbox_reader.count_dead_letters(max_retries).await {
        Ok(count) => count,
        Err(e) => {
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                e.to_string(),
            )
        }
    };
    match services
        .outbox_reader
        .find_dead_letters(limit, max_retries)
        .await
    {
        Ok(messages) => Json(json!({
            "total": total,
            "dead_letters": messages
                .iter()
                .map(dto::DeadLetterResponse::from)
                .collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            e.to_string(),
        ),
    }
}
