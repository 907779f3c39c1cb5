use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use flowgraph_core::AggregateId;
use flowgraph_infra::services::{CreateNodeTemplateInput, UpdateNodeTemplateInput};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_node_template).get(list_node_templates))
        .route(
            "/:id",
            get(get_node_template)
                .put(update_node_template)
                .delete(delete_node_template),
        )
}

pub async fn create_node_template(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateNodeTemplateRequest>,
) -> axum::response::Response {
    if body.name.trim().is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "name must not be empty",
        );
    }

    let input = CreateNodeTemplateInput { name: body.name };
    match services.node_template_write.create(input).await {
        Ok(template) => (
            StatusCode::CREATED,
            Json(dto::NodeTemplateResponse::from(&template)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_node_templates(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.node_template_read.list().await {
        Ok(templates) => Json(
            templates
                .iter()
                .map(dto::NodeTemplateResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_node_template(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AggregateId = match errors::parse_id(&id, "node template") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.node_template_read.get(id).await {
        Ok(template) => Json(dto::NodeTemplateResponse::from(&template)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_node_template(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateNodeTemplateRequest>,
) -> axum::response::Response {
    let id: AggregateId = match errors::parse_id(&id, "node template") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if matches!(body.name.as_deref(), Some(name) if name.trim().is_empty()) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "name must not be empty",
        );
    }

    let input = UpdateNodeTemplateInput { name: body.name };
    match services.node_template_write.update(id, input).await {
        Ok(template) => Json(dto::NodeTemplateResponse::from(&template)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_node_template(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AggregateId = match errors::parse_id(&id, "node template") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.node_template_write.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
