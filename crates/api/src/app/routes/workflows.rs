use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;

use flowgraph_core::AggregateId;
use flowgraph_infra::services::{
    AddEdgeInput, AddNodeDefinitionInput, CreateWorkflowInput, UpdateWorkflowInput,
};
use flowgraph_workflow::{EdgeId, NodeDefinitionId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_workflow).get(list_workflows))
        .route(
            "/:id",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/:id/nodes", post(add_node_definition))
        .route("/:id/nodes/:node_id", delete(remove_node_definition))
        .route("/:id/edges", post(add_edge))
        .route("/:id/edges/:edge_id", delete(remove_edge))
}

pub async fn create_workflow(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateWorkflowRequest>,
) -> axum::response::Response {
    if body.name.trim().is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "name must not be empty",
        );
    }

    let input = CreateWorkflowInput {
        name: body.name,
        description: body.description,
    };
    match services.workflow_write.create(input).await {
        Ok(workflow) => (
            StatusCode::CREATED,
            Json(dto::WorkflowResponse::from(&workflow)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_workflows(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.workflow_read.list().await {
        Ok(workflows) => Json(
            workflows
                .iter()
                .map(dto::WorkflowResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_workflow(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AggregateId = match errors::parse_id(&id, "workflow") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.workflow_read.get(id).await {
        Ok(workflow) => Json(dto::WorkflowResponse::from(&workflow)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_workflow(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateWorkflowRequest>,
) -> axum::response::Response {
    let id: AggregateId = match errors::parse_id(&id, "workflow") {
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

    let input = UpdateWorkflowInput {
        name: body.name,
        description: body.description,
    };
    match services.workflow_write.update(id, input).await {
        Ok(workflow) => Json(dto::WorkflowResponse::from(&workflow)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_workflow(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AggregateId = match errors::parse_id(&id, "workflow") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.workflow_write.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn add_node_definition(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddNodeDefinitionRequest>,
) -> axum::response::Response {
    let id: AggregateId = match errors::parse_id(&id, "workflow") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if body.name.trim().is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "name must not be empty",
        );
    }

    let input = AddNodeDefinitionInput {
        node_template_id: AggregateId::from_uuid(body.node_template_id),
        name: body.name,
        config: body.config.unwrap_or_else(|| json!({})),
        position_x: body.position_x,
        position_y: body.position_y,
    };
    match services.workflow_write.add_node_definition(id, input).await {
        Ok(workflow) => (
            StatusCode::CREATED,
            Json(dto::WorkflowResponse::from(&workflow)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_node_definition(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, node_id)): Path<(String, String)>,
) -> axum::response::Response {
    let id: AggregateId = match errors::parse_id(&id, "workflow") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let node_id: NodeDefinitionId = match errors::parse_id(&node_id, "node definition") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .workflow_write
        .remove_node_definition(id, node_id)
        .await
    {
        Ok(workflow) => Json(dto::WorkflowResponse::from(&workflow)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn add_edge(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddEdgeRequest>,
) -> axum::response::Response {
    let id: AggregateId = match errors::parse_id(&id, "workflow") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let input = AddEdgeInput {
        from_node_definition_id: NodeDefinitionId::from_uuid(body.from_node_definition_id),
        to_node_definition_id: NodeDefinitionId::from_uuid(body.to_node_definition_id),
    };
    match services.workflow_write.add_edge(id, input).await {
        Ok(workflow) => (
            StatusCode::CREATED,
            Json(dto::WorkflowResponse::from(&workflow)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_edge(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, edge_id)): Path<(String, String)>,
) -> axum::response::Response {
    let id: AggregateId = match errors::parse_id(&id, "workflow") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let edge_id: EdgeId = match errors::parse_id(&edge_id, "edge") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.workflow_write.remove_edge(id, edge_id).await {
        Ok(workflow) => Json(dto::WorkflowResponse::from(&workflow)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
