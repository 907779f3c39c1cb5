use serde::{Deserialize, Serialize};
use serde_json::Value;

use chrono::{DateTime, Utc};
use flowgraph_core::AggregateId;
use flowgraph_infra::outbox::OutboxMessage;
use flowgraph_workflow::{Edge, EdgeId, NodeDefinition, NodeDefinitionId, NodeTemplate, Workflow};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddNodeDefinitionRequest {
    pub node_template_id: uuid::Uuid,
    pub name: String,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
}

#[derive(Debug, Deserialize)]
pub struct AddEdgeRequest {
    pub from_node_definition_id: uuid::Uuid,
    pub to_node_definition_id: uuid::Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateNodeTemplateRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNodeTemplateRequest {
    pub name: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: AggregateId,
    pub name: String,
    pub description: String,
    pub node_definitions: Vec<NodeDefinitionResponse>,
    pub edges: Vec<EdgeResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Workflow> for WorkflowResponse {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id(),
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            node_definitions: workflow
                .node_definitions()
                .iter()
                .map(NodeDefinitionResponse::from)
                .collect(),
            edges: workflow.edges().iter().map(EdgeResponse::from).collect(),
            created_at: workflow.created_at(),
            updated_at: workflow.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NodeDefinitionResponse {
    pub id: NodeDefinitionId,
    pub node_template_id: AggregateId,
    pub name: String,
    pub config: Value,
    pub position_x: f64,
    pub position_y: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&NodeDefinition> for NodeDefinitionResponse {
    fn from(node: &NodeDefinition) -> Self {
        Self {
            id: node.id,
            node_template_id: node.node_template_id,
            name: node.name.clone(),
            config: node.config.clone(),
            position_x: node.position_x,
            position_y: node.position_y,
            created_at: node.created_at,
            updated_at: node.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EdgeResponse {
    pub id: EdgeId,
    pub from_node_definition_id: NodeDefinitionId,
    pub to_node_definition_id: NodeDefinitionId,
    pub created_at: DateTime<Utc>,
}

impl From<&Edge> for EdgeResponse {
    fn from(edge: &Edge) -> Self {
        Self {
            id: edge.id,
            from_node_definition_id: edge.from_node_definition_id,
            to_node_definition_id: edge.to_node_definition_id,
            created_at: edge.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NodeTemplateResponse {
    pub id: AggregateId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&NodeTemplate> for NodeTemplateResponse {
    fn from(template: &NodeTemplate) -> Self {
        Self {
            id: template.id(),
            name: template.name.clone(),
            created_at: template.created_at(),
            updated_at: template.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeadLetterResponse {
    pub id: flowgraph_core::EventId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub retry_count: i32,
}

impl From<&OutboxMessage> for DeadLetterResponse {
    fn from(message: &OutboxMessage) -> Self {
        Self {
            id: message.id,
            aggregate_id: message.aggregate_id,
            aggregate_type: message.aggregate_type.clone(),
            event_type: message.event_type.clone(),
            payload: message.payload.clone(),
            created_at: message.created_at,
            retry_count: message.retry_count,
        }
    }
}
