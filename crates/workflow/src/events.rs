//! Typed constructors for the domain events this crate emits.
//!
//! Each constructor freezes the event's payload shape in one place. Payloads
//! are plain JSON documents; the outbox treats them as opaque.

use serde_json::{json, Value};

use flowgraph_core::{AggregateId, DomainEvent};

use crate::workflow::{EdgeId, NodeDefinitionId};

pub const WORKFLOW_AGGREGATE: &str = "Workflow";
pub const NODE_TEMPLATE_AGGREGATE: &str = "NodeTemplate";

pub fn create_workflow(workflow_id: AggregateId, name: &str, description: &str) -> DomainEvent {
    DomainEvent::new(
        workflow_id,
        WORKFLOW_AGGREGATE,
        "CreateWorkflow",
        json!({
            "workflow_id": workflow_id,
            "name": name,
            "description": description,
        }),
    )
}

/// Emitted for every name/description change; carries the full current state.
pub fn update_workflow(workflow_id: AggregateId, name: &str, description: &str) -> DomainEvent {
    DomainEvent::new(
        workflow_id,
        WORKFLOW_AGGREGATE,
        "UpdateWorkflow",
        json!({
            "workflow_id": workflow_id,
            "name": name,
            "description": description,
        }),
    )
}

pub fn add_node_definition(
    workflow_id: AggregateId,
    node_definition_id: NodeDefinitionId,
    node_template_id: AggregateId,
    name: &str,
    config: &Value,
) -> DomainEvent {
    DomainEvent::new(
        workflow_id,
        WORKFLOW_AGGREGATE,
        "AddNodeDefinition",
        json!({
            "workflow_id": workflow_id,
            "node_definition_id": node_definition_id,
            "node_template_id": node_template_id,
            "name": name,
            "config": config,
        }),
    )
}

pub fn remove_node_definition(
    workflow_id: AggregateId,
    node_definition_id: NodeDefinitionId,
) -> DomainEvent {
    DomainEvent::new(
        workflow_id,
        WORKFLOW_AGGREGATE,
        "RemoveNodeDefinition",
        json!({
            "workflow_id": workflow_id,
            "node_definition_id": node_definition_id,
        }),
    )
}

pub fn add_edge(
    workflow_id: AggregateId,
    edge_id: EdgeId,
    from: NodeDefinitionId,
    to: NodeDefinitionId,
) -> DomainEvent {
    DomainEvent::new(
        workflow_id,
        WORKFLOW_AGGREGATE,
        "AddEdge",
        json!({
            "workflow_id": workflow_id,
            "edge_id": edge_id,
            "from_node_definition_id": from,
            "to_node_definition_id": to,
        }),
    )
}

pub fn remove_edge(workflow_id: AggregateId, edge_id: EdgeId) -> DomainEvent {
    DomainEvent::new(
        workflow_id,
        WORKFLOW_AGGREGATE,
        "RemoveEdge",
        json!({
            "workflow_id": workflow_id,
            "edge_id": edge_id,
        }),
    )
}

pub fn create_node_template(template_id: AggregateId, name: &str) -> DomainEvent {
    DomainEvent::new(
        template_id,
        NODE_TEMPLATE_AGGREGATE,
        "CreateNodeTemplate",
        json!({
            "node_template_id": template_id,
            "name": name,
        }),
    )
}

pub fn update_node_template(template_id: AggregateId, name: &str) -> DomainEvent {
    DomainEvent::new(
        template_id,
        NODE_TEMPLATE_AGGREGATE,
        "UpdateNodeTemplate",
        json!({
            "node_template_id": template_id,
            "name": name,
        }),
    )
}
