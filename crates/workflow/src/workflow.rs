//! Workflow aggregate: a directed graph of node definitions and edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use flowgraph_core::{impl_uuid_id, Aggregate, AggregateId, AggregateMeta, DomainEvent};

use crate::events;

/// Identifier of a node instance within a workflow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeDefinitionId(Uuid);

/// Identifier of an edge within a workflow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(Uuid);

impl_uuid_id!(NodeDefinitionId, "NodeDefinitionId");
impl_uuid_id!(EdgeId, "EdgeId");

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("node definition not found")]
    NodeDefinitionNotFound,

    #[error("edge not found")]
    EdgeNotFound,

    #[error("edge already exists")]
    DuplicateEdge,

    #[error("edge cannot connect a node to itself")]
    SelfLoop,
}

/// A node instance placed on the workflow canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDefinition {
    pub id: NodeDefinitionId,
    pub workflow_id: AggregateId,
    pub node_template_id: AggregateId,
    pub name: String,
    pub config: Value,
    pub position_x: f64,
    pub position_y: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NodeDefinition {
    fn new(
        id: NodeDefinitionId,
        workflow_id: AggregateId,
        node_template_id: AggregateId,
        name: String,
        config: Value,
        position_x: f64,
        position_y: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            workflow_id,
            node_template_id,
            name,
            config,
            position_x,
            position_y,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: NodeDefinitionId,
        workflow_id: AggregateId,
        node_template_id: AggregateId,
        name: String,
        config: Value,
        position_x: f64,
        position_y: f64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            workflow_id,
            node_template_id,
            name,
            config,
            position_x,
            position_y,
            created_at,
            updated_at,
        }
    }
}

/// A directed connection between two node definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub workflow_id: AggregateId,
    pub from_node_definition_id: NodeDefinitionId,
    pub to_node_definition_id: NodeDefinitionId,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    fn new(
        id: EdgeId,
        workflow_id: AggregateId,
        from: NodeDefinitionId,
        to: NodeDefinitionId,
    ) -> Self {
        Self {
            id,
            workflow_id,
            from_node_definition_id: from,
            to_node_definition_id: to,
            created_at: Utc::now(),
        }
    }

    pub fn reconstitute(
        id: EdgeId,
        workflow_id: AggregateId,
        from: NodeDefinitionId,
        to: NodeDefinitionId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            workflow_id,
            from_node_definition_id: from,
            to_node_definition_id: to,
            created_at,
        }
    }
}

/// Aggregate root. All graph edits go through its methods so the structural
/// invariants (no self-loops, no duplicate edges, no dangling endpoints)
/// hold at every commit point, and so every edit buffers its domain event.
#[derive(Debug, Clone)]
pub struct Workflow {
    meta: AggregateMeta,
    pub name: String,
    pub description: String,
    node_definitions: Vec<NodeDefinition>,
    edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        let description = description.into();
        let id = AggregateId::new();
        let mut workflow = Self {
            meta: AggregateMeta::new(id),
            name,
            description,
            node_definitions: Vec::new(),
            edges: Vec::new(),
        };
        workflow.record(events::create_workflow(
            id,
            &workflow.name,
            &workflow.description,
        ));
        workflow
    }

    /// Rebuild from persisted state; children are attached separately.
    pub fn reconstitute(
        id: AggregateId,
        name: String,
        description: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            meta: AggregateMeta::reconstitute(id, created_at, updated_at),
            name,
            description,
            node_definitions: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn id(&self) -> AggregateId {
        self.meta.id()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.meta.created_at()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.meta.updated_at()
    }

    pub fn node_definitions(&self) -> &[NodeDefinition] {
        &self.node_definitions
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn update_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.meta.touch(Utc::now());
        self.record(events::update_workflow(
            self.id(),
            &self.name,
            &self.description,
        ));
    }

    pub fn update_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.meta.touch(Utc::now());
        self.record(events::update_workflow(
            self.id(),
            &self.name,
            &self.description,
        ));
    }

    pub fn add_node_definition(
        &mut self,
        node_template_id: AggregateId,
        name: impl Into<String>,
        config: Value,
        position_x: f64,
        position_y: f64,
    ) -> NodeDefinitionId {
        let node_id = NodeDefinitionId::new();
        let node = NodeDefinition::new(
            node_id,
            self.id(),
            node_template_id,
            name.into(),
            config,
            position_x,
            position_y,
        );
        let event = events::add_node_definition(
            self.id(),
            node_id,
            node_template_id,
            &node.name,
            &node.config,
        );
        self.node_definitions.push(node);
        self.meta.touch(Utc::now());
        self.record(event);
        node_id
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node_definition(
        &mut self,
        node_id: NodeDefinitionId,
    ) -> Result<(), WorkflowError> {
        let before = self.node_definitions.len();
        self.node_definitions.retain(|n| n.id != node_id);
        if self.node_definitions.len() == before {
            return Err(WorkflowError::NodeDefinitionNotFound);
        }

        self.edges.retain(|e| {
            e.from_node_definition_id != node_id && e.to_node_definition_id != node_id
        });

        self.meta.touch(Utc::now());
        self.record(events::remove_node_definition(self.id(), node_id));
        Ok(())
    }

    pub fn node_definition(&self, node_id: NodeDefinitionId) -> Option<&NodeDefinition> {
        self.node_definitions.iter().find(|n| n.id == node_id)
    }

    pub fn add_edge(
        &mut self,
        from: NodeDefinitionId,
        to: NodeDefinitionId,
    ) -> Result<EdgeId, WorkflowError> {
        if from == to {
            return Err(WorkflowError::SelfLoop);
        }

        let from_exists = self.node_definitions.iter().any(|n| n.id == from);
        let to_exists = self.node_definitions.iter().any(|n| n.id == to);
        if !from_exists || !to_exists {
            return Err(WorkflowError::NodeDefinitionNotFound);
        }

        if self
            .edges
            .iter()
            .any(|e| e.from_node_definition_id == from && e.to_node_definition_id == to)
        {
            return Err(WorkflowError::DuplicateEdge);
        }

        let edge_id = EdgeId::new();
        self.edges.push(Edge::new(edge_id, self.id(), from, to));
        self.meta.touch(Utc::now());
        self.record(events::add_edge(self.id(), edge_id, from, to));
        Ok(edge_id)
    }

    pub fn remove_edge(&mut self, edge_id: EdgeId) -> Result<(), WorkflowError> {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != edge_id);
        if self.edges.len() == before {
            return Err(WorkflowError::EdgeNotFound);
        }
        self.meta.touch(Utc::now());
        self.record(events::remove_edge(self.id(), edge_id));
        Ok(())
    }

    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == edge_id)
    }

    /// Attach rehydrated children (used by the read repository only).
    pub fn set_node_definitions(&mut self, node_definitions: Vec<NodeDefinition>) {
        self.node_definitions = node_definitions;
    }

    /// Attach rehydrated children (used by the read repository only).
    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
    }
}

impl Aggregate for Workflow {
    fn aggregate_id(&self) -> AggregateId {
        self.meta.id()
    }

    fn record(&mut self, event: DomainEvent) {
        self.meta.record(event);
    }

    fn pending_events(&self) -> &[DomainEvent] {
        self.meta.pending_events()
    }

    fn clear_events(&mut self) {
        self.meta.clear_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn workflow_with_nodes(n: usize) -> (Workflow, Vec<NodeDefinitionId>) {
        let mut workflow = Workflow::new("wf", "test workflow");
        let ids = (0..n)
            .map(|i| {
                workflow
                    .add_node_definition(
                        AggregateId::new(),
                        format!("node-{i}"),
                        json!({}),
                        i as f64,
                        0.0,
                    )
            })
            .collect();
        workflow.clear_events();
        (workflow, ids)
    }

    #[test]
    fn creation_buffers_a_create_event() {
        let workflow = Workflow::new("wf", "desc");
        let events = workflow.pending_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "CreateWorkflow");
        assert_eq!(events[0].aggregate_id(), workflow.id());
        assert_eq!(events[0].aggregate_type(), "Workflow");
    }

    #[test]
    fn add_edge_rejects_self_loop() {
        let (mut workflow, ids) = workflow_with_nodes(1);
        assert_eq!(
            workflow.add_edge(ids[0], ids[0]).unwrap_err(),
            WorkflowError::SelfLoop
        );
        assert!(workflow.pending_events().is_empty());
    }

    #[test]
    fn add_edge_rejects_missing_endpoints() {
        let (mut workflow, ids) = workflow_with_nodes(1);
        assert_eq!(
            workflow.add_edge(ids[0], NodeDefinitionId::new()).unwrap_err(),
            WorkflowError::NodeDefinitionNotFound
        );
    }

    #[test]
    fn add_edge_rejects_duplicates_but_allows_reverse() {
        let (mut workflow, ids) = workflow_with_nodes(2);
        workflow.add_edge(ids[0], ids[1]).unwrap();
        assert_eq!(
            workflow.add_edge(ids[0], ids[1]).unwrap_err(),
            WorkflowError::DuplicateEdge
        );
        // Reverse direction is a different edge.
        workflow.add_edge(ids[1], ids[0]).unwrap();
        assert_eq!(workflow.edges().len(), 2);
    }

    #[test]
    fn removing_a_node_cascades_to_its_edges() {
        let (mut workflow, ids) = workflow_with_nodes(3);
        workflow.add_edge(ids[0], ids[1]).unwrap();
        workflow.add_edge(ids[1], ids[2]).unwrap();
        workflow.add_edge(ids[0], ids[2]).unwrap();

        workflow.remove_node_definition(ids[1]).unwrap();

        assert_eq!(workflow.node_definitions().len(), 2);
        assert_eq!(workflow.edges().len(), 1);
        assert_eq!(workflow.edges()[0].from_node_definition_id, ids[0]);
        assert_eq!(workflow.edges()[0].to_node_definition_id, ids[2]);
    }

    #[test]
    fn remove_missing_node_or_edge_errors_without_events() {
        let (mut workflow, _) = workflow_with_nodes(1);
        assert_eq!(
            workflow
                .remove_node_definition(NodeDefinitionId::new())
                .unwrap_err(),
            WorkflowError::NodeDefinitionNotFound
        );
        assert_eq!(
            workflow.remove_edge(EdgeId::new()).unwrap_err(),
            WorkflowError::EdgeNotFound
        );
        assert!(workflow.pending_events().is_empty());
    }

    #[test]
    fn each_mutation_buffers_one_event_in_order() {
        let mut workflow = Workflow::new("wf", "desc");
        let a = workflow.add_node_definition(AggregateId::new(), "a", json!({}), 0.0, 0.0);
        let b = workflow.add_node_definition(AggregateId::new(), "b", json!({}), 1.0, 0.0);
        workflow.add_edge(a, b).unwrap();
        workflow.update_name("renamed");

        let types: Vec<_> = workflow
            .pending_events()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(
            types,
            vec![
                "CreateWorkflow",
                "AddNodeDefinition",
                "AddNodeDefinition",
                "AddEdge",
                "UpdateWorkflow",
            ]
        );
    }

    #[test]
    fn mutations_touch_updated_at() {
        let mut workflow = Workflow::new("wf", "desc");
        let created = workflow.created_at();
        workflow.update_description("new description");
        assert!(workflow.updated_at() >= created);
        assert_eq!(workflow.created_at(), created);
    }

    proptest! {
        /// However a graph was built, a second insert of any existing
        /// (from, to) pair must be rejected as a duplicate.
        #[test]
        fn duplicate_edges_never_accepted(n in 2usize..6, seed in 0usize..64) {
            let (mut workflow, ids) = workflow_with_nodes(n);
            let from = ids[seed % n];
            let to = ids[(seed / n + 1 + seed % (n - 1)) % n];
            prop_assume!(from != to);

            workflow.add_edge(from, to).unwrap();
            prop_assert_eq!(
                workflow.add_edge(from, to).unwrap_err(),
                WorkflowError::DuplicateEdge
            );
        }
    }
}
