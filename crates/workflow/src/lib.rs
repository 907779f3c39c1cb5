//! `flowgraph-workflow`: the workflow-definition domain.
//!
//! Two aggregate roots live here: [`Workflow`] (a directed graph of node
//! instances and edges) and [`NodeTemplate`] (a reusable node blueprint).
//! Every state-changing operation buffers a domain event on the aggregate;
//! persistence and delivery are infrastructure concerns.

pub mod events;
pub mod node_template;
pub mod workflow;

pub use node_template::NodeTemplate;
pub use workflow::{Edge, EdgeId, NodeDefinition, NodeDefinitionId, Workflow, WorkflowError};
