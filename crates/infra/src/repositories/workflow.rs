//! Workflow persistence.
//!
//! The aggregate maps to three tables: `workflow`, `node_definition`, and
//! `edge`. Child tables declare `ON DELETE CASCADE` on their workflow (and
//! node) foreign keys, so removing a workflow row or a node row also removes
//! the dependent rows.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, Row};

use flowgraph_core::AggregateId;
use flowgraph_workflow::{Edge, EdgeId, NodeDefinition, NodeDefinitionId, Workflow};

use crate::uow::{Querier, UnitOfWork};

use super::RepositoryError;

/// Writes workflow state through a unit of work.
#[derive(Debug, Clone, Default)]
pub struct WorkflowWriteRepository;

impl WorkflowWriteRepository {
    pub fn new() -> Self {
        Self
    }

    /// Insert the workflow row and track the aggregate as new.
    pub async fn save(
        &self,
        uow: &mut UnitOfWork,
        workflow: &Arc<Mutex<Workflow>>,
    ) -> Result<(), RepositoryError> {
        let (id, name, description, created_at, updated_at) = {
            let wf = workflow.lock().unwrap();
            (
                *wf.id().as_uuid(),
                wf.name.clone(),
                wf.description.clone(),
                wf.created_at(),
                wf.updated_at(),
            )
        };
        uow.querier()
            .execute(
                sqlx::query(
                    "INSERT INTO workflow (id, name, description, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(id)
                .bind(name)
                .bind(description)
                .bind(created_at)
                .bind(updated_at),
            )
            .await?;
        uow.register_new(workflow);
        Ok(())
    }

    /// Update the workflow row and track the aggregate as dirty.
    pub async fn update(
        &self,
        uow: &mut UnitOfWork,
        workflow: &Arc<Mutex<Workflow>>,
    ) -> Result<(), RepositoryError> {
        let (id, name, description, updated_at) = {
            let wf = workflow.lock().unwrap();
            (
                *wf.id().as_uuid(),
                wf.name.clone(),
                wf.description.clone(),
                wf.updated_at(),
            )
        };
        uow.querier()
            .execute(
                sqlx::query(
                    "UPDATE workflow SET name = $1, description = $2, updated_at = $3 WHERE id = $4",
                )
                .bind(name)
                .bind(description)
                .bind(updated_at)
                .bind(id),
            )
            .await?;
        uow.register_dirty(workflow);
        Ok(())
    }

    /// Delete the workflow row (children cascade) and track the aggregate as
    /// deleted.
    pub async fn delete(
        &self,
        uow: &mut UnitOfWork,
        workflow: &Arc<Mutex<Workflow>>,
    ) -> Result<(), RepositoryError> {
        let id = *workflow.lock().unwrap().id().as_uuid();
        uow.querier()
            .execute(sqlx::query("DELETE FROM workflow WHERE id = $1").bind(id))
            .await?;
        uow.register_deleted(workflow);
        Ok(())
    }

    pub async fn save_node_definition(
        &self,
        uow: &mut UnitOfWork,
        node: &NodeDefinition,
    ) -> Result<(), RepositoryError> {
        uow.querier()
            .execute(
                sqlx::query(
                    "INSERT INTO node_definition \
                     (id, workflow_id, node_template_id, name, config, position_x, position_y, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                )
                .bind(*node.id.as_uuid())
                .bind(*node.workflow_id.as_uuid())
                .bind(*node.node_template_id.as_uuid())
                .bind(node.name.clone())
                .bind(node.config.clone())
                .bind(node.position_x)
                .bind(node.position_y)
                .bind(node.created_at)
                .bind(node.updated_at),
            )
            .await?;
        Ok(())
    }

    /// Delete a node row; its edges cascade.
    pub async fn delete_node_definition(
        &self,
        uow: &mut UnitOfWork,
        node_id: NodeDefinitionId,
    ) -> Result<(), RepositoryError> {
        uow.querier()
            .execute(sqlx::query("DELETE FROM node_definition WHERE id = $1").bind(*node_id.as_uuid()))
            .await?;
        Ok(())
    }

    pub async fn save_edge(&self, uow: &mut UnitOfWork, edge: &Edge) -> Result<(), RepositoryError> {
        uow.querier()
            .execute(
                sqlx::query(
                    "INSERT INTO edge \
                     (id, workflow_id, from_node_definition_id, to_node_definition_id, created_at) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(*edge.id.as_uuid())
                .bind(*edge.workflow_id.as_uuid())
                .bind(*edge.from_node_definition_id.as_uuid())
                .bind(*edge.to_node_definition_id.as_uuid())
                .bind(edge.created_at),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_edge(
        &self,
        uow: &mut UnitOfWork,
        edge_id: EdgeId,
    ) -> Result<(), RepositoryError> {
        uow.querier()
            .execute(sqlx::query("DELETE FROM edge WHERE id = $1").bind(*edge_id.as_uuid()))
            .await?;
        Ok(())
    }
}

/// Reads workflows, rehydrating nodes and edges.
#[derive(Debug, Clone, Default)]
pub struct WorkflowReadRepository;

impl WorkflowReadRepository {
    pub fn new() -> Self {
        Self
    }

    /// List workflows without their children, newest first.
    pub async fn find_many(&self, q: &mut Querier<'_>) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = q
            .fetch_all(sqlx::query(
                "SELECT id, name, description, created_at, updated_at \
                 FROM workflow ORDER BY created_at DESC",
            ))
            .await?;

        let mut workflows = Vec::with_capacity(rows.len());
        for row in rows {
            workflows.push(WorkflowRow::from_row(&row)?.into());
        }
        Ok(workflows)
    }

    /// Load one workflow with its nodes and edges attached.
    pub async fn find_by_id(
        &self,
        q: &mut Querier<'_>,
        id: AggregateId,
    ) -> Result<Option<Workflow>, RepositoryError> {
        let row = q
            .fetch_optional(
                sqlx::query(
                    "SELECT id, name, description, created_at, updated_at \
                     FROM workflow WHERE id = $1",
                )
                .bind(*id.as_uuid()),
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut workflow: Workflow = WorkflowRow::from_row(&row)?.into();

        let node_rows = q
            .fetch_all(
                sqlx::query(
                    "SELECT id, workflow_id, node_template_id, name, config, \
                            position_x, position_y, created_at, updated_at \
                     FROM node_definition WHERE workflow_id = $1 ORDER BY created_at ASC",
                )
                .bind(*id.as_uuid()),
            )
            .await?;
        let mut nodes = Vec::with_capacity(node_rows.len());
        for row in node_rows {
            nodes.push(NodeDefinitionRow::from_row(&row)?.into());
        }
        workflow.set_node_definitions(nodes);

        let edge_rows = q
            .fetch_all(
                sqlx::query(
                    "SELECT id, workflow_id, from_node_definition_id, to_node_definition_id, created_at \
                     FROM edge WHERE workflow_id = $1 ORDER BY created_at ASC",
                )
                .bind(*id.as_uuid()),
            )
            .await?;
        let mut edges = Vec::with_capacity(edge_rows.len());
        for row in edge_rows {
            edges.push(EdgeRow::from_row(&row)?.into());
        }
        workflow.set_edges(edges);

        Ok(Some(workflow))
    }
}

#[derive(Debug)]
struct WorkflowRow {
    id: uuid::Uuid,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for WorkflowRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(WorkflowRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<WorkflowRow> for Workflow {
    fn from(row: WorkflowRow) -> Self {
        Workflow::reconstitute(
            AggregateId::from_uuid(row.id),
            row.name,
            row.description,
            row.created_at,
            row.updated_at,
        )
    }
}

#[derive(Debug)]
struct NodeDefinitionRow {
    id: uuid::Uuid,
    workflow_id: uuid::Uuid,
    node_template_id: uuid::Uuid,
    name: String,
    config: Value,
    position_x: f64,
    position_y: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for NodeDefinitionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(NodeDefinitionRow {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            node_template_id: row.try_get("node_template_id")?,
            name: row.try_get("name")?,
            config: row.try_get("config")?,
            position_x: row.try_get("position_x")?,
            position_y: row.try_get("position_y")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<NodeDefinitionRow> for NodeDefinition {
    fn from(row: NodeDefinitionRow) -> Self {
        NodeDefinition::reconstitute(
            NodeDefinitionId::from_uuid(row.id),
            AggregateId::from_uuid(row.workflow_id),
            AggregateId::from_uuid(row.node_template_id),
            row.name,
            row.config,
            row.position_x,
            row.position_y,
            row.created_at,
            row.updated_at,
        )
    }
}

#[derive(Debug)]
struct EdgeRow {
    id: uuid::Uuid,
    workflow_id: uuid::Uuid,
    from_node_definition_id: uuid::Uuid,
    to_node_definition_id: uuid::Uuid,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for EdgeRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(EdgeRow {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            from_node_definition_id: row.try_get("from_node_definition_id")?,
            to_node_definition_id: row.try_get("to_node_definition_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<EdgeRow> for Edge {
    fn from(row: EdgeRow) -> Self {
        Edge::reconstitute(
            EdgeId::from_uuid(row.id),
            AggregateId::from_uuid(row.workflow_id),
            NodeDefinitionId::from_uuid(row.from_node_definition_id),
            NodeDefinitionId::from_uuid(row.to_node_definition_id),
            row.created_at,
        )
    }
}
