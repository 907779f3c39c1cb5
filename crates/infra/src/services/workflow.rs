//! Workflow use cases.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use sqlx::PgPool;
use tracing::instrument;

use flowgraph_core::AggregateId;
use flowgraph_workflow::{EdgeId, NodeDefinitionId, Workflow};

use crate::repositories::{WorkflowReadRepository, WorkflowWriteRepository};
use crate::uow::{Querier, UnitOfWork, UnitOfWorkFactory};

use super::{settle, ServiceError};

#[derive(Debug, Clone)]
pub struct CreateWorkflowInput {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateWorkflowInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddNodeDefinitionInput {
    pub node_template_id: AggregateId,
    pub name: String,
    pub config: Value,
    pub position_x: f64,
    pub position_y: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct AddEdgeInput {
    pub from_node_definition_id: NodeDefinitionId,
    pub to_node_definition_id: NodeDefinitionId,
}

/// Mutating workflow operations, one unit of work per call.
#[derive(Debug, Clone)]
pub struct WorkflowWriteService {
    uow_factory: UnitOfWorkFactory,
    write_repo: WorkflowWriteRepository,
    read_repo: WorkflowReadRepository,
}

impl WorkflowWriteService {
    pub fn new(uow_factory: UnitOfWorkFactory) -> Self {
        Self {
            uow_factory,
            write_repo: WorkflowWriteRepository::new(),
            read_repo: WorkflowReadRepository::new(),
        }
    }

    #[instrument(skip(self, input), err)]
    pub async fn create(&self, input: CreateWorkflowInput) -> Result<Workflow, ServiceError> {
        let mut uow = self.uow_factory.create();
        uow.begin().await?;

        let workflow = Arc::new(Mutex::new(Workflow::new(input.name, input.description)));
        let staged = self
            .write_repo
            .save(&mut uow, &workflow)
            .await
            .map_err(ServiceError::from);
        settle(&mut uow, staged).await?;

        Ok(snapshot(&workflow))
    }

    #[instrument(skip(self, input), err)]
    pub async fn update(
        &self,
        id: AggregateId,
        input: UpdateWorkflowInput,
    ) -> Result<Workflow, ServiceError> {
        let mut uow = self.uow_factory.create();
        uow.begin().await?;
        let staged = self.stage_update(&mut uow, id, input).await;
        let workflow = settle(&mut uow, staged).await?;
        Ok(snapshot(&workflow))
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: AggregateId) -> Result<(), ServiceError> {
        let mut uow = self.uow_factory.create();
        uow.begin().await?;
        let staged = self.stage_delete(&mut uow, id).await;
        settle(&mut uow, staged).await
    }

    #[instrument(skip(self, input), err)]
    pub async fn add_node_definition(
        &self,
        workflow_id: AggregateId,
        input: AddNodeDefinitionInput,
    ) -> Result<Workflow, ServiceError> {
        let mut uow = self.uow_factory.create();
        uow.begin().await?;
        let staged = self.stage_add_node(&mut uow, workflow_id, input).await;
        let workflow = settle(&mut uow, staged).await?;
        Ok(snapshot(&workflow))
    }

    #[instrument(skip(self), err)]
    pub async fn remove_node_definition(
        &self,
        workflow_id: AggregateId,
        node_id: NodeDefinitionId,
    ) -> Result<Workflow, ServiceError> {
        let mut uow = self.uow_factory.create();
        uow.begin().await?;
        let staged = self.stage_remove_node(&mut uow, workflow_id, node_id).await;
        let workflow = settle(&mut uow, staged).await?;
        Ok(snapshot(&workflow))
    }

    #[instrument(skip(self), err)]
    pub async fn add_edge(
        &self,
        workflow_id: AggregateId,
        input: AddEdgeInput,
    ) -> Result<Workflow, ServiceError> {
        let mut uow = self.uow_factory.create();
        uow.begin().await?;
        let staged = self.stage_add_edge(&mut uow, workflow_id, input).await;
        let workflow = settle(&mut uow, staged).await?;
        Ok(snapshot(&workflow))
    }

    #[instrument(skip(self), err)]
    pub async fn remove_edge(
        &self,
        workflow_id: AggregateId,
        edge_id: EdgeId,
    ) -> Result<Workflow, ServiceError> {
        let mut uow = self.uow_factory.create();
        uow.begin().await?;
        let staged = self.stage_remove_edge(&mut uow, workflow_id, edge_id).await;
        let workflow = settle(&mut uow, staged).await?;
        Ok(snapshot(&workflow))
    }

    async fn load(
        &self,
        uow: &mut UnitOfWork,
        id: AggregateId,
    ) -> Result<Arc<Mutex<Workflow>>, ServiceError> {
        let workflow = self
            .read_repo
            .find_by_id(&mut uow.querier(), id)
            .await?
            .ok_or(ServiceError::NotFound("workflow"))?;
        Ok(Arc::new(Mutex::new(workflow)))
    }

    async fn stage_update(
        &self,
        uow: &mut UnitOfWork,
        id: AggregateId,
        input: UpdateWorkflowInput,
    ) -> Result<Arc<Mutex<Workflow>>, ServiceError> {
        let workflow = self.load(uow, id).await?;
        {
            let mut wf = workflow.lock().unwrap();
            if let Some(name) = input.name {
                wf.update_name(name);
            }
            if let Some(description) = input.description {
                wf.update_description(description);
            }
        }
        self.write_repo.update(uow, &workflow).await?;
        Ok(workflow)
    }

    async fn stage_delete(&self, uow: &mut UnitOfWork, id: AggregateId) -> Result<(), ServiceError> {
        let workflow = self.load(uow, id).await?;
        self.write_repo.delete(uow, &workflow).await?;
        Ok(())
    }

    async fn stage_add_node(
        &self,
        uow: &mut UnitOfWork,
        workflow_id: AggregateId,
        input: AddNodeDefinitionInput,
    ) -> Result<Arc<Mutex<Workflow>>, ServiceError> {
        let workflow = self.load(uow, workflow_id).await?;
        let node = {
            let mut wf = workflow.lock().unwrap();
            let node_id = wf.add_node_definition(
                input.node_template_id,
                input.name,
                input.config,
                input.position_x,
                input.position_y,
            );
            wf.node_definition(node_id).cloned()
        };
        if let Some(node) = node {
            self.write_repo.save_node_definition(uow, &node).await?;
        }
        self.write_repo.update(uow, &workflow).await?;
        Ok(workflow)
    }

    async fn stage_remove_node(
        &self,
        uow: &mut UnitOfWork,
        workflow_id: AggregateId,
        node_id: NodeDefinitionId,
    ) -> Result<Arc<Mutex<Workflow>>, ServiceError> {
        let workflow = self.load(uow, workflow_id).await?;
        workflow.lock().unwrap().remove_node_definition(node_id)?;
        // Edge rows cascade with the node row.
        self.write_repo.delete_node_definition(uow, node_id).await?;
        self.write_repo.update(uow, &workflow).await?;
        Ok(workflow)
    }

    async fn stage_add_edge(
        &self,
        uow: &mut UnitOfWork,
        workflow_id: AggregateId,
        input: AddEdgeInput,
    ) -> Result<Arc<Mutex<Workflow>>, ServiceError> {
        let workflow = self.load(uow, workflow_id).await?;
        let edge = {
            let mut wf = workflow.lock().unwrap();
            let edge_id = wf.add_edge(
                input.from_node_definition_id,
                input.to_node_definition_id,
            )?;
            wf.edge(edge_id).cloned()
        };
        if let Some(edge) = edge {
            self.write_repo.save_edge(uow, &edge).await?;
        }
        self.write_repo.update(uow, &workflow).await?;
        Ok(workflow)
    }

    async fn stage_remove_edge(
        &self,
        uow: &mut UnitOfWork,
        workflow_id: AggregateId,
        edge_id: EdgeId,
    ) -> Result<Arc<Mutex<Workflow>>, ServiceError> {
        let workflow = self.load(uow, workflow_id).await?;
        workflow.lock().unwrap().remove_edge(edge_id)?;
        self.write_repo.delete_edge(uow, edge_id).await?;
        self.write_repo.update(uow, &workflow).await?;
        Ok(workflow)
    }
}

fn snapshot(workflow: &Arc<Mutex<Workflow>>) -> Workflow {
    workflow.lock().unwrap().clone()
}

/// Read-only workflow queries against the pool.
#[derive(Debug, Clone)]
pub struct WorkflowReadService {
    pool: PgPool,
    repo: WorkflowReadRepository,
}

impl WorkflowReadService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            repo: WorkflowReadRepository::new(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Workflow>, ServiceError> {
        let mut q = Querier::Pool(&self.pool);
        Ok(self.repo.find_many(&mut q).await?)
    }

    pub async fn get(&self, id: AggregateId) -> Result<Workflow, ServiceError> {
        let mut q = Querier::Pool(&self.pool);
        self.repo
            .find_by_id(&mut q, id)
            .await?
            .ok_or(ServiceError::NotFound("workflow"))
    }
}
