//! Node template use cases.

use std::sync::{Arc, Mutex};

use sqlx::PgPool;
use tracing::instrument;

use flowgraph_core::AggregateId;
use flowgraph_workflow::NodeTemplate;

use crate::repositories::{NodeTemplateReadRepository, NodeTemplateWriteRepository};
use crate::uow::{Querier, UnitOfWork, UnitOfWorkFactory};

use super::{settle, ServiceError};

#[derive(Debug, Clone)]
pub struct CreateNodeTemplateInput {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateNodeTemplateInput {
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NodeTemplateWriteService {
    uow_factory: UnitOfWorkFactory,
    write_repo: NodeTemplateWriteRepository,
    read_repo: NodeTemplateReadRepository,
}

impl NodeTemplateWriteService {
    pub fn new(uow_factory: UnitOfWorkFactory) -> Self {
        Self {
            uow_factory,
            write_repo: NodeTemplateWriteRepository::new(),
            read_repo: NodeTemplateReadRepository::new(),
        }
    }

    #[instrument(skip(self, input), err)]
    pub async fn create(&self, input: CreateNodeTemplateInput) -> Result<NodeTemplate, ServiceError> {
        let mut uow = self.uow_factory.create();
        uow.begin().await?;

        let template = Arc::new(Mutex::new(NodeTemplate::new(input.name)));
        let staged = self
            .write_repo
            .save(&mut uow, &template)
            .await
            .map_err(ServiceError::from);
        settle(&mut uow, staged).await?;

        Ok(snapshot(&template))
    }

    #[instrument(skip(self, input), err)]
    pub async fn update(
        &self,
        id: AggregateId,
        input: UpdateNodeTemplateInput,
    ) -> Result<NodeTemplate, ServiceError> {
        let mut uow = self.uow_factory.create();
        uow.begin().await?;
        let staged = self.stage_update(&mut uow, id, input).await;
        let template = settle(&mut uow, staged).await?;
        Ok(snapshot(&template))
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: AggregateId) -> Result<(), ServiceError> {
        let mut uow = self.uow_factory.create();
        uow.begin().await?;
        let staged = self.stage_delete(&mut uow, id).await;
        settle(&mut uow, staged).await
    }

    async fn load(
        &self,
        uow: &mut UnitOfWork,
        id: AggregateId,
    ) -> Result<Arc<Mutex<NodeTemplate>>, ServiceError> {
        let template = self
            .read_repo
            .find_by_id(&mut uow.querier(), id)
            .await?
            .ok_or(ServiceError::NotFound("node template"))?;
        Ok(Arc::new(Mutex::new(template)))
    }

    async fn stage_update(
        &self,
        uow: &mut UnitOfWork,
        id: AggregateId,
        input: UpdateNodeTemplateInput,
    ) -> Result<Arc<Mutex<NodeTemplate>>, ServiceError> {
        let template = self.load(uow, id).await?;
        if let Some(name) = input.name {
            template.lock().unwrap().update_name(name);
        }
        self.write_repo.update(uow, &template).await?;
        Ok(template)
    }

    async fn stage_delete(&self, uow: &mut UnitOfWork, id: AggregateId) -> Result<(), ServiceError> {
        let template = self.load(uow, id).await?;
        self.write_repo.delete(uow, &template).await?;
        Ok(())
    }
}

fn snapshot(template: &Arc<Mutex<NodeTemplate>>) -> NodeTemplate {
    template.lock().unwrap().clone()
}

#[derive(Debug, Clone)]
pub struct NodeTemplateReadService {
    pool: PgPool,
    repo: NodeTemplateReadRepository,
}

impl NodeTemplateReadService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            repo: NodeTemplateReadRepository::new(),
        }
    }

    pub async fn list(&self) -> Result<Vec<NodeTemplate>, ServiceError> {
        let mut q = Querier::Pool(&self.pool);
        Ok(self.repo.find_many(&mut q).await?)
    }

    pub async fn get(&self, id: AggregateId) -> Result<NodeTemplate, ServiceError> {
        let mut q = Querier::Pool(&self.pool);
        self.repo
            .find_by_id(&mut q, id)
            .await?
            .ok_or(ServiceError::NotFound("node template"))
    }
}
