//! Service wiring shared by all handlers.

use std::sync::Arc;

use sqlx::PgPool;

use flowgraph_infra::outbox::{OutboxProcessorConfig, OutboxReader, PostgresOutboxStore};
use flowgraph_infra::services::{
    NodeTemplateReadService, NodeTemplateWriteService, WorkflowReadService, WorkflowWriteService,
};
use flowgraph_infra::uow::UnitOfWorkFactory;

pub struct AppServices {
    pub workflow_read: WorkflowReadService,
    pub workflow_write: WorkflowWriteService,
    pub node_template_read: NodeTemplateReadService,
    pub node_template_write: NodeTemplateWriteService,
    pub outbox_reader: Arc<dyn OutboxReader>,
    pub outbox_config: OutboxProcessorConfig,
}

pub fn build_services(pool: PgPool, outbox_config: OutboxProcessorConfig) -> AppServices {
    let uow_factory = UnitOfWorkFactory::new(pool.clone());
    let outbox_reader: Arc<dyn OutboxReader> = Arc::new(PostgresOutboxStore::new(pool.clone()));

    AppServices {
        workflow_read: WorkflowReadService::new(pool.clone()),
        workflow_write: WorkflowWriteService::new(uow_factory.clone()),
        node_template_read: NodeTemplateReadService::new(pool),
        node_template_write: NodeTemplateWriteService::new(uow_factory),
        outbox_reader,
        outbox_config,
    }
}
