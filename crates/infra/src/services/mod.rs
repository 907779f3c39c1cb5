//! Application services.
//!
//! Each write operation runs inside its own unit of work: begin, mutate the
//! aggregate, stage the rows, then commit. Any failure rolls the transaction
//! back, which also discards the staged outbox rows.

use thiserror::Error;

use flowgraph_workflow::WorkflowError;

use crate::repositories::RepositoryError;
use crate::uow::{UnitOfWork, UowError};

pub mod node_template;
pub mod workflow;

pub use node_template::{
    CreateNodeTemplateInput, NodeTemplateReadService, NodeTemplateWriteService,
    UpdateNodeTemplateInput,
};
pub use workflow::{
    AddEdgeInput, AddNodeDefinitionInput, CreateWorkflowInput, UpdateWorkflowInput,
    WorkflowReadService, WorkflowWriteService,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Domain(#[from] WorkflowError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Transaction(#[from] UowError),
}

/// Commit on success, roll back on failure. A commit that fails with the
/// transaction still open (outbox insert error) is rolled back too.
pub(crate) async fn settle<T>(
    uow: &mut UnitOfWork,
    staged: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match staged {
        Ok(value) => match uow.commit().await {
            Ok(()) => Ok(value),
            Err(err) => {
                if uow.is_active() {
                    let _ = uow.rollback().await;
                }
                Err(err.into())
            }
        },
        Err(err) => {
            let _ = uow.rollback().await;
            Err(err)
        }
    }
}
