//! Persistence for the workflow and node-template aggregates.
//!
//! Write repositories issue their statements through the unit of work's
//! [`Querier`](crate::uow::Querier) and register the aggregate with the unit
//! of work so its events reach the outbox on commit. Read repositories take
//! a `Querier` directly and work both inside and outside a transaction.

use thiserror::Error;

pub mod node_template;
pub mod workflow;

pub use node_template::{NodeTemplateReadRepository, NodeTemplateWriteRepository};
pub use workflow::{WorkflowReadRepository, WorkflowWriteRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
