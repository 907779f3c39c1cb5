//! Node template persistence.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row};

use flowgraph_core::AggregateId;
use flowgraph_workflow::NodeTemplate;

use crate::uow::{Querier, UnitOfWork};

use super::RepositoryError;

#[derive(Debug, Clone, Default)]
pub struct NodeTemplateWriteRepository;

impl NodeTemplateWriteRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn save(
        &self,
        uow: &mut UnitOfWork,
        template: &Arc<Mutex<NodeTemplate>>,
    ) -> Result<(), RepositoryError> {
        let (id, name, created_at, updated_at) = {
            let t = template.lock().unwrap();
            (*t.id().as_uuid(), t.name.clone(), t.created_at(), t.updated_at())
        };
        uow.querier()
            .execute(
                sqlx::query(
                    "INSERT INTO node_template (id, name, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(id)
                .bind(name)
                .bind(created_at)
                .bind(updated_at),
            )
            .await?;
        uow.register_new(template);
        Ok(())
    }

    pub async fn update(
        &self,
        uow: &mut UnitOfWork,
        template: &Arc<Mutex<NodeTemplate>>,
    ) -> Result<(), RepositoryError> {
        let (id, name, updated_at) = {
            let t = template.lock().unwrap();
            (*t.id().as_uuid(), t.name.clone(), t.updated_at())
        };
        uow.querier()
            .execute(
                sqlx::query("UPDATE node_template SET name = $1, updated_at = $2 WHERE id = $3")
                    .bind(name)
                    .bind(updated_at)
                    .bind(id),
            )
            .await?;
        uow.register_dirty(template);
        Ok(())
    }

    pub async fn delete(
        &self,
        uow: &mut UnitOfWork,
        template: &Arc<Mutex<NodeTemplate>>,
    ) -> Result<(), RepositoryError> {
        let id = *template.lock().unwrap().id().as_uuid();
        uow.querier()
            .execute(sqlx::query("DELETE FROM node_template WHERE id = $1").bind(id))
            .await?;
        uow.register_deleted(template);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeTemplateReadRepository;

impl NodeTemplateReadRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_many(&self, q: &mut Querier<'_>) -> Result<Vec<NodeTemplate>, RepositoryError> {
        let rows = q
            .fetch_all(sqlx::query(
                "SELECT id, name, created_at, updated_at FROM node_template ORDER BY created_at DESC",
            ))
            .await?;

        let mut templates = Vec::with_capacity(rows.len());
        for row in rows {
            templates.push(NodeTemplateRow::from_row(&row)?.into());
        }
        Ok(templates)
    }

    pub async fn find_by_id(
        &self,
        q: &mut Querier<'_>,
        id: AggregateId,
    ) -> Result<Option<NodeTemplate>, RepositoryError> {
        let row = q
            .fetch_optional(
                sqlx::query(
                    "SELECT id, name, created_at, updated_at FROM node_template WHERE id = $1",
                )
                .bind(*id.as_uuid()),
            )
            .await?;

        Ok(match row {
            Some(row) => Some(NodeTemplateRow::from_row(&row)?.into()),
            None => None,
        })
    }
}

#[derive(Debug)]
struct NodeTemplateRow {
    id: uuid::Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for NodeTemplateRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(NodeTemplateRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<NodeTemplateRow> for NodeTemplate {
    fn from(row: NodeTemplateRow) -> Self {
        NodeTemplate::reconstitute(
            AggregateId::from_uuid(row.id),
            row.name,
            row.created_at,
            row.updated_at,
        )
    }
}
