//! Message repository for database operations
//!
//! Insert path enforces at-most-once storage per (tenant_id, content_hash);
//! the read paths serve the extraction job's oldest-first scan and the status
//! aggregates.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::db_err_is_unique_violation;
use crate::models::message::{self, Entity as Message};

/// Fields for one new message row.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub tenant_id: String,
    pub group_id: String,
    pub group_name: String,
    pub sender: String,
    pub body: String,
    pub payload: Option<JsonValue>,
    pub content_hash: String,
    pub sent_at: DateTime<Utc>,
}

/// Repository for message database operations
#[derive(Debug, Clone)]
pub struct MessageRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
}

impl MessageRepository {
    /// Creates a new MessageRepository instance
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a message unless its content hash already exists for the
    /// tenant. Returns `None` when the row was a duplicate.
    pub async fn insert_if_new(&self, new: NewMessage) -> Result<Option<message::Model>> {
        let active = message::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(new.tenant_id.clone()),
            group_id: Set(new.group_id),
            group_name: Set(new.group_name),
            sender: Set(new.sender),
            body: Set(new.body),
            payload: Set(new.payload),
            content_hash: Set(new.content_hash.clone()),
            processed: Set(false),
            sent_at: Set(new.sent_at.into()),
            created_at: Set(Utc::now().into()),
        };

        match active.insert(&*self.db).await {
            Ok(model) => Ok(Some(model)),
            Err(err) if db_err_is_unique_violation(&err) => {
                tracing::debug!(
                    tenant_id = %new.tenant_id,
                    content_hash = %new.content_hash,
                    "Duplicate message skipped"
                );
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch up to `limit` unprocessed messages, oldest first.
    pub async fn fetch_unprocessed(&self, limit: u64) -> Result<Vec<message::Model>> {
        let rows = Message::find()
            .filter(message::Column::Processed.eq(false))
            .order_by_asc(message::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// Mark the given messages as processed.
    pub async fn mark_processed(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Message::update_many()
            .col_expr(message::Column::Processed, Expr::value(true))
            .filter(message::Column::Id.is_in(ids.iter().copied()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Total stored messages.
    pub async fn total_count(&self) -> Result<u64> {
        Ok(Message::find().count(&*self.db).await?)
    }

    /// Stored messages the extraction job has already attempted.
    pub async fn processed_count(&self) -> Result<u64> {
        Ok(Message::find()
            .filter(message::Column::Processed.eq(true))
            .count(&*self.db)
            .await?)
    }
}
