//! Group preference repository for database operations
//!
//! Stores which external groups a tenant monitors. Upserts are keyed on
//! (tenant_id, group_id).

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::group_preference::{self, Entity as GroupPreference};

/// Repository for group preference database operations
#[derive(Debug, Clone)]
pub struct GroupPreferenceRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
}

impl GroupPreferenceRepository {
    /// Creates a new GroupPreferenceRepository instance
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// List all preferences for the tenant, stable by group name.
    pub async fn list(&self, tenant_id: &str) -> Result<Vec<group_preference::Model>> {
        let rows = GroupPreference::find()
            .filter(group_preference::Column::TenantId.eq(tenant_id))
            .order_by_asc(group_preference::Column::GroupName)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// The set of group ids the tenant currently monitors.
    pub async fn enabled_group_ids(&self, tenant_id: &str) -> Result<HashSet<String>> {
        let rows = GroupPreference::find()
            .filter(group_preference::Column::TenantId.eq(tenant_id))
            .filter(group_preference::Column::Enabled.eq(true))
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(|row| row.group_id).collect())
    }

    /// Create or update one preference row.
    pub async fn upsert(
        &self,
        tenant_id: &str,
        group_id: &str,
        group_name: &str,
        enabled: bool,
    ) -> Result<group_preference::Model> {
        let now = Utc::now();

        if let Some(existing) = GroupPreference::find()
            .filter(group_preference::Column::TenantId.eq(tenant_id))
            .filter(group_preference::Column::GroupId.eq(group_id))
            .one(&*self.db)
            .await?
        {
            let active = group_preference::ActiveModel {
                id: Set(existing.id),
                group_name: Set(group_name.to_string()),
                enabled: Set(enabled),
                updated_at: Set(now.into()),
                ..Default::default()
            };
            return Ok(active.update(&*self.db).await?);
        }

        let active = group_preference::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id.to_string()),
            group_id: Set(group_id.to_string()),
            group_name: Set(group_name.to_string()),
            enabled: Set(enabled),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        Ok(active.insert(&*self.db).await?)
    }
}
