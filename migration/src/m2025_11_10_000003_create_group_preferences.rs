//! Migration to create the group_preferences table.
//!
//! Defines which external groups a tenant monitors for listing messages.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GroupPreferences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupPreferences::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupPreferences::TenantId).text().not_null())
                    .col(ColumnDef::new(GroupPreferences::GroupId).text().not_null())
                    .col(
                        ColumnDef::new(GroupPreferences::GroupName)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupPreferences::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(GroupPreferences::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(GroupPreferences::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_preferences_tenant_group")
                    .table(GroupPreferences::Table)
                    .col(GroupPreferences::TenantId)
                    .col(GroupPreferences::GroupId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_group_preferences_tenant_group")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(GroupPreferences::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GroupPreferences {
    Table,
    Id,
    TenantId,
    GroupId,
    GroupName,
    Enabled,
    CreatedAt,
    UpdatedAt,
}
