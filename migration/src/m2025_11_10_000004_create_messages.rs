//! Migration to create the messages table.
//!
//! Durable store for relevance-filtered inbound group messages, deduplicated
//! per tenant by content hash and consumed by the extraction job.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Messages::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Messages::TenantId).text().not_null())
                    .col(ColumnDef::new(Messages::GroupId).text().not_null())
                    .col(ColumnDef::new(Messages::GroupName).text().not_null())
                    .col(ColumnDef::new(Messages::Sender).text().not_null())
                    .col(ColumnDef::new(Messages::Body).text().not_null())
                    .col(ColumnDef::new(Messages::Payload).json_binary().null())
                    .col(ColumnDef::new(Messages::ContentHash).text().not_null())
                    .col(
                        ColumnDef::new(Messages::Processed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Messages::SentAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Messages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // At-most-once storage per tenant
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_tenant_content_hash")
                    .table(Messages::Table)
                    .col(Messages::TenantId)
                    .col(Messages::ContentHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Extraction job scans unprocessed rows oldest-first
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_processed_created_at")
                    .table(Messages::Table)
                    .col(Messages::Processed)
                    .col(Messages::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_messages_tenant_content_hash")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_messages_processed_created_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Messages {
    Table,
    Id,
    TenantId,
    GroupId,
    GroupName,
    Sender,
    Body,
    Payload,
    ContentHash,
    Processed,
    SentAt,
    CreatedAt,
}
