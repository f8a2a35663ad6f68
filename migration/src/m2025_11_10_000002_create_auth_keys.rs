//! Migration to create the auth_keys table.
//!
//! Stores the per-tenant cryptographic key material required by the messaging
//! connector, keyed by (tenant_id, key_type, key_id) and reconciled as a set
//! against the in-memory key cache.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthKeys::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AuthKeys::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(AuthKeys::TenantId).text().not_null())
                    .col(ColumnDef::new(AuthKeys::KeyType).text().not_null())
                    .col(ColumnDef::new(AuthKeys::KeyId).text().not_null())
                    .col(
                        ColumnDef::new(AuthKeys::KeyCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AuthKeys::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Uniqueness on (tenant_id, key_type, key_id) backs the set reconciliation
        manager
            .create_index(
                Index::create()
                    .name("idx_auth_keys_tenant_type_key")
                    .table(AuthKeys::Table)
                    .col(AuthKeys::TenantId)
                    .col(AuthKeys::KeyType)
                    .col(AuthKeys::KeyId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_auth_keys_tenant_id")
                    .table(AuthKeys::Table)
                    .col(AuthKeys::TenantId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_auth_keys_tenant_type_key")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_auth_keys_tenant_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(AuthKeys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuthKeys {
    Table,
    Id,
    TenantId,
    KeyType,
    KeyId,
    KeyCiphertext,
    CreatedAt,
    UpdatedAt,
}
