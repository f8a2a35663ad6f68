//! Migration to create the extracted_properties table.
//!
//! Structured listing records produced by the extraction job. A message may
//! yield zero, one, or several rows (e.g. a combined sale/rental posting).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExtractedProperties::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExtractedProperties::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::MessageId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::TenantId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::ListingType)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::PropertyType)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(ExtractedProperties::Location).text().null())
                    .col(
                        ColumnDef::new(ExtractedProperties::Price)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::Bedrooms)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::Bathrooms)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::AreaSqft)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::Furnishing)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::Parking)
                            .boolean()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::ParkingCount)
                            .integer()
                            .null(),
                    )
                    .col(ColumnDef::new(ExtractedProperties::Contact).text().null())
                    .col(
                        ColumnDef::new(ExtractedProperties::Confidence)
                            .float()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::RawResponse)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ExtractedProperties::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_extracted_properties_message_id")
                            .from(
                                ExtractedProperties::Table,
                                ExtractedProperties::MessageId,
                            )
                            .to(Messages::Table, Messages::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_extracted_properties_tenant_id")
                    .table(ExtractedProperties::Table)
                    .col(ExtractedProperties::TenantId)
                    .to_owned(),
            )
            .await?;

        // Search endpoint filters on listing type and price range
        manager
            .create_index(
                Index::create()
                    .name("idx_extracted_properties_listing_price")
                    .table(ExtractedProperties::Table)
                    .col(ExtractedProperties::ListingType)
                    .col(ExtractedProperties::Price)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_extracted_properties_tenant_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_extracted_properties_listing_price")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ExtractedProperties::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ExtractedProperties {
    Table,
    Id,
    MessageId,
    TenantId,
    ListingType,
    PropertyType,
    Location,
    Price,
    Bedrooms,
    Bathrooms,
    AreaSqft,
    Furnishing,
    Parking,
    ParkingCount,
    Contact,
    Confidence,
    RawResponse,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Messages {
    Table,
    Id,
}
