//! Create listing upsell table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ListingUpsell::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ListingUpsell::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ListingUpsell::ListingId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ListingUpsell::UpsellType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ListingUpsell::PriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ListingUpsell::Currency)
                            .string_len(3)
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(ListingUpsell::DurationDays)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ListingUpsell::StartsAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ListingUpsell::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ListingUpsell::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(ListingUpsell::PaymentStatus)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(ListingUpsell::PaymentReference).string_len(255))
                    .col(
                        ColumnDef::new(ListingUpsell::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ListingUpsell::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listing_upsell_listing")
                            .from(ListingUpsell::Table, ListingUpsell::ListingId)
                            .to(Listing::Table, Listing::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: active upsells per listing (ranking subquery)
        manager
            .create_index(
                Index::create()
                    .name("idx_listing_upsell_listing_id_status")
                    .table(ListingUpsell::Table)
                    .col(ListingUpsell::ListingId)
                    .col(ListingUpsell::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ListingUpsell::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ListingUpsell {
    Table,
    Id,
    ListingId,
    UpsellType,
    PriceCents,
    Currency,
    DurationDays,
    StartsAt,
    ExpiresAt,
    Status,
    PaymentStatus,
    PaymentReference,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Listing {
    Table,
    Id,
}
