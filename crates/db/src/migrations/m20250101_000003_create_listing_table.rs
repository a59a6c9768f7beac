//! Create listing table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(Listing::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Listing::Id)
                    .string_len(32)
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Listing::CustomerId).string_len(32).not_null())
            .col(ColumnDef::new(Listing::CategoryId).string_len(32).not_null())
            .col(ColumnDef::new(Listing::Title).string_len(255).not_null())
            .col(
                ColumnDef::new(Listing::Slug)
                    .string_len(320)
                    .not_null()
                    .unique_key(),
            )
            .col(ColumnDef::new(Listing::Description).text().not_null())
            .col(ColumnDef::new(Listing::Location).string_len(255))
            .col(
                ColumnDef::new(Listing::Currency)
                    .string_len(3)
                    .not_null()
                    .default("USD"),
            )
            .col(ColumnDef::new(Listing::PriceCents).big_integer())
            .col(
                ColumnDef::new(Listing::Status)
                    .string_len(16)
                    .not_null()
                    .default("active"),
            )
            .col(
                ColumnDef::new(Listing::ApprovalStatus)
                    .string_len(16)
                    .not_null()
                    .default("pending"),
            )
            .col(
                ColumnDef::new(Listing::IsHarmful)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(Listing::ModerationNotes).text())
            .col(ColumnDef::new(Listing::ApprovedBy).string_len(32))
            .col(ColumnDef::new(Listing::ApprovedAt).timestamp_with_time_zone())
            .col(ColumnDef::new(Listing::RejectionReason).text())
            .col(
                ColumnDef::new(Listing::PostType)
                    .string_len(16)
                    .not_null()
                    .default("regular"),
            )
            .col(
                ColumnDef::new(Listing::IsAdminPost)
                    .boolean()
                    .not_null()
                    .default(false),
            );

        // Legacy promotion pairs
        for (flag, expires_at) in [
            (Listing::IsFeatured, Listing::FeaturedExpiresAt),
            (Listing::IsSuggested, Listing::SuggestedExpiresAt),
            (Listing::IsPaid, Listing::PaidExpiresAt),
            (Listing::IsPromoted, Listing::PromotedExpiresAt),
            (Listing::IsSponsored, Listing::SponsoredExpiresAt),
            (Listing::IsBusiness, Listing::BusinessExpiresAt),
            (Listing::IsStore, Listing::StoreExpiresAt),
        ] {
            table
                .col(ColumnDef::new(flag).boolean().not_null().default(false))
                .col(ColumnDef::new(expires_at).timestamp_with_time_zone());
        }

        table
            .col(ColumnDef::new(Listing::LastRepostedAt).timestamp_with_time_zone())
            .col(
                ColumnDef::new(Listing::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(ColumnDef::new(Listing::UpdatedAt).timestamp_with_time_zone())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_listing_customer")
                    .from(Listing::Table, Listing::CustomerId)
                    .to(User::Table, User::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_listing_category")
                    .from(Listing::Table, Listing::CategoryId)
                    .to(Category::Table, Category::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );

        manager.create_table(table.to_owned()).await?;

        // Index: moderation queue (pending, oldest first)
        manager
            .create_index(
                Index::create()
                    .name("idx_listing_approval_status_created_at")
                    .table(Listing::Table)
                    .col(Listing::ApprovalStatus)
                    .col(Listing::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: category listings
        manager
            .create_index(
                Index::create()
                    .name("idx_listing_category_id")
                    .table(Listing::Table)
                    .col(Listing::CategoryId)
                    .to_owned(),
            )
            .await?;

        // Index: customer listings
        manager
            .create_index(
                Index::create()
                    .name("idx_listing_customer_id")
                    .table(Listing::Table)
                    .col(Listing::CustomerId)
                    .to_owned(),
            )
            .await?;

        // Index: recency tie-break
        manager
            .create_index(
                Index::create()
                    .name("idx_listing_created_at")
                    .table(Listing::Table)
                    .col(Listing::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Listing::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Listing {
    Table,
    Id,
    CustomerId,
    CategoryId,
    Title,
    Slug,
    Description,
    Location,
    Currency,
    PriceCents,
    Status,
    ApprovalStatus,
    IsHarmful,
    ModerationNotes,
    ApprovedBy,
    ApprovedAt,
    RejectionReason,
    PostType,
    IsAdminPost,
    IsFeatured,
    FeaturedExpiresAt,
    IsSuggested,
    SuggestedExpiresAt,
    IsPaid,
    PaidExpiresAt,
    IsPromoted,
    PromotedExpiresAt,
    IsSponsored,
    SponsoredExpiresAt,
    IsBusiness,
    BusinessExpiresAt,
    IsStore,
    StoreExpiresAt,
    LastRepostedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Category {
    Table,
    Id,
}
