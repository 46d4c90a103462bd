use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Cache-aside store for slow-changing product metadata.
        // Rows with pending=true are placeholders written when the
        // per-chunk enrichment budget ran out or a detail fetch failed.
        manager
            .create_table(
                Table::create()
                    .table(ProductCache::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductCache::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProductCache::TenantId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductCache::ProductId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductCache::Name).string_len(255).null())
                    .col(
                        ColumnDef::new(ProductCache::Category)
                            .string_len(128)
                            .null(),
                    )
                    .col(ColumnDef::new(ProductCache::Unit).string_len(16).null())
                    .col(
                        ColumnDef::new(ProductCache::Pending)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ProductCache::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_product_cache_tenant_product")
                    .table(ProductCache::Table)
                    .col(ProductCache::TenantId)
                    .col(ProductCache::ProductId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Maintenance sweeps scan by pending flag and by age
        manager
            .create_index(
                Index::create()
                    .name("idx_product_cache_pending")
                    .table(ProductCache::Table)
                    .col(ProductCache::Pending)
                    .col(ProductCache::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductCache::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ProductCache {
    Table,
    Id,
    TenantId,
    ProductId,
    Name,
    Category,
    Unit,
    Pending,
    UpdatedAt,
}
