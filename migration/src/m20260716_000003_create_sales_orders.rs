use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Line items are embedded as a jsonb array; the pre-enrichment
        // heuristic reads distinct product ids out of it with raw SQL.
        manager
            .create_table(
                Table::create()
                    .table(SalesOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesOrders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::TenantId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::RemoteId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesOrders::OrderDate).date().null())
                    .col(ColumnDef::new(SalesOrders::Status).string_len(32).null())
                    .col(
                        ColumnDef::new(SalesOrders::CustomerName)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::TotalAmount)
                            .decimal_len(18, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::Items)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_orders_tenant_remote")
                    .table(SalesOrders::Table)
                    .col(SalesOrders::TenantId)
                    .col(SalesOrders::RemoteId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_orders_order_date")
                    .table(SalesOrders::Table)
                    .col(SalesOrders::OrderDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SalesOrders::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SalesOrders {
    Table,
    Id,
    TenantId,
    RemoteId,
    OrderDate,
    Status,
    CustomerName,
    TotalAmount,
    Items,
    UpdatedAt,
}
