use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Invoices::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Invoices::TenantId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invoices::RemoteId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Invoices::Number).string_len(64).null())
                    .col(ColumnDef::new(Invoices::IssueDate).date().null())
                    .col(
                        ColumnDef::new(Invoices::TotalAmount)
                            .decimal_len(18, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Invoices::Status).string_len(32).null())
                    .col(
                        ColumnDef::new(Invoices::CustomerName)
                            .string_len(255)
                            .null(),
                    )
                    .col(ColumnDef::new(Invoices::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Upserts key on (tenant_id, remote_id)
        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_tenant_remote")
                    .table(Invoices::Table)
                    .col(Invoices::TenantId)
                    .col(Invoices::RemoteId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_issue_date")
                    .table(Invoices::Table)
                    .col(Invoices::IssueDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Invoices {
    Table,
    Id,
    TenantId,
    RemoteId,
    Number,
    IssueDate,
    TotalAmount,
    Status,
    CustomerName,
    UpdatedAt,
}
