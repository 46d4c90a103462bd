use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Receivables::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Receivables::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Receivables::TenantId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Receivables::RemoteId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Receivables::DueDate).date().null())
                    .col(
                        ColumnDef::new(Receivables::Amount)
                            .decimal_len(18, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Receivables::Status).string_len(32).null())
                    .col(
                        ColumnDef::new(Receivables::CustomerName)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Receivables::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_receivables_tenant_remote")
                    .table(Receivables::Table)
                    .col(Receivables::TenantId)
                    .col(Receivables::RemoteId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_receivables_due_date")
                    .table(Receivables::Table)
                    .col(Receivables::DueDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Receivables::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Receivables {
    Table,
    Id,
    TenantId,
    RemoteId,
    DueDate,
    Amount,
    Status,
    CustomerName,
    UpdatedAt,
}
