use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Durable job record for one resumable sync run
        manager
            .create_table(
                Table::create()
                    .table(SyncRuns::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncRuns::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(SyncRuns::TenantId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncRuns::Status).string_len(16).not_null())
                    .col(ColumnDef::new(SyncRuns::Mode).string_len(16).not_null())
                    .col(ColumnDef::new(SyncRuns::PeriodStart).date().null())
                    .col(ColumnDef::new(SyncRuns::PeriodEnd).date().null())
                    .col(ColumnDef::new(SyncRuns::Modules).json_binary().not_null())
                    .col(
                        ColumnDef::new(SyncRuns::ModuleIndex)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncRuns::Cursor).json_binary().null())
                    .col(ColumnDef::new(SyncRuns::Progress).json_binary().not_null())
                    .col(
                        ColumnDef::new(SyncRuns::IsProcessing)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SyncRuns::ErrorMessage).text().null())
                    .col(ColumnDef::new(SyncRuns::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(SyncRuns::StartedAt).timestamp().null())
                    .col(ColumnDef::new(SyncRuns::FinishedAt).timestamp().null())
                    .col(ColumnDef::new(SyncRuns::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_runs_tenant_id")
                    .table(SyncRuns::Table)
                    .col(SyncRuns::TenantId)
                    .to_owned(),
            )
            .await?;

        // The stale-run sweep scans by status + updated_at
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_runs_status_updated_at")
                    .table(SyncRuns::Table)
                    .col(SyncRuns::Status)
                    .col(SyncRuns::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncRuns::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SyncRuns {
    Table,
    Id,
    TenantId,
    Status,
    Mode,
    PeriodStart,
    PeriodEnd,
    Modules,
    ModuleIndex,
    Cursor,
    Progress,
    IsProcessing,
    ErrorMessage,
    CreatedAt,
    StartedAt,
    FinishedAt,
    UpdatedAt,
}
