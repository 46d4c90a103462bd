use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Per-run log trail surfaced by the run status endpoint
        manager
            .create_table(
                Table::create()
                    .table(SyncRunLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncRunLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncRunLogs::RunId).uuid().not_null())
                    .col(
                        ColumnDef::new(SyncRunLogs::LoggedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncRunLogs::Level).string_len(8).not_null())
                    .col(ColumnDef::new(SyncRunLogs::Module).string_len(32).null())
                    .col(ColumnDef::new(SyncRunLogs::Message).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_run_logs_run_id_logged_at")
                    .table(SyncRunLogs::Table)
                    .col(SyncRunLogs::RunId)
                    .col(SyncRunLogs::LoggedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncRunLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SyncRunLogs {
    Table,
    Id,
    RunId,
    LoggedAt,
    Level,
    Module,
    Message,
}
