use sea_orm_migration::prelude::*;

use super::m20250301_000001_create_site_configs::SiteConfigs;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create crawl_jobs table
        manager
            .create_table(
                Table::create()
                    .table(CrawlJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CrawlJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CrawlJobs::SiteConfigId).uuid().not_null())
                    .col(ColumnDef::new(CrawlJobs::Status).string().not_null())
                    .col(ColumnDef::new(CrawlJobs::TriggeredBy).string().not_null())
                    .col(ColumnDef::new(CrawlJobs::PagesFetched).integer().not_null().default(0))
                    .col(ColumnDef::new(CrawlJobs::LeadsFound).integer().not_null().default(0))
                    .col(ColumnDef::new(CrawlJobs::LeadsUpdated).integer().not_null().default(0))
                    .col(ColumnDef::new(CrawlJobs::ErrorCount).integer().not_null().default(0))
                    .col(ColumnDef::new(CrawlJobs::ErrorMessage).text())
                    .col(ColumnDef::new(CrawlJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(CrawlJobs::FinishedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(CrawlJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_crawl_jobs_site_config")
                            .from(CrawlJobs::Table, CrawlJobs::SiteConfigId)
                            .to(SiteConfigs::Table, SiteConfigs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_crawl_jobs_config_status")
                    .table(CrawlJobs::Table)
                    .col(CrawlJobs::SiteConfigId)
                    .col(CrawlJobs::Status)
                    .to_owned(),
            )
            .await?;

        // Create crawl_logs table
        manager
            .create_table(
                Table::create()
                    .table(CrawlLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CrawlLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CrawlLogs::JobId).uuid().not_null())
                    .col(ColumnDef::new(CrawlLogs::Sequence).integer().not_null())
                    .col(ColumnDef::new(CrawlLogs::Url).text().not_null())
                    .col(ColumnDef::new(CrawlLogs::Outcome).string().not_null())
                    .col(ColumnDef::new(CrawlLogs::HttpStatus).integer())
                    .col(ColumnDef::new(CrawlLogs::ErrorKind).string())
                    .col(ColumnDef::new(CrawlLogs::Error).text())
                    .col(ColumnDef::new(CrawlLogs::ContentType).string())
                    .col(ColumnDef::new(CrawlLogs::Retries).integer().not_null().default(0))
                    .col(ColumnDef::new(CrawlLogs::ElapsedMs).big_integer().not_null().default(0))
                    .col(ColumnDef::new(CrawlLogs::LeadsFound).integer().not_null().default(0))
                    .col(ColumnDef::new(CrawlLogs::LeadsUpdated).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(CrawlLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_crawl_logs_job")
                            .from(CrawlLogs::Table, CrawlLogs::JobId)
                            .to(CrawlJobs::Table, CrawlJobs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_crawl_logs_job_sequence")
                    .table(CrawlLogs::Table)
                    .col(CrawlLogs::JobId)
                    .col(CrawlLogs::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_crawl_logs_created_at")
                    .table(CrawlLogs::Table)
                    .col(CrawlLogs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CrawlLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CrawlJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CrawlJobs {
    Table,
    Id,
    SiteConfigId,
    Status,
    TriggeredBy,
    PagesFetched,
    LeadsFound,
    LeadsUpdated,
    ErrorCount,
    ErrorMessage,
    StartedAt,
    FinishedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CrawlLogs {
    Table,
    Id,
    JobId,
    Sequence,
    Url,
    Outcome,
    HttpStatus,
    ErrorKind,
    Error,
    ContentType,
    Retries,
    ElapsedMs,
    LeadsFound,
    LeadsUpdated,
    CreatedAt,
}
