use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SiteConfigs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SiteConfigs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SiteConfigs::Name).string().not_null())
                    .col(ColumnDef::new(SiteConfigs::Domain).string().not_null())
                    .col(ColumnDef::new(SiteConfigs::SourceType).string().not_null())
                    .col(ColumnDef::new(SiteConfigs::Filters).json().not_null())
                    .col(ColumnDef::new(SiteConfigs::StartUrls).json().not_null())
                    .col(
                        ColumnDef::new(SiteConfigs::RequestsPerMinute)
                            .integer()
                            .not_null()
                            .default(30),
                    )
                    .col(
                        ColumnDef::new(SiteConfigs::MaxPages)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(
                        ColumnDef::new(SiteConfigs::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SiteConfigs::CrawlIntervalHours)
                            .integer()
                            .not_null()
                            .default(24),
                    )
                    .col(ColumnDef::new(SiteConfigs::LastCrawlAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(SiteConfigs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SiteConfigs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_site_configs_enabled")
                    .table(SiteConfigs::Table)
                    .col(SiteConfigs::Enabled)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SiteConfigs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum SiteConfigs {
    Table,
    Id,
    Name,
    Domain,
    SourceType,
    Filters,
    StartUrls,
    RequestsPerMinute,
    MaxPages,
    Enabled,
    CrawlIntervalHours,
    LastCrawlAt,
    CreatedAt,
    UpdatedAt,
}
