use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Leads::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Leads::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Leads::Name).string().not_null())
                    .col(ColumnDef::new(Leads::Role).string().not_null().default(""))
                    .col(ColumnDef::new(Leads::Company).string().not_null().default(""))
                    .col(ColumnDef::new(Leads::Snippet).text().not_null().default(""))
                    .col(ColumnDef::new(Leads::Tags).json().not_null())
                    .col(ColumnDef::new(Leads::ProfileUrl).string().not_null())
                    .col(ColumnDef::new(Leads::SourceDomain).string().not_null())
                    .col(ColumnDef::new(Leads::RawData).json().not_null())
                    .col(
                        ColumnDef::new(Leads::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Leads::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key, the upsert path relies on it
        manager
            .create_index(
                Index::create()
                    .name("ux_leads_profile_source")
                    .table(Leads::Table)
                    .col(Leads::ProfileUrl)
                    .col(Leads::SourceDomain)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_leads_source_domain")
                    .table(Leads::Table)
                    .col(Leads::SourceDomain)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Leads::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Leads {
    Table,
    Id,
    Name,
    Role,
    Company,
    Snippet,
    Tags,
    ProfileUrl,
    SourceDomain,
    RawData,
    CreatedAt,
    UpdatedAt,
}
