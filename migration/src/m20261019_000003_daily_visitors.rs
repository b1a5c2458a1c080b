//! 天级访客去重表
//!
//! (pixel_app_id, day, fingerprint) 唯一；插入成功即当天新访客。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DailyVisitors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyVisitors::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DailyVisitors::PixelAppId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DailyVisitors::Day).date().not_null())
                    .col(
                        ColumnDef::new(DailyVisitors::Fingerprint)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DailyVisitors::FirstSeen)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_daily_visitors_app_day_fp")
                    .table(DailyVisitors::Table)
                    .col(DailyVisitors::PixelAppId)
                    .col(DailyVisitors::Day)
                    .col(DailyVisitors::Fingerprint)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_daily_visitors_app_day_fp")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(DailyVisitors::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DailyVisitors {
    #[sea_orm(iden = "daily_visitors")]
    Table,
    Id,
    PixelAppId,
    Day,
    Fingerprint,
    FirstSeen,
}
