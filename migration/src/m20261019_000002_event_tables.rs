//! 事件与汇总表迁移
//!
//! - events: 不可变事件记录
//! - analytics_sessions: 按 session_id 滚动更新的会话
//! - daily_stats: (pixel_app_id, day) 唯一的天级汇总

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. events
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Events::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Events::PixelAppId).big_integer().not_null())
                    .col(ColumnDef::new(Events::EventName).string_len(128).not_null())
                    .col(ColumnDef::new(Events::Url).text().null())
                    .col(ColumnDef::new(Events::Referrer).text().null())
                    .col(ColumnDef::new(Events::SessionId).string_len(128).null())
                    .col(ColumnDef::new(Events::Fingerprint).string_len(128).null())
                    .col(ColumnDef::new(Events::IpAddress).string_len(45).null())
                    .col(ColumnDef::new(Events::Country).string_len(2).null())
                    .col(ColumnDef::new(Events::City).string_len(100).null())
                    .col(ColumnDef::new(Events::UserAgentHash).string_len(16).null())
                    .col(ColumnDef::new(Events::Browser).string_len(64).null())
                    .col(ColumnDef::new(Events::Os).string_len(64).null())
                    .col(ColumnDef::new(Events::DeviceType).string_len(32).null())
                    .col(ColumnDef::new(Events::ScreenWidth).integer().null())
                    .col(ColumnDef::new(Events::ScreenHeight).integer().null())
                    .col(ColumnDef::new(Events::UtmSource).string_len(255).null())
                    .col(ColumnDef::new(Events::UtmMedium).string_len(255).null())
                    .col(ColumnDef::new(Events::UtmCampaign).string_len(255).null())
                    .col(ColumnDef::new(Events::CustomData).text().null())
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 复合索引：pixel_app_id + created_at（时间范围查询）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_app_time")
                    .table(Events::Table)
                    .col(Events::PixelAppId)
                    .col(Events::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // 索引：pixel_app_id + fingerprint（当日独立用户判定）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_app_fingerprint")
                    .table(Events::Table)
                    .col(Events::PixelAppId)
                    .col(Events::Fingerprint)
                    .to_owned(),
            )
            .await?;

        // 2. analytics_sessions
        manager
            .create_table(
                Table::create()
                    .table(AnalyticsSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalyticsSessions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsSessions::SessionId)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsSessions::PixelAppId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsSessions::Pageviews)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AnalyticsSessions::FirstSeen)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsSessions::LastSeen)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 3. daily_stats
        manager
            .create_table(
                Table::create()
                    .table(DailyStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyStats::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DailyStats::PixelAppId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DailyStats::Day).date().not_null())
                    .col(
                        ColumnDef::new(DailyStats::Pageviews)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyStats::UniqueUsers)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyStats::Sessions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyStats::Events)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyStats::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 唯一索引：pixel_app_id + day（upsert 冲突目标）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_daily_stats_app_day")
                    .table(DailyStats::Table)
                    .col(DailyStats::PixelAppId)
                    .col(DailyStats::Day)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_daily_stats_app_day").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DailyStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AnalyticsSessions::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_events_app_fingerprint").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_events_app_time").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Events {
    #[sea_orm(iden = "events")]
    Table,
    Id,
    PixelAppId,
    EventName,
    Url,
    Referrer,
    SessionId,
    Fingerprint,
    IpAddress,
    Country,
    City,
    UserAgentHash,
    Browser,
    Os,
    DeviceType,
    ScreenWidth,
    ScreenHeight,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    CustomData,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AnalyticsSessions {
    #[sea_orm(iden = "analytics_sessions")]
    Table,
    Id,
    SessionId,
    PixelAppId,
    Pageviews,
    FirstSeen,
    LastSeen,
}

#[derive(DeriveIden)]
enum DailyStats {
    #[sea_orm(iden = "daily_stats")]
    Table,
    Id,
    PixelAppId,
    Day,
    Pageviews,
    UniqueUsers,
    Sessions,
    Events,
    UpdatedAt,
}
