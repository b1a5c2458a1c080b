//! Pixel 配置表迁移
//!
//! - pixel_apps: 追踪目标配置（一个外部 pixel 对应一条）
//! - pixel_settings: 与 pixel_apps 一对一，保存外部 token 与能力开关
//! - custom_events: 内部事件名 → 外部标准事件名映射

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. pixel_apps
        manager
            .create_table(
                Table::create()
                    .table(PixelApps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PixelApps::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PixelApps::AppKey)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PixelApps::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(PixelApps::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PixelApps::WebsiteDomain)
                            .string_len(255)
                            .null(),
                    )
                    .col(ColumnDef::new(PixelApps::Shop).string_len(255).not_null())
                    .col(
                        ColumnDef::new(PixelApps::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 按店铺扫描已启用的 app（域名回退查找）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_pixel_apps_shop_enabled")
                    .table(PixelApps::Table)
                    .col(PixelApps::Shop)
                    .col(PixelApps::Enabled)
                    .to_owned(),
            )
            .await?;

        // 2. pixel_settings
        manager
            .create_table(
                Table::create()
                    .table(PixelSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PixelSettings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PixelSettings::PixelAppId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PixelSettings::ExternalPixelId)
                            .string_len(64)
                            .null(),
                    )
                    .col(ColumnDef::new(PixelSettings::AccessToken).text().null())
                    .col(
                        ColumnDef::new(PixelSettings::TokenExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PixelSettings::TestEventCode)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PixelSettings::RecordIp)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PixelSettings::RecordLocation)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PixelSettings::CustomEventsEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PixelSettings::ForwardingEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PixelSettings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 3. custom_events
        manager
            .create_table(
                Table::create()
                    .table(CustomEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CustomEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CustomEvents::PixelAppId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CustomEvents::Name).string_len(128).not_null())
                    .col(
                        ColumnDef::new(CustomEvents::MetaEventName)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CustomEvents::DefaultData).text().null())
                    .col(
                        ColumnDef::new(CustomEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 唯一索引：pixel_app_id + name
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_custom_events_app_name")
                    .table(CustomEvents::Table)
                    .col(CustomEvents::PixelAppId)
                    .col(CustomEvents::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_custom_events_app_name").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CustomEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PixelSettings::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_pixel_apps_shop_enabled").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PixelApps::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PixelApps {
    #[sea_orm(iden = "pixel_apps")]
    Table,
    Id,
    AppKey,
    Name,
    Enabled,
    WebsiteDomain,
    Shop,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PixelSettings {
    #[sea_orm(iden = "pixel_settings")]
    Table,
    Id,
    PixelAppId,
    ExternalPixelId,
    AccessToken,
    TokenExpiresAt,
    TestEventCode,
    RecordIp,
    RecordLocation,
    CustomEventsEnabled,
    ForwardingEnabled,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CustomEvents {
    #[sea_orm(iden = "custom_events")]
    Table,
    Id,
    PixelAppId,
    Name,
    MetaEventName,
    DefaultData,
    CreatedAt,
}
