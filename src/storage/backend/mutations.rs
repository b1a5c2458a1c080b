//! Mutation operations for SeaOrmStorage
//!
//! This module contains all write database operations. Events are
//! insert-only: there is no update or delete path for them.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DbErr, EntityTrait, QueryFilter,
    sea_query::{Expr, OnConflict},
};
use tracing::{debug, info};

use super::SeaOrmStorage;
use super::converters::{event_to_active_model, model_to_pixel_app, settings_to_active_model};
use crate::errors::Result;
use crate::services::domain_guard::normalize_domain;
use crate::storage::models::{CustomData, Event, NewPixelApp, PixelApp, PixelSettings};

use migration::entities::{custom_event, event, pixel_app, pixel_settings};

impl SeaOrmStorage {
    /// 新建 PixelApp，绑定域名在写入前规范化
    pub async fn create_pixel_app(&self, new_app: NewPixelApp) -> Result<PixelApp> {
        let active = pixel_app::ActiveModel {
            app_key: Set(new_app.app_key.clone()),
            name: Set(new_app.name.clone()),
            enabled: Set(new_app.enabled),
            website_domain: Set(new_app
                .website_domain
                .as_deref()
                .map(normalize_domain)
                .filter(|d| !d.is_empty())),
            shop: Set(new_app.shop.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let model = self
            .db
            .run("create_pixel_app", |db| {
                let active = active.clone();
                async move { active.insert(&db).await }
            })
            .await?;

        info!("Pixel app created: {} (shop {})", model.app_key, model.shop);
        Ok(model_to_pixel_app(model))
    }

    /// 按 pixel_app_id 插入或覆盖设置
    pub async fn upsert_settings(&self, settings: &PixelSettings) -> Result<()> {
        let active = settings_to_active_model(settings, Utc::now());

        self.db
            .run("upsert_settings", |db| {
                let active = active.clone();
                async move {
                    pixel_settings::Entity::insert(active)
                        .on_conflict(
                            OnConflict::column(pixel_settings::Column::PixelAppId)
                                .update_columns([
                                    pixel_settings::Column::ExternalPixelId,
                                    pixel_settings::Column::AccessToken,
                                    pixel_settings::Column::TokenExpiresAt,
                                    pixel_settings::Column::TestEventCode,
                                    pixel_settings::Column::RecordIp,
                                    pixel_settings::Column::RecordLocation,
                                    pixel_settings::Column::CustomEventsEnabled,
                                    pixel_settings::Column::ForwardingEnabled,
                                    pixel_settings::Column::UpdatedAt,
                                ])
                                .to_owned(),
                        )
                        .exec_without_returning(&db)
                        .await
                }
            })
            .await?;

        Ok(())
    }

    /// 持久化刷新后的访问令牌
    pub async fn save_refreshed_token(
        &self,
        pixel_app_id: i64,
        access_token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let token = access_token.to_string();

        self.db
            .run("save_refreshed_token", |db| {
                let token = token.clone();
                async move {
                    pixel_settings::Entity::update_many()
                        .col_expr(pixel_settings::Column::AccessToken, Expr::value(token))
                        .col_expr(pixel_settings::Column::TokenExpiresAt, Expr::value(expires_at))
                        .col_expr(pixel_settings::Column::UpdatedAt, Expr::value(Utc::now()))
                        .filter(pixel_settings::Column::PixelAppId.eq(pixel_app_id))
                        .exec(&db)
                        .await
                }
            })
            .await?;

        debug!("Access token persisted for pixel app {}", pixel_app_id);
        Ok(())
    }

    /// 插入或更新自定义事件映射，(pixel_app_id, name) 唯一
    pub async fn upsert_custom_event(
        &self,
        pixel_app_id: i64,
        name: &str,
        meta_event_name: &str,
        default_data: &CustomData,
    ) -> Result<()> {
        let active = custom_event::ActiveModel {
            pixel_app_id: Set(pixel_app_id),
            name: Set(name.to_string()),
            meta_event_name: Set(meta_event_name.to_string()),
            default_data: Set(default_data.to_json_text()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        self.db
            .run("upsert_custom_event", |db| {
                let active = active.clone();
                async move {
                    custom_event::Entity::insert(active)
                        .on_conflict(
                            OnConflict::columns([
                                custom_event::Column::PixelAppId,
                                custom_event::Column::Name,
                            ])
                            .update_columns([
                                custom_event::Column::MetaEventName,
                                custom_event::Column::DefaultData,
                            ])
                            .to_owned(),
                        )
                        .exec_without_returning(&db)
                        .await
                }
            })
            .await?;

        Ok(())
    }

    /// 插入事件；同 ID 已存在时不做任何事，返回 false
    ///
    /// 重试可能在一次已提交的写入之后发生，按 ID 去重保证只落一行。
    pub async fn insert_event(&self, ev: &Event) -> Result<bool> {
        let active = event_to_active_model(ev);

        let rows = self
            .db
            .run("insert_event", |db| {
                let active = active.clone();
                async move {
                    let res = event::Entity::insert(active)
                        .on_conflict(OnConflict::column(event::Column::Id).do_nothing().to_owned())
                        .exec_without_returning(&db)
                        .await;
                    match res {
                        Err(DbErr::RecordNotInserted) => Ok(0),
                        other => other,
                    }
                }
            })
            .await?;

        Ok(rows > 0)
    }
}
