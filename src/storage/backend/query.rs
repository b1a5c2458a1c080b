//! Query operations for SeaOrmStorage
//!
//! This module contains all read-only database operations.

use chrono::NaiveDate;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

use super::SeaOrmStorage;
use super::converters::{
    model_to_custom_event, model_to_daily_stat, model_to_event, model_to_pixel_app,
    model_to_session, model_to_settings,
};
use crate::errors::Result;
use crate::storage::models::{
    AnalyticsSession, CustomEventMapping, DailyStat, Event, PixelApp, PixelSettings,
};

use migration::entities::{
    analytics_session, custom_event, daily_stat, event, pixel_app, pixel_settings,
};

impl SeaOrmStorage {
    /// 按数字 ID 或公开 app_key 查找 PixelApp
    pub async fn find_pixel_app(&self, app_ref: &str) -> Result<Option<PixelApp>> {
        let key = app_ref.to_string();
        let numeric_id = app_ref.parse::<i64>().ok();

        let model = self
            .db
            .run("find_pixel_app", |db| {
                let key = key.clone();
                async move {
                    if let Some(id) = numeric_id
                        && let Some(model) = pixel_app::Entity::find_by_id(id).one(&db).await?
                    {
                        return Ok(Some(model));
                    }
                    pixel_app::Entity::find()
                        .filter(pixel_app::Column::AppKey.eq(key))
                        .one(&db)
                        .await
                }
            })
            .await?;

        Ok(model.map(model_to_pixel_app))
    }

    /// 店铺下所有启用的 PixelApp，按 ID 升序
    pub async fn enabled_apps_for_shop(&self, shop: &str) -> Result<Vec<PixelApp>> {
        let shop = shop.to_string();

        let models = self
            .db
            .run("enabled_apps_for_shop", |db| {
                let shop = shop.clone();
                async move {
                    pixel_app::Entity::find()
                        .filter(pixel_app::Column::Shop.eq(shop))
                        .filter(pixel_app::Column::Enabled.eq(true))
                        .order_by_asc(pixel_app::Column::Id)
                        .all(&db)
                        .await
                }
            })
            .await?;

        Ok(models.into_iter().map(model_to_pixel_app).collect())
    }

    pub async fn get_settings(&self, pixel_app_id: i64) -> Result<Option<PixelSettings>> {
        let model = self
            .db
            .run("get_settings", |db| async move {
                pixel_settings::Entity::find()
                    .filter(pixel_settings::Column::PixelAppId.eq(pixel_app_id))
                    .one(&db)
                    .await
            })
            .await?;

        Ok(model.map(model_to_settings))
    }

    pub async fn find_custom_event(
        &self,
        pixel_app_id: i64,
        name: &str,
    ) -> Result<Option<CustomEventMapping>> {
        let name = name.to_string();

        let model = self
            .db
            .run("find_custom_event", |db| {
                let name = name.clone();
                async move {
                    custom_event::Entity::find()
                        .filter(custom_event::Column::PixelAppId.eq(pixel_app_id))
                        .filter(custom_event::Column::Name.eq(name))
                        .one(&db)
                        .await
                }
            })
            .await?;

        Ok(model.map(model_to_custom_event))
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let id = id.to_string();

        let model = self
            .db
            .run("get_event", |db| {
                let id = id.clone();
                async move { event::Entity::find_by_id(id).one(&db).await }
            })
            .await?;

        Ok(model.map(model_to_event))
    }

    pub async fn count_events(&self, pixel_app_id: i64) -> Result<u64> {
        self.db
            .run("count_events", |db| async move {
                event::Entity::find()
                    .filter(event::Column::PixelAppId.eq(pixel_app_id))
                    .count(&db)
                    .await
            })
            .await
    }

    /// `since` 当天及之后的天级统计，按日期升序
    pub async fn daily_stats_since(
        &self,
        pixel_app_id: i64,
        since: NaiveDate,
    ) -> Result<Vec<DailyStat>> {
        let models = self
            .db
            .run("daily_stats_since", |db| async move {
                daily_stat::Entity::find()
                    .filter(daily_stat::Column::PixelAppId.eq(pixel_app_id))
                    .filter(daily_stat::Column::Day.gte(since))
                    .order_by_asc(daily_stat::Column::Day)
                    .all(&db)
                    .await
            })
            .await?;

        Ok(models.into_iter().map(model_to_daily_stat).collect())
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<AnalyticsSession>> {
        let session_id = session_id.to_string();

        let model = self
            .db
            .run("get_session", |db| {
                let session_id = session_id.clone();
                async move {
                    analytics_session::Entity::find()
                        .filter(analytics_session::Column::SessionId.eq(session_id))
                        .one(&db)
                        .await
                }
            })
            .await?;

        Ok(model.map(model_to_session))
    }
}
