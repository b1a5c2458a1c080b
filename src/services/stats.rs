//! Cached read views over aggregates
//!
//! Views are cached under `pixel:{id}:` so that a token refresh (or any
//! other settings change) can drop all of an app's views at once.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use super::token::{TokenState, token_state};
use crate::cache::{ViewCache, stats_key, summary_key};
use crate::errors::{PixelRelayError, Result};
use crate::storage::{DailyStat, PixelApp, PixelSettings, SeaOrmStorage};

pub const DEFAULT_STATS_DAYS: u32 = 7;
pub const MAX_STATS_DAYS: u32 = 90;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatTotals {
    pub pageviews: i64,
    pub unique_users: i64,
    pub sessions: i64,
    pub events: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub pixel_app_id: i64,
    pub days: u32,
    pub since: NaiveDate,
    pub totals: StatTotals,
    pub daily: Vec<DailyStat>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub id: i64,
    pub app_key: String,
    pub name: String,
    pub enabled: bool,
    pub shop: String,
    pub website_domain: Option<String>,
    pub total_events: u64,
    pub forwarding_enabled: bool,
    pub pixel_configured: bool,
    /// missing / valid / expired
    pub token_state: &'static str,
}

/// 补齐没有数据的日期（计数为 0），按日期升序
pub fn fill_days(since: NaiveDate, days: u32, stats: Vec<DailyStat>) -> Vec<DailyStat> {
    let mut by_day = stats.into_iter().peekable();
    let mut filled = Vec::with_capacity(days as usize);

    for day in since.iter_days().take(days as usize) {
        while by_day.peek().is_some_and(|s| s.day < day) {
            by_day.next();
        }
        match by_day.peek() {
            Some(stat) if stat.day == day => filled.extend(by_day.next()),
            _ => filled.push(DailyStat {
                day,
                pageviews: 0,
                unique_users: 0,
                sessions: 0,
                events: 0,
            }),
        }
    }
    filled
}

pub fn clamp_days(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_STATS_DAYS).clamp(1, MAX_STATS_DAYS)
}

pub struct StatsService {
    storage: Arc<SeaOrmStorage>,
    cache: Arc<ViewCache>,
}

impl StatsService {
    pub fn new(storage: Arc<SeaOrmStorage>, cache: Arc<ViewCache>) -> Self {
        Self { storage, cache }
    }

    fn ttl(&self) -> Duration {
        self.cache.default_ttl()
    }

    async fn require_app(&self, app_ref: &str) -> Result<PixelApp> {
        self.storage
            .find_pixel_app(app_ref)
            .await?
            .ok_or_else(|| PixelRelayError::not_found(format!("pixel app '{}' not found", app_ref)))
    }

    async fn compute_stats(&self, app_id: i64, days: u32) -> Result<serde_json::Value> {
        let today = Utc::now().date_naive();
        let since = today - chrono::Duration::days(i64::from(days) - 1);

        let daily = fill_days(
            since,
            days,
            self.storage.daily_stats_since(app_id, since).await?,
        );
        let totals = daily.iter().fold(StatTotals::default(), |acc, d| StatTotals {
            pageviews: acc.pageviews + d.pageviews,
            unique_users: acc.unique_users + d.unique_users,
            sessions: acc.sessions + d.sessions,
            events: acc.events + d.events,
        });

        Ok(serde_json::to_value(StatsView {
            pixel_app_id: app_id,
            days,
            since,
            totals,
            daily,
        })?)
    }

    /// 最近 `days` 天（含今天）的统计
    pub async fn daily_stats(
        &self,
        app_ref: &str,
        days: Option<u32>,
        refresh: bool,
    ) -> Result<serde_json::Value> {
        let app = self.require_app(app_ref).await?;
        let days = clamp_days(days);
        let key = stats_key(app.id, days);
        let producer = self.compute_stats(app.id, days);

        if refresh {
            self.cache.refresh(&key, self.ttl(), producer).await
        } else {
            self.cache.get_or_compute(&key, self.ttl(), producer).await
        }
    }

    async fn compute_summary(&self, app: PixelApp) -> Result<serde_json::Value> {
        let settings = self
            .storage
            .get_settings(app.id)
            .await?
            .unwrap_or_else(|| PixelSettings::defaults_for(app.id));
        let total_events = self.storage.count_events(app.id).await?;

        let token = match token_state(&settings, Utc::now()) {
            TokenState::Missing => "missing",
            TokenState::Valid(_) => "valid",
            TokenState::Expired(_) => "expired",
        };

        Ok(serde_json::to_value(SummaryView {
            id: app.id,
            app_key: app.app_key,
            name: app.name,
            enabled: app.enabled,
            shop: app.shop,
            website_domain: app.website_domain,
            total_events,
            forwarding_enabled: settings.forwarding_enabled,
            pixel_configured: settings
                .external_pixel_id
                .as_deref()
                .is_some_and(|p| !p.is_empty()),
            token_state: token,
        })?)
    }

    pub async fn summary(&self, app_ref: &str) -> Result<serde_json::Value> {
        let app = self.require_app(app_ref).await?;
        let key = summary_key(app.id);
        self.cache
            .get_or_compute(&key, self.ttl(), self.compute_summary(app))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(day: NaiveDate, pageviews: i64) -> DailyStat {
        DailyStat {
            day,
            pageviews,
            unique_users: 0,
            sessions: 0,
            events: pageviews,
        }
    }

    #[test]
    fn test_clamp_days() {
        assert_eq!(clamp_days(None), 7);
        assert_eq!(clamp_days(Some(0)), 1);
        assert_eq!(clamp_days(Some(30)), 30);
        assert_eq!(clamp_days(Some(365)), 90);
    }

    #[test]
    fn test_fill_days_inserts_zero_rows() {
        let since = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let filled = fill_days(
            since,
            3,
            vec![stat(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(), 4)],
        );

        assert_eq!(filled.len(), 3);
        assert_eq!(filled[0].day, since);
        assert_eq!(filled[0].pageviews, 0);
        assert_eq!(filled[1].pageviews, 4);
        assert_eq!(filled[2].day, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }
}
