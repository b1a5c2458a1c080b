//! Event ingestion
//!
//! Resolves the target PixelApp, authorizes the page domain, enriches and
//! stores one immutable event, then updates aggregates and hands the event
//! to the forwarding pipeline.
//!
//! The authorized host is the `url` host when the payload carries one,
//! otherwise the browser-reported origin (`Origin`, then `Referer`). Every
//! event passes the domain guard; there is no unchecked path.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::aggregates::AggregateUpdater;
use super::domain_guard::{check_domain, host_of, normalize_domain};
use super::forwarding::{ClientHints, ForwardJob, ForwardOutcome, ForwardingPipeline};
use super::geoip::GeoIpProvider;
use super::user_agent::parse_user_agent;
use crate::errors::{DenyReason, PixelRelayError, Result};
use crate::storage::{CustomData, Event, PixelApp, PixelSettings, SeaOrmStorage};
use crate::utils::ip::is_public;

pub const MAX_EVENT_NAME_LEN: usize = 128;
/// sessionId / fingerprint 的长度上限（与列宽一致）
pub const MAX_IDENTIFIER_LEN: usize = 128;
/// utm_* 列宽
pub const MAX_UTM_LEN: usize = 255;

// 派生字段的列宽，超出部分截断
const CITY_COLUMN_LEN: usize = 100;
const BROWSER_COLUMN_LEN: usize = 64;
const OS_COLUMN_LEN: usize = 64;
const DEVICE_COLUMN_LEN: usize = 32;

/// appId 可以是数字主键或字符串 app_key
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AppRef {
    Id(i64),
    Key(String),
}

impl AppRef {
    pub fn lookup_key(&self) -> String {
        match self {
            AppRef::Id(id) => id.to_string(),
            AppRef::Key(key) => key.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    #[serde(default)]
    pub app_id: Option<AppRef>,
    pub event_name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub custom_data: Option<serde_json::Value>,
    #[serde(default)]
    pub screen_width: Option<i32>,
    #[serde(default)]
    pub screen_height: Option<i32>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
}

/// 请求来源信息
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    /// 浏览器上报的来源（`Origin`，缺失时取 `Referer`）
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackResponse {
    pub success: bool,
    pub event_id: String,
    pub pixel_name: String,
    pub website_domain: Option<String>,
}

pub struct TrackOutcome {
    pub response: TrackResponse,
    /// 后台转发任务；调用方无需等待
    pub forward_task: Option<JoinHandle<ForwardOutcome>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 按字符数截断到列宽
fn fit(value: Option<String>, max_chars: usize) -> Option<String> {
    value.map(|v| match v.char_indices().nth(max_chars) {
        Some((cut, _)) => v[..cut].to_string(),
        None => v,
    })
}

/// 校验事件名与 customData，返回规范化后的事件名和负载
pub fn validate(request: &TrackRequest) -> Result<(String, CustomData)> {
    let name = request.event_name.trim();
    if name.is_empty() {
        return Err(PixelRelayError::validation("eventName is required"));
    }
    if name.chars().count() > MAX_EVENT_NAME_LEN {
        return Err(PixelRelayError::validation(format!(
            "eventName exceeds {} characters",
            MAX_EVENT_NAME_LEN
        )));
    }

    for (field, value, max) in [
        ("sessionId", &request.session_id, MAX_IDENTIFIER_LEN),
        ("fingerprint", &request.fingerprint, MAX_IDENTIFIER_LEN),
        ("utmSource", &request.utm_source, MAX_UTM_LEN),
        ("utmMedium", &request.utm_medium, MAX_UTM_LEN),
        ("utmCampaign", &request.utm_campaign, MAX_UTM_LEN),
    ] {
        if value
            .as_deref()
            .is_some_and(|v| v.trim().chars().count() > max)
        {
            return Err(PixelRelayError::validation(format!(
                "{} exceeds {} characters",
                field, max
            )));
        }
    }

    let custom_data = match &request.custom_data {
        None | Some(serde_json::Value::Null) => CustomData::new(),
        Some(value) => CustomData::from_value(value.clone())
            .ok_or_else(|| PixelRelayError::validation("customData must be a JSON object"))?,
    };

    Ok((name.to_string(), custom_data))
}

pub struct TrackingService {
    storage: Arc<SeaOrmStorage>,
    aggregates: AggregateUpdater,
    geoip: GeoIpProvider,
    forwarding: Arc<ForwardingPipeline>,
}

impl TrackingService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        geoip: GeoIpProvider,
        forwarding: Arc<ForwardingPipeline>,
    ) -> Self {
        Self {
            aggregates: AggregateUpdater::new(storage.clone()),
            storage,
            geoip,
            forwarding,
        }
    }

    /// 先按显式 ID 查找，找不到再在店铺的启用 app 中按域名匹配
    async fn resolve_app(
        &self,
        app_ref: Option<&AppRef>,
        shop: Option<&str>,
        request_host: Option<&str>,
    ) -> Result<Option<PixelApp>> {
        if let Some(app_ref) = app_ref {
            let key = app_ref.lookup_key();
            if !key.is_empty()
                && let Some(app) = self.storage.find_pixel_app(&key).await?
            {
                return Ok(Some(app));
            }
        }

        let (Some(shop), Some(host)) = (shop.filter(|s| !s.trim().is_empty()), request_host) else {
            return Ok(None);
        };

        let apps = self.storage.enabled_apps_for_shop(shop.trim()).await?;
        Ok(apps.into_iter().find(|app| {
            app.website_domain
                .as_deref()
                .is_some_and(|d| normalize_domain(d) == host)
        }))
    }

    pub async fn track(
        &self,
        shop: Option<&str>,
        request: TrackRequest,
        client: ClientContext,
    ) -> Result<TrackOutcome> {
        let (event_name, custom_data) = validate(&request)?;

        let url = non_empty(request.url);
        let origin = non_empty(client.origin);
        // 有 url 时只认 url 的 host，不回退到 Origin
        let request_host = match &url {
            Some(u) => host_of(u),
            None => origin.as_deref().and_then(host_of),
        };

        let app = self
            .resolve_app(request.app_id.as_ref(), shop, request_host.as_deref())
            .await?
            .ok_or_else(|| PixelRelayError::not_found("pixel app not found"))?;

        if !app.enabled {
            return Err(PixelRelayError::tracking_disabled(
                DenyReason::AppDisabled,
                format!("pixel app {} is disabled", app.id),
            ));
        }

        let host = request_host.as_deref().unwrap_or_default();
        if let Err(rejection) = check_domain(host, app.website_domain.as_deref()) {
            info!(
                "Tracking rejected for pixel app {}: {} ({})",
                app.id,
                rejection,
                rejection.reason()
            );
            return Err(PixelRelayError::tracking_disabled(
                rejection.reason(),
                rejection.to_string(),
            ));
        }

        let settings = self
            .storage
            .get_settings(app.id)
            .await?
            .unwrap_or_else(|| PixelSettings::defaults_for(app.id));

        let user_agent = non_empty(client.user_agent);
        let device = parse_user_agent(user_agent.as_deref().unwrap_or_default());

        let geo = match client.ip {
            Some(ip) if settings.record_location && is_public(&ip) => self.geoip.lookup(ip).await,
            _ => None,
        };
        let stored_ip = client
            .ip
            .filter(|_| settings.record_ip)
            .map(|ip| ip.to_string());

        let event = Event {
            id: Uuid::new_v4().to_string(),
            pixel_app_id: app.id,
            event_name,
            url,
            referrer: non_empty(request.referrer),
            session_id: non_empty(request.session_id),
            fingerprint: non_empty(request.fingerprint),
            ip_address: stored_ip.clone(),
            country: geo
                .as_ref()
                .and_then(|g| g.country.clone())
                .filter(|c| c.len() == 2),
            city: fit(geo.and_then(|g| g.city), CITY_COLUMN_LEN),
            user_agent_hash: device.ua_hash,
            browser: fit(device.browser, BROWSER_COLUMN_LEN),
            os: fit(device.os, OS_COLUMN_LEN),
            device_type: fit(device.device_type, DEVICE_COLUMN_LEN),
            screen_width: request.screen_width,
            screen_height: request.screen_height,
            utm_source: non_empty(request.utm_source),
            utm_medium: non_empty(request.utm_medium),
            utm_campaign: non_empty(request.utm_campaign),
            custom_data,
            created_at: Utc::now(),
        };

        self.storage.insert_event(&event).await?;
        debug!("Event {} stored for pixel app {}", event.id, app.id);

        self.aggregates.record(&event).await;

        let forward_task = if ForwardJob::is_eligible(&settings) {
            let mapping = if settings.custom_events_enabled {
                self.storage
                    .find_custom_event(app.id, &event.event_name)
                    .await
                    .unwrap_or_else(|e| {
                        warn!("Custom event lookup for app {} failed: {}", app.id, e);
                        None
                    })
            } else {
                None
            };

            Some(self.forwarding.spawn(ForwardJob {
                event: event.clone(),
                settings,
                mapping,
                client: ClientHints {
                    ip_address: stored_ip,
                    user_agent,
                },
            }))
        } else {
            None
        };

        Ok(TrackOutcome {
            response: TrackResponse {
                success: true,
                event_id: event.id,
                pixel_name: app.name,
                website_domain: app.website_domain,
            },
            forward_task,
        })
    }
}
