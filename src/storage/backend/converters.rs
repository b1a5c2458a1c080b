use chrono::{DateTime, Utc};

use crate::storage::models::{
    AnalyticsSession, CustomData, CustomEventMapping, DailyStat, Event, PixelApp, PixelSettings,
};
use migration::entities::{
    analytics_session, custom_event, daily_stat, event, pixel_app, pixel_settings,
};

/// 将 Sea-ORM Model 转换为 PixelApp
pub fn model_to_pixel_app(model: pixel_app::Model) -> PixelApp {
    PixelApp {
        id: model.id,
        app_key: model.app_key,
        name: model.name,
        enabled: model.enabled,
        website_domain: model.website_domain,
        shop: model.shop,
        created_at: model.created_at,
    }
}

pub fn model_to_settings(model: pixel_settings::Model) -> PixelSettings {
    PixelSettings {
        pixel_app_id: model.pixel_app_id,
        external_pixel_id: model.external_pixel_id,
        access_token: model.access_token,
        token_expires_at: model.token_expires_at,
        test_event_code: model.test_event_code,
        record_ip: model.record_ip,
        record_location: model.record_location,
        custom_events_enabled: model.custom_events_enabled,
        forwarding_enabled: model.forwarding_enabled,
    }
}

/// 将 PixelSettings 转换为 ActiveModel（用于 upsert）
pub fn settings_to_active_model(
    settings: &PixelSettings,
    now: DateTime<Utc>,
) -> pixel_settings::ActiveModel {
    use sea_orm::ActiveValue::*;

    pixel_settings::ActiveModel {
        id: NotSet,
        pixel_app_id: Set(settings.pixel_app_id),
        external_pixel_id: Set(settings.external_pixel_id.clone()),
        access_token: Set(settings.access_token.clone()),
        token_expires_at: Set(settings.token_expires_at),
        test_event_code: Set(settings.test_event_code.clone()),
        record_ip: Set(settings.record_ip),
        record_location: Set(settings.record_location),
        custom_events_enabled: Set(settings.custom_events_enabled),
        forwarding_enabled: Set(settings.forwarding_enabled),
        updated_at: Set(now),
    }
}

pub fn model_to_custom_event(model: custom_event::Model) -> CustomEventMapping {
    CustomEventMapping {
        pixel_app_id: model.pixel_app_id,
        name: model.name,
        meta_event_name: model.meta_event_name,
        default_data: CustomData::from_json_text(model.default_data.as_deref()),
    }
}

/// 将 Event 转换为 ActiveModel（只用于插入）
pub fn event_to_active_model(ev: &Event) -> event::ActiveModel {
    use sea_orm::ActiveValue::Set;

    event::ActiveModel {
        id: Set(ev.id.clone()),
        pixel_app_id: Set(ev.pixel_app_id),
        event_name: Set(ev.event_name.clone()),
        url: Set(ev.url.clone()),
        referrer: Set(ev.referrer.clone()),
        session_id: Set(ev.session_id.clone()),
        fingerprint: Set(ev.fingerprint.clone()),
        ip_address: Set(ev.ip_address.clone()),
        country: Set(ev.country.clone()),
        city: Set(ev.city.clone()),
        user_agent_hash: Set(ev.user_agent_hash.clone()),
        browser: Set(ev.browser.clone()),
        os: Set(ev.os.clone()),
        device_type: Set(ev.device_type.clone()),
        screen_width: Set(ev.screen_width),
        screen_height: Set(ev.screen_height),
        utm_source: Set(ev.utm_source.clone()),
        utm_medium: Set(ev.utm_medium.clone()),
        utm_campaign: Set(ev.utm_campaign.clone()),
        custom_data: Set(ev.custom_data.to_json_text()),
        created_at: Set(ev.created_at),
    }
}

pub fn model_to_event(model: event::Model) -> Event {
    Event {
        id: model.id,
        pixel_app_id: model.pixel_app_id,
        event_name: model.event_name,
        url: model.url,
        referrer: model.referrer,
        session_id: model.session_id,
        fingerprint: model.fingerprint,
        ip_address: model.ip_address,
        country: model.country,
        city: model.city,
        user_agent_hash: model.user_agent_hash,
        browser: model.browser,
        os: model.os,
        device_type: model.device_type,
        screen_width: model.screen_width,
        screen_height: model.screen_height,
        utm_source: model.utm_source,
        utm_medium: model.utm_medium,
        utm_campaign: model.utm_campaign,
        custom_data: CustomData::from_json_text(model.custom_data.as_deref()),
        created_at: model.created_at,
    }
}

pub fn model_to_daily_stat(model: daily_stat::Model) -> DailyStat {
    DailyStat {
        day: model.day,
        pageviews: model.pageviews,
        unique_users: model.unique_users,
        sessions: model.sessions,
        events: model.events,
    }
}

pub fn model_to_session(model: analytics_session::Model) -> AnalyticsSession {
    AnalyticsSession {
        session_id: model.session_id,
        pixel_app_id: model.pixel_app_id,
        pageviews: model.pageviews,
        first_seen: model.first_seen,
        last_seen: model.last_seen,
    }
}
