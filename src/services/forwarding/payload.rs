//! Conversions API payload construction

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::storage::{CustomData, CustomEventMapping, Event};

/// 内部事件名 → 标准事件名（无自定义映射时使用）
const DEFAULT_EVENT_NAMES: &[(&str, &str)] = &[
    ("page_view", "PageView"),
    ("product_viewed", "ViewContent"),
    ("product_added_to_cart", "AddToCart"),
    ("checkout_started", "InitiateCheckout"),
    ("payment_info_submitted", "AddPaymentInfo"),
    ("checkout_completed", "Purchase"),
    ("search_submitted", "Search"),
];

pub fn default_event_name(internal: &str) -> Option<&'static str> {
    DEFAULT_EVENT_NAMES
        .iter()
        .find(|(name, _)| *name == internal)
        .map(|(_, standard)| *standard)
}

/// 自定义映射优先，其次内置映射，否则原样透传
pub fn resolve_event_name(internal: &str, mapping: Option<&CustomEventMapping>) -> String {
    if let Some(mapping) = mapping {
        return mapping.meta_event_name.clone();
    }
    default_event_name(internal)
        .map(String::from)
        .unwrap_or_else(|| internal.to_string())
}

/// fingerprint 的 SHA-256 十六进制摘要
pub fn hash_external_id(fingerprint: &str) -> String {
    hex::encode(Sha256::digest(fingerprint.trim().as_bytes()))
}

#[derive(Debug, Serialize)]
pub struct ConversionsRequest {
    pub data: Vec<ServerEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_event_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerEvent {
    pub event_name: String,
    pub event_time: i64,
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_source_url: Option<String>,
    pub action_source: &'static str,
    pub user_data: UserData,
    #[serde(skip_serializing_if = "CustomData::is_empty")]
    pub custom_data: CustomData,
}

#[derive(Debug, Serialize, Default)]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_user_agent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_id: Vec<String>,
}

/// 请求时的客户端信息（不落库的部分）
#[derive(Debug, Clone, Default)]
pub struct ClientHints {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub fn build_request(
    event: &Event,
    mapping: Option<&CustomEventMapping>,
    client: &ClientHints,
    test_event_code: Option<&str>,
) -> ConversionsRequest {
    let custom_data = match mapping {
        Some(m) => CustomData::merged(&m.default_data, &event.custom_data),
        None => event.custom_data.clone(),
    };

    let external_id = event
        .fingerprint
        .as_deref()
        .filter(|fp| !fp.trim().is_empty())
        .map(hash_external_id)
        .into_iter()
        .collect();

    ConversionsRequest {
        data: vec![ServerEvent {
            event_name: resolve_event_name(&event.event_name, mapping),
            event_time: event.created_at.timestamp(),
            event_id: event.id.clone(),
            event_source_url: event.url.clone(),
            action_source: "website",
            user_data: UserData {
                client_ip_address: client.ip_address.clone(),
                client_user_agent: client.user_agent.clone(),
                external_id,
            },
            custom_data,
        }],
        test_event_code: test_event_code
            .filter(|c| !c.trim().is_empty())
            .map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn event(name: &str) -> Event {
        Event {
            id: "0b8e6f2a-1111-4c4c-9d9d-123456789abc".to_string(),
            pixel_app_id: 1,
            event_name: name.to_string(),
            url: Some("https://mystore.com/products/x".to_string()),
            referrer: None,
            session_id: Some("s1".to_string()),
            fingerprint: Some("fp-123".to_string()),
            ip_address: None,
            country: None,
            city: None,
            user_agent_hash: None,
            browser: None,
            os: None,
            device_type: None,
            screen_width: None,
            screen_height: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            custom_data: CustomData::from_value(json!({"value": 10, "currency": "EUR"})).unwrap(),
            created_at: Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_default_mapping() {
        assert_eq!(resolve_event_name("page_view", None), "PageView");
        assert_eq!(resolve_event_name("checkout_completed", None), "Purchase");
        assert_eq!(resolve_event_name("search_submitted", None), "Search");
        assert_eq!(resolve_event_name("newsletter_signup", None), "newsletter_signup");
    }

    #[test]
    fn test_external_id_is_hashed() {
        let hashed = hash_external_id("fp-123");
        assert_eq!(hashed.len(), 64);
        assert_ne!(hashed, "fp-123");
        assert_eq!(hashed, hash_external_id(" fp-123 "));
    }

    #[test]
    fn test_payload_shape() {
        let client = ClientHints {
            ip_address: Some("203.0.113.9".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };
        let request = build_request(&event("page_view"), None, &client, Some("TEST123"));
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["test_event_code"], "TEST123");
        let data = &body["data"][0];
        assert_eq!(data["event_name"], "PageView");
        assert_eq!(data["event_time"], 1_792_411_200_i64);
        assert_eq!(data["event_id"], "0b8e6f2a-1111-4c4c-9d9d-123456789abc");
        assert_eq!(data["action_source"], "website");
        assert_eq!(data["event_source_url"], "https://mystore.com/products/x");
        assert_eq!(data["user_data"]["client_ip_address"], "203.0.113.9");
        assert_eq!(data["user_data"]["external_id"][0], hash_external_id("fp-123"));
        assert_eq!(data["custom_data"]["currency"], "EUR");
    }

    #[test]
    fn test_mapping_merges_defaults_under_request_data() {
        let mapping = CustomEventMapping {
            pixel_app_id: 1,
            name: "wishlist_add".to_string(),
            meta_event_name: "AddToWishlist".to_string(),
            default_data: CustomData::from_value(json!({"currency": "USD", "content_type": "product"}))
                .unwrap(),
        };
        let request = build_request(
            &event("wishlist_add"),
            Some(&mapping),
            &ClientHints::default(),
            None,
        );
        let body = serde_json::to_value(&request).unwrap();

        assert!(body.get("test_event_code").is_none());
        let data = &body["data"][0];
        assert_eq!(data["event_name"], "AddToWishlist");
        assert_eq!(data["custom_data"]["currency"], "EUR");
        assert_eq!(data["custom_data"]["content_type"], "product");
        assert!(data["user_data"].get("client_ip_address").is_none());
    }
}
