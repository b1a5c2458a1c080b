use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 追踪目标配置，对应一个外部 pixel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PixelApp {
    pub id: i64,
    pub app_key: String,
    pub name: String,
    pub enabled: bool,
    pub website_domain: Option<String>,
    pub shop: String,
    pub created_at: DateTime<Utc>,
}

/// 新建 PixelApp 的参数
#[derive(Debug, Clone)]
pub struct NewPixelApp {
    pub app_key: String,
    pub name: String,
    pub enabled: bool,
    pub website_domain: Option<String>,
    pub shop: String,
}

/// PixelApp 的外部 API 设置（1:1）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PixelSettings {
    pub pixel_app_id: i64,
    pub external_pixel_id: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub test_event_code: Option<String>,
    pub record_ip: bool,
    pub record_location: bool,
    pub custom_events_enabled: bool,
    pub forwarding_enabled: bool,
}

impl PixelSettings {
    /// 新 app 的默认设置：记录 IP，不做地理定位，不启用自定义映射
    pub fn defaults_for(pixel_app_id: i64) -> Self {
        Self {
            pixel_app_id,
            external_pixel_id: None,
            access_token: None,
            token_expires_at: None,
            test_event_code: None,
            record_ip: true,
            record_location: false,
            custom_events_enabled: false,
            forwarding_enabled: true,
        }
    }
}

/// 自定义事件负载：字符串 → 任意 JSON 值
///
/// 使用 BTreeMap 保证序列化顺序稳定。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CustomData(BTreeMap<String, serde_json::Value>);

impl CustomData {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// 从 JSON 值构造；非 object 返回 None
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(map) => Some(Self(map.into_iter().collect())),
            _ => None,
        }
    }

    /// 解析数据库中的 JSON 文本；解析失败或非 object 视为空
    pub fn from_json_text(text: Option<&str>) -> Self {
        text.and_then(|t| serde_json::from_str::<serde_json::Value>(t).ok())
            .and_then(Self::from_value)
            .unwrap_or_default()
    }

    /// 以 `defaults` 为底，`overrides` 中的同名键覆盖默认值
    pub fn merged(defaults: &CustomData, overrides: &CustomData) -> CustomData {
        let mut merged = defaults.0.clone();
        for (key, value) in &overrides.0 {
            merged.insert(key.clone(), value.clone());
        }
        CustomData(merged)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn to_json_text(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            serde_json::to_string(&self.0).ok()
        }
    }
}

/// 内部事件名 → 外部标准事件名映射
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEventMapping {
    pub pixel_app_id: i64,
    pub name: String,
    pub meta_event_name: String,
    pub default_data: CustomData,
}

/// 不可变事件记录
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub pixel_app_id: i64,
    pub event_name: String,
    pub url: Option<String>,
    pub referrer: Option<String>,
    pub session_id: Option<String>,
    pub fingerprint: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub user_agent_hash: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
    pub screen_width: Option<i32>,
    pub screen_height: Option<i32>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub custom_data: CustomData,
    pub created_at: DateTime<Utc>,
}

/// 天级统计
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub day: NaiveDate,
    pub pageviews: i64,
    pub unique_users: i64,
    pub sessions: i64,
    pub events: i64,
}

/// 会话快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsSession {
    pub session_id: String,
    pub pixel_app_id: i64,
    pub pageviews: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// 存储后端信息（健康检查使用）
#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub storage_type: String,
    pub max_concurrent: usize,
    pub in_flight: usize,
}

/// 单次事件对汇总表的增量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatDelta {
    pub pageviews: i64,
    pub unique_users: i64,
    pub sessions: i64,
    pub events: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_request_wins_on_conflict() {
        let defaults = CustomData::from_value(json!({"currency": "USD", "value": 0})).unwrap();
        let request = CustomData::from_value(json!({"value": 19.99, "content_ids": ["42"]})).unwrap();

        let merged = CustomData::merged(&defaults, &request);
        assert_eq!(merged.get("currency"), Some(&json!("USD")));
        assert_eq!(merged.get("value"), Some(&json!(19.99)));
        assert_eq!(merged.get("content_ids"), Some(&json!(["42"])));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(CustomData::from_value(json!([1, 2])).is_none());
        assert!(CustomData::from_value(json!("x")).is_none());
    }

    #[test]
    fn test_from_json_text_tolerates_garbage() {
        assert!(CustomData::from_json_text(Some("not json")).is_empty());
        assert!(CustomData::from_json_text(None).is_empty());
        let parsed = CustomData::from_json_text(Some(r#"{"a":1}"#));
        assert_eq!(parsed.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_empty_serializes_to_none() {
        assert_eq!(CustomData::new().to_json_text(), None);
    }
}
