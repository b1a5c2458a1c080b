//! 外部 HTTP GeoIP API 实现
//!
//! URL 模板使用 `{ip}` 占位符。结果（含失败的负结果）按 IP 缓存 15 分钟，
//! 同一 IP 的并发查询只发一次请求。

use std::net::IpAddr;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{trace, warn};
use ureq::Agent;

use super::provider::{GeoInfo, GeoIpLookup};

const CACHE_TTL_SECS: u64 = 15 * 60;
const CACHE_MAX_CAPACITY: u64 = 10_000;
const HTTP_TIMEOUT_SECS: u64 = 2;

static HTTP_AGENT: OnceLock<Agent> = OnceLock::new();

fn agent() -> &'static Agent {
    HTTP_AGENT.get_or_init(|| {
        Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(HTTP_TIMEOUT_SECS)))
            .build()
            .into()
    })
}

/// 只接受两位字母的 ISO 3166-1 代码；`"Germany"` 这类国家名返回 None
fn iso_country(value: &str) -> Option<String> {
    let code = value.trim();
    (code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| code.to_ascii_uppercase())
}

/// 解析常见 GeoIP API 的响应（ip-api.com、ipapi.co 等）
pub fn parse_geo_response(json: &serde_json::Value) -> Option<GeoInfo> {
    if json["status"].as_str() == Some("fail") || json["error"].as_bool() == Some(true) {
        return None;
    }

    let country = ["countryCode", "country_code", "country"]
        .iter()
        .filter_map(|field| json[*field].as_str())
        .find_map(iso_country);
    let city = json["city"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(String::from);

    if country.is_none() && city.is_none() {
        return None;
    }
    Some(GeoInfo { country, city })
}

pub struct ExternalApiProvider {
    url_template: String,
    cache: Cache<IpAddr, Option<GeoInfo>>,
}

impl ExternalApiProvider {
    pub fn new(url_template: &str) -> Self {
        Self {
            url_template: url_template.to_string(),
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
                .max_capacity(CACHE_MAX_CAPACITY)
                .build(),
        }
    }

    /// 同步请求，在 spawn_blocking 中调用
    fn fetch_blocking(url: String) -> Option<GeoInfo> {
        let resp = match agent().get(&url).call() {
            Ok(r) => r,
            Err(e) => {
                warn!("GeoIP API request to \"{}\" failed: {}", url, e);
                return None;
            }
        };

        match resp.into_body().read_json::<serde_json::Value>() {
            Ok(json) => parse_geo_response(&json),
            Err(e) => {
                warn!("GeoIP API response from \"{}\" parse failed: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl GeoIpLookup for ExternalApiProvider {
    async fn lookup(&self, ip: IpAddr) -> Option<GeoInfo> {
        self.cache
            .get_with(ip, async {
                trace!("GeoIP cache miss for {}", ip);
                let url = self
                    .url_template
                    .replace("{ip}", &urlencoding::encode(&ip.to_string()));
                tokio::task::spawn_blocking(move || Self::fetch_blocking(url))
                    .await
                    .unwrap_or_else(|e| {
                        warn!("GeoIP spawn_blocking failed: {}", e);
                        None
                    })
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ExternalAPI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ip_api_format() {
        let info = parse_geo_response(&json!({
            "status": "success", "countryCode": "DE", "city": "Berlin"
        }))
        .unwrap();
        assert_eq!(info.country.as_deref(), Some("DE"));
        assert_eq!(info.city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_parse_ipapi_co_format() {
        let info = parse_geo_response(&json!({"country_code": "FR", "city": ""})).unwrap();
        assert_eq!(info.country.as_deref(), Some("FR"));
        assert_eq!(info.city, None);
    }

    #[test]
    fn test_country_name_is_not_stored_as_code() {
        let info = parse_geo_response(&json!({"country": "Germany", "city": "Munich"})).unwrap();
        assert_eq!(info.country, None);
        assert_eq!(info.city.as_deref(), Some("Munich"));

        // 代码字段优先，名称字段被忽略
        let info = parse_geo_response(&json!({"country": "Germany", "country_code": "de"})).unwrap();
        assert_eq!(info.country.as_deref(), Some("DE"));

        assert_eq!(parse_geo_response(&json!({"country": "Germany"})), None);
    }

    #[test]
    fn test_parse_failure_status() {
        assert_eq!(
            parse_geo_response(&json!({"status": "fail", "message": "private range"})),
            None
        );
        assert_eq!(parse_geo_response(&json!({})), None);
    }

    #[tokio::test]
    async fn test_unreachable_api_yields_none() {
        let provider = ExternalApiProvider::new("http://127.0.0.1:1/json/{ip}");
        assert_eq!(provider.lookup("8.8.8.8".parse().unwrap()).await, None);
    }
}
