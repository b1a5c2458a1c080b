//! GeoIP Provider 抽象层
//!
//! 启动时按配置选择实现：
//! 1. maxminddb_path 已配置且可读 → MaxMindProvider
//! 2. geoip_api_url 非空 → ExternalApiProvider
//! 3. 否则 → NullLookup

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::external_api::ExternalApiProvider;
use super::maxmind::MaxMindProvider;
use crate::config::AnalyticsConfig;

/// 地理位置信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoInfo {
    /// ISO 3166-1 alpha-2 国家代码
    pub country: Option<String>,
    pub city: Option<String>,
}

#[async_trait]
pub trait GeoIpLookup: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Option<GeoInfo>;

    /// provider 名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 不做定位
struct NullLookup;

#[async_trait]
impl GeoIpLookup for NullLookup {
    async fn lookup(&self, _ip: IpAddr) -> Option<GeoInfo> {
        None
    }

    fn name(&self) -> &'static str {
        "Disabled"
    }
}

#[derive(Clone)]
pub struct GeoIpProvider {
    inner: Arc<dyn GeoIpLookup>,
}

impl GeoIpProvider {
    pub fn new(config: &AnalyticsConfig) -> Self {
        let external = || -> Arc<dyn GeoIpLookup> {
            if config.geoip_api_url.trim().is_empty() {
                debug!("GeoIP: no external API configured, location lookup disabled");
                Arc::new(NullLookup)
            } else {
                Arc::new(ExternalApiProvider::new(&config.geoip_api_url))
            }
        };

        let inner: Arc<dyn GeoIpLookup> = match config.maxminddb_path.as_deref() {
            Some(path) => match MaxMindProvider::new(path) {
                Ok(provider) => Arc::new(provider),
                Err(e) => {
                    warn!(
                        "GeoIP: Failed to load MaxMind database at {}: {}, falling back",
                        path, e
                    );
                    external()
                }
            },
            None => external(),
        };

        info!("GeoIP: Initialized with {} provider", inner.name());
        Self { inner }
    }

    /// 使用指定实现（测试注入）
    pub fn from_lookup(inner: Arc<dyn GeoIpLookup>) -> Self {
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(NullLookup),
        }
    }

    pub async fn lookup(&self, ip: IpAddr) -> Option<GeoInfo> {
        self.inner.lookup(ip).await
    }

    pub fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}
