//! 集成测试公共环境
//!
//! 每个测试使用独立的临时 SQLite 数据库，外部依赖替换为进程内 fake。

#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use pixelrelay::config::StaticConfig;
use pixelrelay::errors::{PixelRelayError, Result};
use pixelrelay::runtime::lifetime::{AppServices, ExternalDeps};
use pixelrelay::services::{GeoInfo, GeoIpLookup, GeoIpProvider};
use pixelrelay::services::forwarding::{ConversionsTransport, TransportError, TransportResponse};
use pixelrelay::services::token::{RefreshedToken, TokenRefresher};
use pixelrelay::storage::backend::ResilienceOptions;
use pixelrelay::storage::{NewPixelApp, PixelApp, PixelSettings, SeaOrmStorage};

pub const API_TOKEN: &str = "test-api-token";
pub const SHOP: &str = "mystore.myshopify.com";
pub const STORE_ORIGIN: &str = "https://mystore.com";

// =============================================================================
// Fake Conversions API transport
// =============================================================================

#[derive(Debug, Clone)]
pub struct SentRequest {
    pub endpoint: String,
    pub access_token: String,
    pub body: serde_json::Value,
}

pub enum TransportMode {
    Respond(u16, &'static str),
    NetworkDown,
}

pub struct RecordingTransport {
    mode: Mutex<TransportMode>,
    sent: Mutex<Vec<SentRequest>>,
}

impl RecordingTransport {
    pub fn new(mode: TransportMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversionsTransport for RecordingTransport {
    async fn post_events(
        &self,
        endpoint: &str,
        access_token: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<TransportResponse, TransportError> {
        self.sent.lock().unwrap().push(SentRequest {
            endpoint: endpoint.to_string(),
            access_token: access_token.to_string(),
            body: body.clone(),
        });
        match &*self.mode.lock().unwrap() {
            TransportMode::Respond(status, body) => Ok(TransportResponse {
                status: *status,
                body: body.to_string(),
            }),
            TransportMode::NetworkDown => Err(TransportError("connection refused".to_string())),
        }
    }
}

// =============================================================================
// Fake token refresher
// =============================================================================

pub struct CountingRefresher {
    result: Option<RefreshedToken>,
    calls: AtomicU32,
}

impl CountingRefresher {
    pub fn succeeding(token: &str, expires_at: Option<DateTime<Utc>>) -> Arc<Self> {
        Arc::new(Self {
            result: Some(RefreshedToken {
                access_token: token.to_string(),
                expires_at,
            }),
            calls: AtomicU32::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: None,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self, _current_token: &str) -> Result<RefreshedToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .ok_or_else(|| PixelRelayError::upstream("refresh rejected: invalid token"))
    }
}

// =============================================================================
// Fake GeoIP
// =============================================================================

/// 固定返回 DE/Berlin，记录被查询的 IP
pub struct CountingGeoIp {
    looked_up: Mutex<Vec<IpAddr>>,
}

impl CountingGeoIp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            looked_up: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.looked_up.lock().unwrap().len()
    }

    pub fn looked_up(&self) -> Vec<IpAddr> {
        self.looked_up.lock().unwrap().clone()
    }
}

#[async_trait]
impl GeoIpLookup for CountingGeoIp {
    async fn lookup(&self, ip: IpAddr) -> Option<GeoInfo> {
        self.looked_up.lock().unwrap().push(ip);
        Some(GeoInfo {
            country: Some("DE".to_string()),
            city: Some("Berlin".to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "Counting"
    }
}

// =============================================================================
// 测试环境
// =============================================================================

pub struct TestEnv {
    _dir: TempDir,
    pub storage: Arc<SeaOrmStorage>,
    pub services: AppServices,
    pub transport: Arc<RecordingTransport>,
    pub refresher: Arc<CountingRefresher>,
    pub geoip: Arc<CountingGeoIp>,
}

pub fn test_config() -> StaticConfig {
    let mut config = StaticConfig::default();
    config.api.token = API_TOKEN.to_string();
    config.forwarding.max_attempts = 2;
    config.forwarding.backoff_ms = 1;
    config.forwarding.task_budget_ms = 5_000;
    config.database.retry_base_delay_ms = 5;
    config.database.retry_max_delay_ms = 20;
    config
}

pub async fn test_storage(dir: &TempDir) -> Arc<SeaOrmStorage> {
    let db_path = dir.path().join("pixelrelay_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let config = test_config();

    Arc::new(
        SeaOrmStorage::new(
            &db_url,
            "sqlite",
            4,
            ResilienceOptions::from_config(&config.database),
        )
        .await
        .expect("创建存储失败"),
    )
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with(
            RecordingTransport::new(TransportMode::Respond(200, r#"{"events_received":1}"#)),
            CountingRefresher::failing(),
        )
        .await
    }

    pub async fn with(
        transport: Arc<RecordingTransport>,
        refresher: Arc<CountingRefresher>,
    ) -> Self {
        let dir = TempDir::new().expect("创建临时目录失败");
        let storage = test_storage(&dir).await;
        let geoip = CountingGeoIp::new();

        let services = AppServices::build(
            storage.clone(),
            &test_config(),
            ExternalDeps {
                geoip: GeoIpProvider::from_lookup(geoip.clone()),
                transport: transport.clone(),
                refresher: refresher.clone(),
            },
        );

        Self {
            _dir: dir,
            storage,
            services,
            transport,
            refresher,
            geoip,
        }
    }

    pub async fn seed_app(&self, app_key: &str, domain: Option<&str>, enabled: bool) -> PixelApp {
        self.storage
            .create_pixel_app(NewPixelApp {
                app_key: app_key.to_string(),
                name: format!("{} pixel", app_key),
                enabled,
                website_domain: domain.map(String::from),
                shop: SHOP.to_string(),
            })
            .await
            .expect("创建 PixelApp 失败")
    }

    /// 覆盖 record_ip / record_location，其余保持默认
    pub async fn set_privacy(&self, app: &PixelApp, record_ip: bool, record_location: bool) {
        let settings = PixelSettings {
            record_ip,
            record_location,
            ..PixelSettings::defaults_for(app.id)
        };
        self.storage
            .upsert_settings(&settings)
            .await
            .expect("写入设置失败");
    }

    /// 开启转发并写入 token
    pub async fn enable_forwarding(
        &self,
        app: &PixelApp,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> PixelSettings {
        let settings = PixelSettings {
            external_pixel_id: Some("998877".to_string()),
            access_token: Some(token.to_string()),
            token_expires_at: expires_at,
            ..PixelSettings::defaults_for(app.id)
        };
        self.storage
            .upsert_settings(&settings)
            .await
            .expect("写入设置失败");
        settings
    }
}
