//! Startup wiring
//!
//! Builds every long-lived service once and hands the bundle to the HTTP
//! server. External collaborators (GeoIP, the Conversions API transport and
//! the token refresher) are grouped in [`ExternalDeps`] so tests can swap
//! them for in-process fakes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::api::services::{AppStartTime, ClientIpPolicy};
use crate::cache::ViewCache;
use crate::config::StaticConfig;
use crate::services::forwarding::{ConversionsTransport, UreqTransport};
use crate::services::token::GraphTokenRefresher;
use crate::services::{
    ForwardingClient, ForwardingPipeline, GeoIpProvider, StatsService, TokenManager,
    TokenRefresher, TrackingService,
};
use crate::storage::{SeaOrmStorage, StorageFactory};

/// 外部依赖
pub struct ExternalDeps {
    pub geoip: GeoIpProvider,
    pub transport: Arc<dyn ConversionsTransport>,
    pub refresher: Arc<dyn TokenRefresher>,
}

impl ExternalDeps {
    pub fn production(config: &StaticConfig) -> Self {
        let timeout = Duration::from_millis(config.forwarding.request_timeout_ms);
        Self {
            geoip: GeoIpProvider::new(&config.analytics),
            transport: Arc::new(UreqTransport::new(timeout)),
            refresher: Arc::new(GraphTokenRefresher::new(&config.forwarding)),
        }
    }
}

/// 服务器运行所需的全部共享状态
#[derive(Clone)]
pub struct AppServices {
    pub storage: Arc<SeaOrmStorage>,
    pub cache: Arc<ViewCache>,
    pub tracking: Arc<TrackingService>,
    pub stats: Arc<StatsService>,
    pub ip_policy: ClientIpPolicy,
    pub api_token: String,
    pub max_payload_bytes: usize,
    pub start_time: AppStartTime,
}

impl AppServices {
    pub fn build(storage: Arc<SeaOrmStorage>, config: &StaticConfig, deps: ExternalDeps) -> Self {
        let cache = Arc::new(ViewCache::from_config(&config.cache));

        let tokens = TokenManager::new(storage.clone(), cache.clone(), deps.refresher);
        let client = ForwardingClient::new(&config.forwarding, deps.transport);
        let forwarding = Arc::new(ForwardingPipeline::new(
            client,
            tokens,
            Duration::from_millis(config.forwarding.task_budget_ms),
        ));

        let tracking = Arc::new(TrackingService::new(
            storage.clone(),
            deps.geoip,
            forwarding,
        ));
        let stats = Arc::new(StatsService::new(storage.clone(), cache.clone()));

        Self {
            storage,
            cache,
            tracking,
            stats,
            ip_policy: ClientIpPolicy {
                trusted_proxies: config.analytics.trusted_proxies.clone(),
            },
            api_token: config.api.token.trim().to_string(),
            max_payload_bytes: config.server.max_payload_bytes,
            start_time: AppStartTime {
                start_datetime: chrono::Utc::now(),
            },
        }
    }
}

/// 安装 rustls ring provider（数据库 TLS 连接需要）
pub fn install_crypto_provider() {
    // 已安装过 provider 时返回 Err，可忽略
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// 准备服务器启动的上下文
/// 包括存储、缓存和各业务服务
pub async fn prepare_server_startup() -> Result<AppServices> {
    let started = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    install_crypto_provider();

    let config = crate::config::get_config();

    let storage = StorageFactory::create()
        .await
        .context("Failed to create storage backend")?;
    storage
        .ping()
        .await
        .context("Database is not reachable")?;
    info!("Using storage backend: {}", storage.info().storage_type);

    let deps = ExternalDeps::production(&config);
    info!("GeoIP provider: {}", deps.geoip.provider_name());

    if config.api.token.trim().is_empty() {
        warn!("api.token is empty, /api/v1 routes are disabled");
    }
    if config.analytics.trusted_proxies.is_empty() {
        warn!(
            "No trusted proxies configured. \
             Connections from private IPs will use X-Forwarded-For."
        );
    }
    if config.forwarding.app_id.is_none() || config.forwarding.app_secret.is_none() {
        warn!("forwarding.app_id/app_secret not set, expired access tokens cannot be refreshed");
    }

    let services = AppServices::build(storage, &config, deps);

    info!(
        "Pre-startup processing completed in {} ms",
        started.elapsed().as_millis()
    );
    Ok(services)
}
