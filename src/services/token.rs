//! Access token lifecycle
//!
//! Before each forward the stored token is classified as missing, valid or
//! expired. An expired token gets exactly one refresh attempt; a refreshed
//! token is persisted and the app's cached views are dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use ureq::Agent;

use crate::cache::{ViewCache, pixel_prefix};
use crate::config::ForwardingConfig;
use crate::errors::{PixelRelayError, Result};
use crate::storage::{PixelSettings, SeaOrmStorage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Missing,
    Valid(String),
    Expired(String),
}

/// 无过期时间或过期时间在未来视为有效
pub fn token_state(settings: &PixelSettings, now: DateTime<Utc>) -> TokenState {
    let Some(token) = settings
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return TokenState::Missing;
    };

    match settings.token_expires_at {
        Some(expires_at) if expires_at <= now => TokenState::Expired(token.to_string()),
        _ => TokenState::Valid(token.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, current_token: &str) -> Result<RefreshedToken>;
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Graph API `oauth/access_token` 长期 token 交换
pub struct GraphTokenRefresher {
    endpoint: String,
    app_id: Option<String>,
    app_secret: Option<String>,
    agent: Agent,
}

impl GraphTokenRefresher {
    pub fn new(config: &ForwardingConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_millis(config.request_timeout_ms)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            endpoint: format!(
                "{}/{}/oauth/access_token",
                config.graph_api_url.trim_end_matches('/'),
                config.api_version
            ),
            app_id: config.app_id.clone().filter(|s| !s.is_empty()),
            app_secret: config.app_secret.clone().filter(|s| !s.is_empty()),
            agent,
        }
    }

    fn exchange_blocking(
        agent: Agent,
        endpoint: String,
        app_id: String,
        app_secret: String,
        current_token: String,
    ) -> Result<RefreshedToken> {
        let mut resp = agent
            .get(&endpoint)
            .query("grant_type", "fb_exchange_token")
            .query("client_id", &app_id)
            .query("client_secret", &app_secret)
            .query("fb_exchange_token", &current_token)
            .call()
            .map_err(|e| PixelRelayError::upstream(format!("token refresh request failed: {}", e)))?;

        let status = resp.status().as_u16();
        let body = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| PixelRelayError::upstream(format!("token refresh body unreadable: {}", e)))?;

        if !(200..300).contains(&status) {
            return Err(PixelRelayError::upstream(format!(
                "token refresh rejected with HTTP {}: {}",
                status, body
            )));
        }

        let parsed: ExchangeResponse = serde_json::from_str(&body)?;
        Ok(RefreshedToken {
            access_token: parsed.access_token,
            expires_at: parsed
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }
}

#[async_trait]
impl TokenRefresher for GraphTokenRefresher {
    async fn refresh(&self, current_token: &str) -> Result<RefreshedToken> {
        let (Some(app_id), Some(app_secret)) = (self.app_id.clone(), self.app_secret.clone()) else {
            return Err(PixelRelayError::upstream(
                "token refresh requires forwarding.app_id and forwarding.app_secret",
            ));
        };

        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        let current = current_token.to_string();

        tokio::task::spawn_blocking(move || {
            Self::exchange_blocking(agent, endpoint, app_id, app_secret, current)
        })
        .await
        .map_err(|e| PixelRelayError::upstream(format!("token refresh task failed: {}", e)))?
    }
}

#[derive(Clone)]
pub struct TokenManager {
    storage: Arc<SeaOrmStorage>,
    cache: Arc<ViewCache>,
    refresher: Arc<dyn TokenRefresher>,
}

impl TokenManager {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        cache: Arc<ViewCache>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            storage,
            cache,
            refresher,
        }
    }

    /// 返回可用于本次转发的 token；None 表示跳过转发
    pub async fn usable_token(&self, settings: &PixelSettings) -> Option<String> {
        let app_id = settings.pixel_app_id;

        let expired = match token_state(settings, Utc::now()) {
            TokenState::Missing => {
                debug!("No access token for pixel app {}, skipping forward", app_id);
                return None;
            }
            TokenState::Valid(token) => return Some(token),
            TokenState::Expired(token) => token,
        };

        let refreshed = match self.refresher.refresh(&expired).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!(
                    "Access token for pixel app {} expired and refresh failed: {}",
                    app_id, e
                );
                return None;
            }
        };

        if let Err(e) = self
            .storage
            .save_refreshed_token(app_id, &refreshed.access_token, refreshed.expires_at)
            .await
        {
            warn!("Refreshed token for pixel app {} not persisted: {}", app_id, e);
        }
        self.cache.invalidate_pattern(&pixel_prefix(app_id)).await;

        info!(
            "Access token refreshed for pixel app {} (expires {:?})",
            app_id, refreshed.expires_at
        );
        Some(refreshed.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(token: Option<&str>, expires_at: Option<DateTime<Utc>>) -> PixelSettings {
        PixelSettings {
            access_token: token.map(String::from),
            token_expires_at: expires_at,
            ..PixelSettings::defaults_for(1)
        }
    }

    #[test]
    fn test_token_state() {
        let now = Utc::now();
        let hour = chrono::Duration::hours(1);

        assert_eq!(token_state(&settings(None, None), now), TokenState::Missing);
        assert_eq!(token_state(&settings(Some("  "), None), now), TokenState::Missing);
        assert_eq!(
            token_state(&settings(Some("t"), None), now),
            TokenState::Valid("t".to_string())
        );
        assert_eq!(
            token_state(&settings(Some("t"), Some(now + hour)), now),
            TokenState::Valid("t".to_string())
        );
        assert_eq!(
            token_state(&settings(Some("t"), Some(now - hour)), now),
            TokenState::Expired("t".to_string())
        );
    }

    #[tokio::test]
    async fn test_graph_refresher_without_credentials_fails() {
        let refresher = GraphTokenRefresher::new(&ForwardingConfig::default());
        let err = refresher.refresh("old").await.unwrap_err();
        assert!(matches!(err, PixelRelayError::Upstream(_)));
    }
}
