//! HTTP transport for the Conversions API

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use ureq::Agent;

/// 上游返回的原始响应
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// 网络层失败（连接、超时、读取）
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait ConversionsTransport: Send + Sync {
    /// POST `body` 到 `endpoint`，access token 作为查询参数附加
    async fn post_events(
        &self,
        endpoint: &str,
        access_token: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;
}

pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }

    fn post_blocking(
        agent: Agent,
        endpoint: String,
        access_token: String,
        body: serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let mut resp = agent
            .post(&endpoint)
            .query("access_token", &access_token)
            .send_json(&body)
            .map_err(|e| TransportError(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError(format!("response body unreadable: {}", e)))?;

        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl ConversionsTransport for UreqTransport {
    async fn post_events(
        &self,
        endpoint: &str,
        access_token: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let agent = self.agent.clone();
        let endpoint = endpoint.to_string();
        let token = access_token.to_string();
        let body = body.clone();

        tokio::task::spawn_blocking(move || Self::post_blocking(agent, endpoint, token, body))
            .await
            .map_err(|e| TransportError(format!("transport task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let transport = UreqTransport::new(Duration::from_millis(500));
        let result = transport
            .post_events(
                "http://127.0.0.1:1/v19.0/123/events",
                "token",
                &serde_json::json!({"data": []}),
            )
            .await;
        assert!(result.is_err());
    }
}
