//! Conversions API forwarding
//!
//! Each stored event can be relayed once to the external Conversions API
//! from a detached background task. Forwarding is best-effort: failures are
//! logged and reported as a [`ForwardOutcome`], never raised to the
//! ingestion path.

mod payload;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::token::TokenManager;
use crate::config::ForwardingConfig;
use crate::storage::{CustomEventMapping, Event, PixelSettings};

pub use payload::{
    ClientHints, ConversionsRequest, build_request, default_event_name, hash_external_id,
    resolve_event_name,
};
pub use transport::{ConversionsTransport, TransportError, TransportResponse, UreqTransport};

/// Graph API 限流类错误码
const RETRYABLE_GRAPH_CODES: [i64; 5] = [4, 17, 32, 613, 80004];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Delivered,
    Retryable,
    Fatal,
}

/// 按 HTTP 状态和错误体分类上游响应
pub fn classify_response(status: u16, body: &str) -> Disposition {
    if (200..300).contains(&status) {
        return Disposition::Delivered;
    }
    if status >= 500 || status == 429 {
        return Disposition::Retryable;
    }

    let graph_code = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["code"].as_i64());
    match graph_code {
        Some(code) if RETRYABLE_GRAPH_CODES.contains(&code) => Disposition::Retryable,
        _ => Disposition::Fatal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ForwardingDisabled,
    NoPixelId,
    NoUsableToken,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Delivered {
        attempts: u32,
        events_received: Option<u64>,
    },
    Failed {
        attempts: u32,
        status: Option<u16>,
        message: String,
    },
    Skipped(SkipReason),
}

impl ForwardOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ForwardOutcome::Delivered { .. })
    }
}

/// 后台转发所需的全部数据
#[derive(Debug, Clone)]
pub struct ForwardJob {
    pub event: Event,
    pub settings: PixelSettings,
    pub mapping: Option<CustomEventMapping>,
    pub client: ClientHints,
}

impl ForwardJob {
    /// 开启转发、配置了外部 pixel ID 且存有 token
    pub fn is_eligible(settings: &PixelSettings) -> bool {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        settings.forwarding_enabled
            && has(&settings.external_pixel_id)
            && has(&settings.access_token)
    }
}

pub struct ForwardingClient {
    transport: Arc<dyn ConversionsTransport>,
    base_url: String,
    api_version: String,
    max_attempts: u32,
    backoff: Duration,
}

impl ForwardingClient {
    pub fn new(config: &ForwardingConfig, transport: Arc<dyn ConversionsTransport>) -> Self {
        Self {
            transport,
            base_url: config.graph_api_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    pub fn endpoint(&self, pixel_id: &str) -> String {
        format!("{}/{}/{}/events", self.base_url, self.api_version, pixel_id)
    }

    /// 发送一批事件，可重试错误按固定间隔重试
    pub async fn send(
        &self,
        pixel_id: &str,
        access_token: &str,
        request: &ConversionsRequest,
    ) -> ForwardOutcome {
        let body = match serde_json::to_value(request) {
            Ok(v) => v,
            Err(e) => {
                return ForwardOutcome::Failed {
                    attempts: 0,
                    status: None,
                    message: format!("payload serialization failed: {}", e),
                };
            }
        };
        let endpoint = self.endpoint(pixel_id);

        let mut attempt = 0;
        loop {
            attempt += 1;

            let (disposition, status, message) =
                match self.transport.post_events(&endpoint, access_token, &body).await {
                    Ok(resp) => {
                        let disposition = classify_response(resp.status, &resp.body);
                        if disposition == Disposition::Delivered {
                            let events_received = serde_json::from_str::<serde_json::Value>(&resp.body)
                                .ok()
                                .and_then(|v| v["events_received"].as_u64());
                            return ForwardOutcome::Delivered {
                                attempts: attempt,
                                events_received,
                            };
                        }
                        (disposition, Some(resp.status), resp.body)
                    }
                    Err(e) => (Disposition::Retryable, None, e.to_string()),
                };

            if disposition == Disposition::Fatal || attempt >= self.max_attempts {
                return ForwardOutcome::Failed {
                    attempts: attempt,
                    status,
                    message,
                };
            }

            debug!(
                "Forward to pixel {} attempt {}/{} failed (status {:?}), retrying in {:?}",
                pixel_id, attempt, self.max_attempts, status, self.backoff
            );
            tokio::time::sleep(self.backoff).await;
        }
    }
}

/// token 检查 + payload 构造 + 发送，作为独立后台任务运行
pub struct ForwardingPipeline {
    client: ForwardingClient,
    tokens: TokenManager,
    budget: Duration,
}

impl ForwardingPipeline {
    pub fn new(client: ForwardingClient, tokens: TokenManager, budget: Duration) -> Self {
        Self {
            client,
            tokens,
            budget,
        }
    }

    /// 在独立任务中执行转发；任务超出时间预算即放弃
    pub fn spawn(self: &Arc<Self>, job: ForwardJob) -> JoinHandle<ForwardOutcome> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let event_id = job.event.id.clone();
            match tokio::time::timeout(pipeline.budget, pipeline.run(job)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        "Forwarding event {} abandoned after {:?}",
                        event_id, pipeline.budget
                    );
                    ForwardOutcome::Skipped(SkipReason::TimedOut)
                }
            }
        })
    }

    pub async fn run(&self, job: ForwardJob) -> ForwardOutcome {
        let settings = &job.settings;
        let event_id = &job.event.id;

        if !settings.forwarding_enabled {
            return ForwardOutcome::Skipped(SkipReason::ForwardingDisabled);
        }
        let Some(pixel_id) = settings
            .external_pixel_id
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        else {
            return ForwardOutcome::Skipped(SkipReason::NoPixelId);
        };
        let Some(token) = self.tokens.usable_token(settings).await else {
            return ForwardOutcome::Skipped(SkipReason::NoUsableToken);
        };

        let request = build_request(
            &job.event,
            job.mapping.as_ref(),
            &job.client,
            settings.test_event_code.as_deref(),
        );
        let outcome = self.client.send(pixel_id, &token, &request).await;

        match &outcome {
            ForwardOutcome::Delivered { attempts, .. } => info!(
                "Event {} forwarded to pixel {} ({} attempt(s))",
                event_id, pixel_id, attempts
            ),
            ForwardOutcome::Failed {
                attempts,
                status,
                message,
            } => warn!(
                "Event {} not forwarded to pixel {} after {} attempt(s), status {:?}: {}",
                event_id, pixel_id, attempts, status, message
            ),
            ForwardOutcome::Skipped(_) => {}
        }
        outcome
    }
}
