//! `POST /track` endpoint for storefront pixel events

use actix_web::{
    HttpRequest, HttpResponse,
    error::JsonPayloadError,
    http::header::{HeaderName, ORIGIN, REFERER, USER_AGENT},
    web,
};
use serde::Deserialize;
use tracing::debug;

use super::error::ApiError;
use crate::errors::PixelRelayError;
use crate::services::tracking::{ClientContext, TrackRequest, TrackingService};
use crate::utils::ip::extract_client_ip;

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    #[serde(default)]
    pub shop: Option<String>,
}

/// 可信代理列表，决定是否采信转发头
#[derive(Debug, Clone, Default)]
pub struct ClientIpPolicy {
    pub trusted_proxies: Vec<String>,
}

fn header_str(req: &HttpRequest, name: HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "null")
        .map(String::from)
}

pub async fn track(
    req: HttpRequest,
    query: web::Query<TrackQuery>,
    body: web::Json<TrackRequest>,
    service: web::Data<TrackingService>,
    ip_policy: web::Data<ClientIpPolicy>,
) -> Result<HttpResponse, ApiError> {
    let client = ClientContext {
        ip: extract_client_ip(&req, &ip_policy.trusted_proxies),
        user_agent: header_str(&req, USER_AGENT),
        origin: header_str(&req, ORIGIN).or_else(|| header_str(&req, REFERER)),
    };

    let outcome = service
        .track(query.shop.as_deref(), body.into_inner(), client)
        .await?;

    debug!(
        "Tracked event {} (forwarding: {})",
        outcome.response.event_id,
        outcome.forward_task.is_some()
    );
    Ok(HttpResponse::Ok().json(outcome.response))
}

/// 请求体解析失败统一返回 400
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err: JsonPayloadError, _req| {
            let message = match &err {
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    "payload too large".to_string()
                }
                JsonPayloadError::ContentType => "expected application/json".to_string(),
                other => format!("malformed payload: {}", other),
            };
            ApiError(PixelRelayError::validation(message)).into()
        })
}

pub fn track_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/track")
            .wrap(crate::api::track_cors())
            .route(web::post().to(track)),
    );
}
