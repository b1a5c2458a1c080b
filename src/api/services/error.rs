//! HTTP mapping of [`PixelRelayError`]
//!
//! 4xx responses carry the message; 5xx responses carry only a generic
//! body, the detail goes to the log.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use tracing::error;

use crate::errors::PixelRelayError;

/// 503 时建议客户端等待的秒数
pub const RETRY_AFTER_SECS: u64 = 5;

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug)]
pub struct ApiError(pub PixelRelayError);

impl From<PixelRelayError> for ApiError {
    fn from(err: PixelRelayError) -> Self {
        ApiError(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.format_simple())
    }
}

impl ApiError {
    pub fn body(&self) -> ErrorBody {
        match &self.0 {
            PixelRelayError::Validation(msg) => ErrorBody {
                error: "invalid_request",
                message: Some(msg.clone()),
                ..Default::default()
            },
            PixelRelayError::TrackingDisabled(reason, _) => ErrorBody {
                error: "tracking_disabled",
                message: Some("tracking is disabled for this pixel".to_string()),
                tracking_disabled: Some(true),
                reason: Some(reason.as_code()),
            },
            PixelRelayError::NotFound(msg) => ErrorBody {
                error: "not_found",
                message: Some(msg.clone()),
                ..Default::default()
            },
            e if e.is_transient() => ErrorBody {
                error: "service_unavailable",
                message: Some("temporarily unavailable, retry later".to_string()),
                ..Default::default()
            },
            _ => ErrorBody {
                error: "internal_error",
                message: Some("internal server error".to_string()),
                ..Default::default()
            },
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            PixelRelayError::Validation(_) => StatusCode::BAD_REQUEST,
            PixelRelayError::TrackingDisabled(..) => StatusCode::FORBIDDEN,
            PixelRelayError::NotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self.0.format_simple());
        }

        let mut builder = HttpResponse::build(status);
        if status == StatusCode::SERVICE_UNAVAILABLE {
            builder.insert_header(("Retry-After", RETRY_AFTER_SECS.to_string()));
        }
        builder.json(self.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DenyReason;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PixelRelayError::validation("x"), StatusCode::BAD_REQUEST),
            (
                PixelRelayError::tracking_disabled(DenyReason::DomainMismatch, "x"),
                StatusCode::FORBIDDEN,
            ),
            (PixelRelayError::not_found("x"), StatusCode::NOT_FOUND),
            (PixelRelayError::queue_timeout("x"), StatusCode::SERVICE_UNAVAILABLE),
            (PixelRelayError::operation_timeout("x"), StatusCode::SERVICE_UNAVAILABLE),
            (PixelRelayError::transient_infra("x"), StatusCode::SERVICE_UNAVAILABLE),
            (
                PixelRelayError::database_operation("x"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status_code(), status);
        }
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let body = ApiError(PixelRelayError::database_operation(
            "UNIQUE constraint failed: events.id",
        ))
        .body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "internal_error");
        assert!(!json.to_string().contains("UNIQUE"));
    }

    #[test]
    fn test_forbidden_body_carries_reason() {
        let body = ApiError(PixelRelayError::tracking_disabled(
            DenyReason::NoDomainAssigned,
            "no website domain assigned",
        ))
        .body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["trackingDisabled"], true);
        assert_eq!(json["reason"], "no_domain_assigned");
    }

    #[test]
    fn test_unavailable_sets_retry_after() {
        let resp = ApiError(PixelRelayError::queue_timeout("gate")).error_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.headers().get("Retry-After").unwrap(), "5");
    }
}
