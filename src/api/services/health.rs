use std::sync::Arc;
use std::time::Instant;

use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, trace};

use crate::storage::{SeaOrmStorage, StorageInfo};

/// 应用启动时间
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StorageCheck {
    pub status: &'static str,
    #[serde(flatten)]
    pub info: StorageInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: u64,
    pub storage: StorageCheck,
    pub response_time_ms: u64,
}

pub struct HealthService;

impl HealthService {
    pub async fn health_check(
        storage: web::Data<Arc<SeaOrmStorage>>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        let started = Instant::now();
        trace!("Received health check request");

        let (status, error) = match storage.ping().await {
            Ok(()) => ("healthy", None),
            Err(e) => {
                error!("Storage health check failed: {}", e);
                ("unhealthy", Some(e.error_type().to_string()))
            }
        };

        let now = Utc::now();
        let body = HealthResponse {
            status,
            timestamp: now.to_rfc3339(),
            uptime: (now - app_start_time.start_datetime).num_seconds().max(0) as u64,
            storage: StorageCheck {
                status,
                info: storage.info(),
                error,
            },
            response_time_ms: started.elapsed().as_millis() as u64,
        };

        if status == "healthy" {
            HttpResponse::Ok().json(body)
        } else {
            HttpResponse::ServiceUnavailable().json(body)
        }
    }

    /// 就绪：数据库可达
    pub async fn readiness_check(storage: web::Data<Arc<SeaOrmStorage>>) -> impl Responder {
        match storage.ping().await {
            Ok(()) => HttpResponse::Ok().content_type("text/plain").body("OK"),
            Err(e) => {
                error!("Readiness probe failed: {}", e);
                HttpResponse::ServiceUnavailable()
                    .content_type("text/plain")
                    .body("NOT READY")
            }
        }
    }

    /// 存活：进程能响应即可
    pub async fn liveness_check() -> impl Responder {
        HttpResponse::NoContent().finish()
    }
}

pub fn health_routes() -> actix_web::Scope {
    web::scope("/health")
        .route("", web::get().to(HealthService::health_check))
        .route("", web::head().to(HealthService::health_check))
        .route("/ready", web::get().to(HealthService::readiness_check))
        .route("/ready", web::head().to(HealthService::readiness_check))
        .route("/live", web::get().to(HealthService::liveness_check))
        .route("/live", web::head().to(HealthService::liveness_check))
}
