//! Server mode
//!
//! This module contains the HTTP server startup logic.
//! It configures and starts the HTTP server with all necessary routes.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::Result;
use tracing::{error, info, warn};

use crate::api::middleware::{ApiAuth, RequestIdMiddleware};
use crate::api::services::{health_routes, json_config, pixel_routes, track_routes};
use crate::runtime::lifetime::{AppServices, prepare_server_startup, shutdown};

/// 注册共享状态与全部路由
///
/// 测试通过 `App::new().configure(|cfg| configure_routes(cfg, &services))`
/// 复用同一套路由。
pub fn configure_routes(cfg: &mut web::ServiceConfig, services: &AppServices) {
    cfg.app_data(web::Data::new(Arc::clone(&services.storage)))
        .app_data(web::Data::from(Arc::clone(&services.tracking)))
        .app_data(web::Data::from(Arc::clone(&services.stats)))
        .app_data(web::Data::new(services.ip_policy.clone()))
        .app_data(web::Data::new(services.start_time.clone()))
        .app_data(json_config(services.max_payload_bytes))
        .service(health_routes())
        .service(
            web::scope("/api/v1")
                .wrap(ApiAuth::new(&services.api_token))
                .configure(pixel_routes),
        )
        .configure(track_routes);
}

/// Run the HTTP server
///
/// This function:
/// 1. Prepares storage and services
/// 2. Configures and starts the HTTP server
/// 3. Stops gracefully on Ctrl+C / SIGTERM and closes the database pool
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let services = prepare_server_startup().await.map_err(|e| {
        error!("Server startup failed: {}", e);
        e
    })?;

    let config = crate::config::get_config();
    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let db_for_shutdown = services.storage.get_db();
    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        let services = services.clone();
        App::new()
            .wrap(
                DefaultHeaders::new()
                    .add(("Cache-Control", "no-cache, no-store, must-revalidate"))
                    .add(("X-Content-Type-Options", "nosniff")),
            )
            .wrap(Compress::default())
            // 最外层，为每个请求生成 request_id
            .wrap(RequestIdMiddleware)
            .configure(|cfg| configure_routes(cfg, &services))
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .client_disconnect_timeout(Duration::from_millis(1000))
    .workers(cpu_count)
    .disable_signals()
    .bind(&bind_address)?
    .run();

    warn!("Starting server at http://{}", bind_address);

    let handle = server.handle();
    actix_web::rt::spawn(async move {
        shutdown::wait_for_signal().await;
        info!("Stopping HTTP server, draining in-flight requests...");
        handle.stop(true).await;
    });

    server.await?;
    shutdown::close_database(db_for_shutdown).await;
    warn!("Graceful shutdown completed");

    Ok(())
}
