//! HTTP surface
//!
//! - `POST /track`: public, CORS-enabled ingestion endpoint
//! - `/api/v1`: bearer-protected read views
//! - `/health`: probes

pub mod middleware;
pub mod services;

use actix_cors::Cors;
use actix_web::http::{Method, header};

/// storefront 跨域上报：任意来源，仅 POST/OPTIONS，不带凭据
pub fn track_cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods([Method::POST, Method::OPTIONS])
        .allowed_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(86_400)
}
