//! Read-only pixel views under `/api/v1/pixels`

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use super::error::ApiError;
use crate::services::StatsService;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub refresh: bool,
}

pub async fn pixel_stats(
    path: web::Path<String>,
    query: web::Query<StatsQuery>,
    stats: web::Data<StatsService>,
) -> Result<HttpResponse, ApiError> {
    let view = stats
        .daily_stats(&path.into_inner(), query.days, query.refresh)
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn pixel_summary(
    path: web::Path<String>,
    stats: web::Data<StatsService>,
) -> Result<HttpResponse, ApiError> {
    let view = stats.summary(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub fn pixel_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/pixels/{id}", web::get().to(pixel_summary))
        .route("/pixels/{id}/stats", web::get().to(pixel_stats));
}
