pub mod ttl;

pub use ttl::TtlCache;

/// 读接口缓存的 JSON 视图
pub type ViewCache = TtlCache<serde_json::Value>;

/// 某个 PixelApp 所有缓存视图的 key 前缀
pub fn pixel_prefix(pixel_app_id: i64) -> String {
    format!("pixel:{}:", pixel_app_id)
}

pub fn stats_key(pixel_app_id: i64, days: u32) -> String {
    format!("pixel:{}:stats:{}", pixel_app_id, days)
}

pub fn summary_key(pixel_app_id: i64) -> String {
    format!("pixel:{}:summary", pixel_app_id)
}
