//! GeoIP 服务模块
//!
//! 粗粒度地理定位（国家 + 城市），仅在 PixelApp 开启 `record_location`
//! 且客户端 IP 为公网地址时使用。数据源：
//! - MaxMind GeoLite2 本地数据库
//! - 外部 HTTP API
//! - 都未配置时不做定位

mod external_api;
mod maxmind;
mod provider;

pub use external_api::parse_geo_response;
pub use provider::{GeoInfo, GeoIpLookup, GeoIpProvider};
