pub mod error;
pub mod health;
pub mod stats;
pub mod track;

pub use error::ApiError;
pub use health::{AppStartTime, HealthService, health_routes};
pub use stats::pixel_routes;
pub use track::{ClientIpPolicy, json_config, track_routes};
