//! Service layer for business logic
//!
//! HTTP handlers stay thin and delegate here; every service is constructed
//! once at startup and shared through `web::Data`.

pub mod aggregates;
pub mod domain_guard;
pub mod forwarding;
pub mod geoip;
pub mod stats;
pub mod token;
pub mod tracking;
pub mod user_agent;

pub use aggregates::AggregateUpdater;
pub use forwarding::{ForwardOutcome, ForwardingClient, ForwardingPipeline};
pub use geoip::{GeoInfo, GeoIpLookup, GeoIpProvider};
pub use stats::StatsService;
pub use token::{TokenManager, TokenRefresher};
pub use tracking::{ClientContext, TrackRequest, TrackResponse, TrackingService};
