pub mod api_auth;
pub mod request_id;

pub use api_auth::ApiAuth;
pub use request_id::{RequestId, RequestIdMiddleware};
