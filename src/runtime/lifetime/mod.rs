pub mod shutdown;
pub mod startup;

pub use startup::{AppServices, ExternalDeps, install_crypto_provider, prepare_server_startup};
