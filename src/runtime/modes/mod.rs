//! Execution modes
//!
//! - Server mode (HTTP server, default)
//! - `generate-config`: print a sample configuration and exit

pub mod server;

pub use server::{configure_routes, run_server};

use crate::config::StaticConfig;

/// 打印示例配置到 stdout
pub fn print_sample_config() {
    println!("{}", StaticConfig::generate_sample_config());
}
