mod r#impl;
mod structs;

pub use r#impl::{get_config, init_config, init_config_from, install_config};
pub use structs::*;
