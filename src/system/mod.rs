//! System-level modules
//!
//! Process-wide setup that runs before any mode starts.

pub mod logging;

pub use logging::init_logging;
