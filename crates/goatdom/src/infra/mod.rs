//! Infrastructure adapters for config, HTTP, files, and logging.

pub mod client;
pub mod config;
pub mod fs;
pub mod logging;
