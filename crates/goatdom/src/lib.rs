pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;

/// Install logging; `default_level` applies unless `GOATDOM_LOG` is set.
pub fn init(default_level: &str) {
    infra::logging::init(default_level);
}
