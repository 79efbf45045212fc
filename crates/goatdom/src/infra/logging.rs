//! Tracing subscriber setup.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an env-filter directive, e.g. `goatdom=debug`.
pub const LOG_ENV: &str = "GOATDOM_LOG";

static INIT: OnceCell<()> = OnceCell::new();

/// Install the global stderr subscriber. `default_level` applies when `GOATDOM_LOG` is unset
/// or invalid. Later calls are no-ops.
pub fn init(default_level: &str) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
