//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Environment toggle that turns on verbose logging when set to `"true"`.
pub const DEBUG_TOGGLE: &str = "write_debug";

const VERBOSE: &str = "info,vmtierd=debug,vmtier_core=debug,vmtier_directory=debug,vmtier_tagger=debug,vmtier_trigger=debug";
const QUIET: &str = "info";

/// Default filter directive for the value of [`DEBUG_TOGGLE`].
pub fn default_directive(toggle: Option<&str>) -> &'static str {
    match toggle {
        Some("true") => VERBOSE,
        _ => QUIET,
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over the toggle.
pub fn init() {
    let toggle = std::env::var(DEBUG_TOGGLE).ok();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(toggle.as_deref())));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
