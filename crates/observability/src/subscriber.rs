//! Subscriber installation.
//!
//! Engine spans carry `user_id`, `book_id`, `loan_id` and `saga_id` fields,
//! so the JSON formatter keeps span context on every event.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// JSON logs with timestamps, configurable via `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    init_with_default(DEFAULT_FILTER)
}

pub fn init_with_default(default_filter: &str) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter_or(default_filter))
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok();
    if installed {
        tracing::info!(default_filter, "json logging initialized");
    }
    installed
}

/// Human-readable output captured by the test harness.
pub fn init_for_tests() -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter_or("debug"))
        .compact()
        .with_test_writer()
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("test logging initialized");
    }
    installed
}
