//! Process-wide tracing setup for the lending engine.
//!
//! Call `init()` once at startup. It is safe to call multiple times;
//! subsequent calls become no-ops.

pub mod subscriber;

pub use subscriber::{DEFAULT_FILTER, init, init_for_tests, init_with_default};
