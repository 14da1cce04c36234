//! Logging utilities
//!
//! The runtime only talks to the `log` facade. Host applications pick the
//! backend; these helpers install `env_logger`, honouring `RUST_LOG`.

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Initialize logging with a default level, still overridable by `RUST_LOG`
pub fn init_with_level(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Install a test-friendly logger; returns `false` if one was already set
pub fn try_init_for_tests() -> bool {
    env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init()
        .is_ok()
}
