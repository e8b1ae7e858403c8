//! ## Logging Configuration
//!
//! This module sets up logging automatically at program startup using the `ctor` crate.
//! Logging behavior is controlled by the `DEBUG_FARM_LOAD` environment variable:
//!
//! - **Disabled** (default): If the variable is unset, empty, or explicitly set to `"0"` or `"false"`,
//!   no logging will be initialized.
//! - **Enabled**: Any other value enables logging with a maximum log level of `DEBUG`.
//!
//! Pipeline stages emit `info` events with row counts and `debug` events with the
//! statistics they learn (modes, category sets, capping bounds).
//!
//! ```sh
//! export DEBUG_FARM_LOAD=true
//! ```

use ctor::ctor;
use tracing::Level;

/// Returns true when the given `DEBUG_FARM_LOAD` value turns logging on.
fn logging_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| !(v == "0" || v == "false" || v.is_empty()))
}

#[ctor]
fn set_debug_level() {
    let value = std::env::var("DEBUG_FARM_LOAD").ok();
    if logging_enabled(value.as_deref()) {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }
}
