//! Logging macros gated on a per-module `ENABLE_LOGS` constant.
//!
//! A module opts in by declaring the flag next to its imports:
//!
//! ```text
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_debug, log_info};
//! ```
//!
//! Flipping the flag to `false` silences that module without touching `RUST_LOG`,
//! which is handy when one noisy module drowns out the timer transitions.

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
