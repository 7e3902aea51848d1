pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod ipc;
pub mod method_engine;
pub mod prelude;
pub mod server;
pub mod storage;
pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};

/// Gates `trace!` call sites in the hot paths (method engine, IPC layer)
/// behind the `--trace` CLI flag, since `proxy_log`'s macros have no
/// built-in level filtering of their own.
pub static TRACE_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn set_trace_enabled(enabled: bool) {
    TRACE_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn trace_enabled() -> bool {
    TRACE_ENABLED.load(Ordering::Relaxed)
}

/// Emits a `trace!` line only when `--trace` was passed at startup.
#[macro_export]
macro_rules! trace_if {
    ($($arg:tt)*) => {
        if $crate::trace_enabled() {
            $crate::prelude::trace!($($arg)*);
        }
    };
}
