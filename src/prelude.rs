pub use crate::error::{CleanError, Result};
pub use crate::http::{HeaderClass, Headers, HttpRequest, HttpResponse, Method, StatusCode};
pub use proxy_log::{debug, errors, info, trace, warn};

pub use std::io::{Read, Write};
pub use std::net::SocketAddr;
pub use std::path::PathBuf;
pub use std::time::SystemTime;

/// Chunk size used by every blocking-read loop in the codec and worker
/// loop.
pub const READ_BUF_SIZE: usize = 4096;

pub const _1MB: usize = 1_024 * 1024;

/// Default worker pool size.
pub const DEFAULT_WORKER_COUNT: usize = 8;

/// Default client slot count.
pub const DEFAULT_MAX_CLIENTS: usize = 5;

/// `listen()` backlog.
pub const LISTEN_BACKLOG: i32 = 100;
