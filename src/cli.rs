use clap::Parser;

use crate::prelude::{DEFAULT_MAX_CLIENTS, DEFAULT_WORKER_COUNT};

/// Command-line surface for the server binary. `clap`'s derive API is
/// used for argument parsing, since this server takes its configuration
/// entirely from argv — there is no config file to read.
#[derive(Parser, Debug, Clone)]
#[command(name = "prefork_httpd", about = "A concurrent HTTP/1.0 origin server")]
pub struct Cli {
    /// Address to bind and listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: String,

    /// Number of preforked worker processes.
    #[arg(long, default_value_t = DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// Maximum number of simultaneously accepted client connections.
    #[arg(long, default_value_t = DEFAULT_MAX_CLIENTS)]
    pub max_clients: usize,

    /// Directory under which the filesystem storage backend writes
    /// request bodies.
    #[arg(long, default_value = "dir_http_2f6b08")]
    pub write_root: String,

    /// Path to the keyed record-store database.
    #[arg(long, default_value = "db_http_2f6b08")]
    pub db_path: String,

    /// Enables trace-level logging of per-connection handoff and framing
    /// details.
    #[arg(long, default_value_t = false)]
    pub trace: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
