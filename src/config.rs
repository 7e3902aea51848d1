use std::fmt;

use crate::cli::Cli;

/// The fully resolved, ready-to-run configuration for one server instance.
/// Built directly from [`Cli`] — there is no routing table or per-host
/// config list, since this server has exactly one listening address and
/// one pair of storage backends.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub worker_count: usize,
    pub max_clients: usize,
    pub write_root: String,
    pub db_path: String,
    pub trace: bool,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        ServerConfig {
            listen_addr: cli.listen,
            worker_count: cli.workers,
            max_clients: cli.max_clients,
            write_root: cli.write_root,
            db_path: cli.db_path,
            trace: cli.trace,
        }
    }
}

/// Startup banner in the ANSI-dashboard style used throughout this
/// codebase, trimmed to the fields this server needs — no routing
/// table, since there are no per-route configs here.
impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n\x1b[1;35m 🌐 PREFORK HTTPD CONFIGURATION\x1b[0m")?;
        writeln!(
            f,
            "\x1b[38;5;240m ════════════════════════════════════════════════\x1b[0m"
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mListen:\x1b[0m      \x1b[32m{}\x1b[0m",
            self.listen_addr
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mWorkers:\x1b[0m     \x1b[1;32m{}\x1b[0m",
            self.worker_count
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mMax clients:\x1b[0m \x1b[33m{}\x1b[0m",
            self.max_clients
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mWrite root:\x1b[0m  \x1b[36m{}\x1b[0m",
            self.write_root
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mRecord store:\x1b[0m\x1b[36m{}\x1b[0m",
            self.db_path
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mTrace:\x1b[0m       \x1b[{}m{}\x1b[0m",
            if self.trace { "32" } else { "31" },
            if self.trace { "ON" } else { "OFF" }
        )?;
        writeln!(
            f,
            "\x1b[38;5;240m ════════════════════════════════════════════════\x1b[0m"
        )
    }
}
