use prefork_httpd::cli::Cli;
use prefork_httpd::config::ServerConfig;
use prefork_httpd::error::Result;
use prefork_httpd::server::Server;
use prefork_httpd::set_trace_enabled;
use proxy_log::info;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let config = ServerConfig::from(cli);
    set_trace_enabled(config.trace);

    print!("{}", config);
    info!("starting up");

    let mut server = Server::bind(config)?;
    server.run()
}
