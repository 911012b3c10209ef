use std::path::PathBuf;

use clap::Parser;
use dnscache::{Config, DnsServer, server, telemetry};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dnscache")]
#[command(version, about = "Caching DNS forwarding resolver", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, default_value = "dnscache.toml")]
    config: PathBuf,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(&args.config)?;
    if let Some(port) = args.port {
        config.listen_port = port;
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }

    telemetry::init(&config.log.level).map_err(|e| e as Box<dyn std::error::Error>)?;

    let resolver_config = match config.validate() {
        Ok(c) => c,
        Err(e) => {
            error!(config_file = %args.config.display(), error = %e, "invalid configuration");
            return Err(e.into());
        }
    };

    info!(config_file = %args.config.display(), "Starting dnscache");

    DnsServer::new(resolver_config)
        .run(server::wait_for_signal(tokio::signal::ctrl_c()))
        .await?;

    info!("dnscache shutdown complete");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(args))
}
