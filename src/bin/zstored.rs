//! zstored binary

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zstore::common::{BackendKind, Config};
use zstore::Daemon;

#[derive(Parser, Debug)]
#[command(name = "zstored")]
#[command(about = "ZFS-based block storage provisioning daemon")]
#[command(version = zstore::VERSION)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "ZSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP bind address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Pool to carve volumes from
    #[arg(long)]
    pool: Option<String>,

    /// Storage backend
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load config from file, then override with CLI arguments
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(pool) = args.pool {
        config.pool = pool;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(log_level) = args.log_level {
        config.log_level = log_level;
    }
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "starting zstored {} [os: {}_{}] [pid: {}]",
        zstore::VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH,
        std::process::id()
    );

    let daemon = Daemon::attach(config).await?;
    daemon.serve().await?;

    Ok(())
}
