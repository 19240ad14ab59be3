//! prefix-proxy
//!
//! Routes each request by the first segment of its path to a configured
//! backend domain, strips that segment, and relays the response.
//!
//! ```text
//!     Client ──▶ GET /api/users?page=2
//!                    │
//!                    ▼
//!            ┌──────────────┐   prefix "api"   ┌──────────────┐
//!            │ prefix-proxy │ ───────────────▶ │ api.internal │ GET /users?page=2
//!            └──────────────┘                  └──────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use prefix_proxy::config::{load_config, ObservabilityConfig};
use prefix_proxy::health::probe_all;
use prefix_proxy::observability::logging::init_logging;
use prefix_proxy::routing::PrefixRouter;

#[derive(Parser)]
#[command(name = "prefix-proxy", version)]
#[command(about = "Path-prefix routed HTTP reverse proxy", long_about = None)]
struct Cli {
    /// Configuration file (TOML, or YAML for .yml/.yaml)
    #[arg(short, long, env = "PREFIX_PROXY_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy (default)
    Serve,
    /// Probe every configured backend once and exit
    Check {
        /// Per-backend deadline in seconds
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&ObservabilityConfig::default());
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        path = %cli.config.display(),
        targets = config.target_domains.len(),
        "Configuration loaded"
    );

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => prefix_proxy::lifecycle::run(config, cli.bind).await?,
        Commands::Check { timeout_secs } => {
            let router = PrefixRouter::from_config(&config)?;
            let reports = probe_all(&router, Duration::from_secs(timeout_secs)).await;
            for report in &reports {
                println!("{}", report);
            }

            let unreachable = reports.iter().filter(|r| !r.outcome.is_healthy()).count();
            if unreachable > 0 {
                return Err(format!("{} of {} backends unreachable", unreachable, reports.len()).into());
            }
        }
    }

    Ok(())
}
