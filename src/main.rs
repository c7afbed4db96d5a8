use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use turnstile::config::TurnstileConfig;
use turnstile::http::{default_routes, HttpServer};
use turnstile::ratelimit::RateLimiter;

/// Command line arguments. Flags override values from the config file.
#[derive(Parser, Debug)]
#[command(name = "turnstile")]
#[command(about = "Per-client fixed-window request admission for HTTP services")]
#[command(version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to serve HTTP on
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Maximum requests per client per window
    #[arg(long)]
    max_requests: Option<u64>,

    /// Window length in milliseconds
    #[arg(long)]
    window_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// Overlay flags given on the command line onto `config`.
    fn apply_overrides(&self, config: &mut TurnstileConfig) {
        if let Some(addr) = self.http_addr {
            config.server.http_addr = addr;
        }
        if let Some(max_requests) = self.max_requests {
            config.rate_limiting.max_requests = max_requests;
        }
        if let Some(window_ms) = self.window_ms {
            config.rate_limiting.window_ms = window_ms;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!("Starting Turnstile");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => TurnstileConfig::from_file(path)?,
        None => TurnstileConfig::default(),
    };
    args.apply_overrides(&mut config);

    let limits = config.rate_limiting.limit_config()?;
    info!(
        http_addr = %config.server.http_addr,
        max_requests = limits.max_requests,
        window_ms = config.rate_limiting.window_ms,
        "Configuration loaded"
    );

    let rate_limiter = Arc::new(RateLimiter::start(limits));

    let server = HttpServer::new(config.server.http_addr, rate_limiter.clone());
    let served = server
        .serve_with_shutdown(default_routes(), shutdown_signal())
        .await;

    // Stop the janitor even if the server failed.
    rate_limiter.shutdown().await;
    served?;

    info!("Turnstile stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_thread_ids(true))
            .with(filter)
            .init();
    }
}

/// Signals that stop the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopSignal {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopSignal::Interrupt => write!(f, "SIGINT"),
            StopSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Resolve once the process is asked to stop, so in-flight requests can drain
/// before the janitor is cancelled.
async fn shutdown_signal() {
    let signal = wait_for_stop().await;
    info!(%signal, "Stop requested, draining connections before stopping the janitor");
}

async fn wait_for_stop() -> StopSignal {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => StopSignal::Interrupt,
        _ = terminate => StopSignal::Terminate,
    }
}
