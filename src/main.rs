use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cmdring::config::Config;
use cmdring::server::{serve, stamp_timestamps};
use cmdring::{RING_CAPACITY, SharedRing};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    if let Err(e) = run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).init();
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let ring = Arc::new(SharedRing::new());

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}, retaining {RING_CAPACITY} commands");

    spawn_signal_handler(shutdown.clone());

    if let Some(period) = config.timestamp_interval() {
        info!("committing a timestamp every {}s", period.as_secs());
        tokio::spawn(stamp_timestamps(
            Arc::clone(&ring),
            period,
            shutdown.child_token(),
        ));
    }

    serve(listener, ring, shutdown).await
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate())
            .inspect_err(|e| warn!("cannot listen for SIGTERM: {e}"))
            .ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Caught SIGINT, exiting"),
            _ = async {
                match sigterm.as_mut() {
                    Some(s) => s.recv().await,
                    None => std::future::pending().await,
                }
            } => info!("Caught SIGTERM, exiting"),
        }

        shutdown.cancel();
    });
}
