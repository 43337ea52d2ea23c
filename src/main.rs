use std::path::PathBuf;

use clap::Parser;

use upstream_client::config::env::load_from_env;
use upstream_client::config::loader::load_config;
use upstream_client::config::watcher::ConfigWatcher;
use upstream_client::lifecycle::signals::wait_for_signal;
use upstream_client::lifecycle::Runtime;
use upstream_client::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "upstream-client")]
#[command(about = "Resilient upstream service client daemon", long_about = None)]
struct Args {
    /// TOML configuration file, watched for changes. Without it services
    /// are read from the environment.
    #[arg(short, long, env = "UPSTREAM_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        services = config.services.len(),
        source = args.config.as_ref().map_or("environment".into(), |p| p.display().to_string()),
        "upstream-client starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut runtime = Runtime::start(&config).await?;

    // The watcher handle must stay alive for reloads to be delivered.
    let (_watcher, mut updates) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), Some(rx))
        }
        None => (None, None),
    };

    let signal = wait_for_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = &mut signal => break,
            Some(update) = async {
                match updates.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                if let Err(e) = runtime.apply(&update) {
                    tracing::error!(error = %e, "Failed to apply configuration reload");
                }
            }
        }
    }

    runtime.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
