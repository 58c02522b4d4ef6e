//! Strategy loader runner.
//!
//! Loads a strategies source, publishes the registry, then keeps it hot:
//! file changes trigger a reload, and only successful reloads are
//! published. A failed initial load starts with an empty registry rather
//! than exiting; the proxy may legitimately run with zero strategies.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nexthop::{SharedRegistry, StrategyFactory, StrategyRegistry, StrategyWatcher};

#[derive(Parser)]
#[command(name = "nexthop")]
#[command(about = "Load and hot-reload next-hop strategy configuration", long_about = None)]
struct Cli {
    /// Strategies source: a YAML file (with #include support) or a
    /// directory of YAML files.
    #[arg(short, long, default_value = "strategies.yaml")]
    config: PathBuf,

    /// Watch the source and reload on change.
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nexthop=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("nexthop v0.1.0 starting");

    let cli = Cli::parse();
    let factory = Arc::new(StrategyFactory::new());

    let registry = match factory.load(&cli.config) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!(error = %e, "initial load failed, starting with no strategies");
            StrategyRegistry::not_loaded()
        }
    };

    for strategy in registry.iter() {
        tracing::info!(
            strategy = strategy.name(),
            policy = strategy.policy().as_str(),
            groups = strategy.group_count(),
            hosts = strategy.all_hosts().len(),
            "strategy loaded"
        );
    }

    let shared = Arc::new(SharedRegistry::new(registry));

    if !cli.watch {
        return Ok(());
    }

    let (watcher, mut update_rx) = StrategyWatcher::new(&cli.config, factory);
    // keep the notify handle alive for the lifetime of the loop
    let _watcher = watcher.run()?;

    loop {
        tokio::select! {
            Some(new_registry) = update_rx.recv() => {
                shared.publish(new_registry);
                let current = shared.current();
                tracing::info!(
                    strategies = current.len(),
                    names = ?current.names().collect::<Vec<_>>(),
                    "registry reloaded"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
