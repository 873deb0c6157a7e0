//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use super::load_config;
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(ref url) = args.url {
        info!(url = %url, "Overriding feed url from CLI");
        config.feed.url = url.clone();
    }
    if let Some(ref tracking_file) = args.tracking_file {
        info!(path = %tracking_file.display(), "Overriding tracking file from CLI");
        config.feed.tracking_file = tracking_file.clone();
    }

    info!(
        url = %config.feed.url,
        subject = %config.feed.subject,
        client_id = %config.feed.effective_client_id(),
        listeners = config.listeners.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        app: config,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting feed client...");

    let stats = pipeline
        .run(setup_shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        delivered = stats.totals.delivered,
        dropped = stats.totals.dropped,
        cursor = %stats.cursor,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_config_summary(config: &contracts::AppConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Feed:");
    println!("  URL: {}", config.feed.url);
    println!("  Subject: {}", config.feed.subject);
    println!("  Client id: {}", config.feed.effective_client_id());
    println!("  Tracking file: {}", config.feed.tracking_file.display());

    if let Some(ref index) = config.index {
        println!("\nIndex: {}", index.name);
    }

    println!("\nListeners ({}):", config.listeners.len());
    for listener in &config.listeners {
        println!(
            "  - {} ({:?}) max_tries={} use_index={}",
            listener.name, listener.listener_type, listener.max_tries, listener.use_index
        );
    }

    println!();
}
