//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::{AppConfig, ProductFilter};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    feed: FeedInfo,
    notifier: NotifierInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<IndexInfo>,
    listeners: Vec<ListenerInfo>,
}

#[derive(Serialize)]
struct FeedInfo {
    url: String,
    cluster_id: String,
    client_id: String,
    subject: String,
    tracking_file: String,
    tracking_interval_ms: u64,
    initial_catch_up_age_days: f64,
    catch_up_timeout_ms: u64,
    high_watermark: usize,
    low_watermark: usize,
}

#[derive(Serialize)]
struct NotifierInfo {
    status_interval_ms: u64,
}

#[derive(Serialize)]
struct IndexInfo {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed_file: Option<String>,
}

#[derive(Serialize)]
struct ListenerInfo {
    name: String,
    listener_type: String,
    max_tries: u32,
    retry_delay_ms: u64,
    use_index: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<ProductFilter>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &AppConfig, args: &InfoArgs) -> ConfigInfo {
    let feed = &config.feed;

    let listeners = config
        .listeners
        .iter()
        .map(|l| ListenerInfo {
            name: l.name.clone(),
            listener_type: format!("{:?}", l.listener_type),
            max_tries: l.max_tries,
            retry_delay_ms: l.retry_delay_ms,
            use_index: l.use_index,
            filter: args.listeners.then(|| l.filter.clone()),
            params: if args.listeners {
                l.params.clone()
            } else {
                HashMap::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", config.version),
        feed: FeedInfo {
            url: feed.url.clone(),
            cluster_id: feed.cluster_id.clone(),
            client_id: feed.effective_client_id(),
            subject: feed.subject.clone(),
            tracking_file: feed.tracking_file.display().to_string(),
            tracking_interval_ms: feed.tracking_interval_ms,
            initial_catch_up_age_days: feed.initial_catch_up_age_days,
            catch_up_timeout_ms: feed.catch_up_timeout_ms,
            high_watermark: feed.throttle.high_watermark,
            low_watermark: feed.throttle.low_watermark,
        },
        notifier: NotifierInfo {
            status_interval_ms: config.notifier.status_interval_ms,
        },
        index: config.index.as_ref().map(|i| IndexInfo {
            name: i.name.clone(),
            seed_file: i.seed_file.as_ref().map(|p| p.display().to_string()),
        }),
        listeners,
    }
}

fn print_config_info(config: &AppConfig, args: &InfoArgs) {
    let feed = &config.feed;

    println!("=== pdl-notify Configuration ===\n");

    println!("Feed");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ URL: {}", feed.url);
    println!("   ├─ Cluster: {}", feed.cluster_id);
    println!("   ├─ Client id: {}", feed.effective_client_id());
    println!("   ├─ Subject: {}", feed.subject);
    println!(
        "   ├─ Tracking: {} (every {} ms)",
        feed.tracking_file.display(),
        feed.tracking_interval_ms
    );
    println!(
        "   ├─ Initial catch-up age: {} days",
        feed.initial_catch_up_age_days
    );
    println!(
        "   └─ Throttle: high={} low={} wait={} ms",
        feed.throttle.high_watermark, feed.throttle.low_watermark, feed.throttle.wait_interval_ms
    );

    println!("\nNotifier");
    println!(
        "   └─ Status interval: {} ms",
        config.notifier.status_interval_ms
    );

    if let Some(ref index) = config.index {
        println!("\nIndex");
        println!("   ├─ Name: {}", index.name);
        match index.seed_file {
            Some(ref path) => println!("   └─ Seed file: {}", path.display()),
            None => println!("   └─ Seed file: (none)"),
        }
    }

    println!("\nListeners ({})", config.listeners.len());
    for (i, listener) in config.listeners.iter().enumerate() {
        let is_last = i == config.listeners.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({:?}) max_tries={} retry_delay={} ms{}",
            prefix,
            listener.name,
            listener.listener_type,
            listener.max_tries,
            listener.retry_delay_ms,
            if listener.use_index { " [index]" } else { "" }
        );

        if args.listeners {
            let filter = &listener.filter;
            if !filter.include_types.is_empty() {
                println!("   {}  types: {:?}", child_prefix, filter.include_types);
            }
            if !filter.include_sources.is_empty() {
                println!("   {}  sources: {:?}", child_prefix, filter.include_sources);
            }
            for (key, value) in &listener.params {
                println!("   {}  {} = {}", child_prefix, key, value);
            }
        }
    }

    println!();
}
