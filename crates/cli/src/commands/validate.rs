//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::AppConfig;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    feed_url: String,
    subject: String,
    client_id: String,
    listener_count: usize,
    index: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_config(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    feed_url: config.feed.url.clone(),
                    subject: config.feed.subject.clone(),
                    client_id: config.feed.effective_client_id(),
                    listener_count: config.listeners.len(),
                    index: config.index.as_ref().map(|i| i.name.clone()),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal configuration issues
fn collect_warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.listeners.is_empty() {
        warnings.push("No listeners configured - notifications will be dropped".to_string());
    }

    if config.index.is_none() {
        for listener in config.listeners.iter().filter(|l| l.use_index) {
            warnings.push(format!(
                "Listener '{}' sets use_index but no [index] is configured",
                listener.name
            ));
        }
    }

    for listener in &config.listeners {
        if listener.max_tries > 1 && listener.retry_delay_ms == 0 {
            warnings.push(format!(
                "Listener '{}' retries without delay",
                listener.name
            ));
        }
        if !listener.filter.include_actuals
            && !listener.filter.include_tests
            && !listener.filter.include_scenarios
            && !listener.filter.include_internals
            && !listener.filter.include_developments
        {
            warnings.push(format!(
                "Listener '{}' filter accepts no product kinds",
                listener.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Feed: {} ({})", summary.feed_url, summary.subject);
            println!("  Client id: {}", summary.client_id);
            println!("  Listeners: {}", summary.listener_count);
            if let Some(ref index) = summary.index {
                println!("  Index: {}", index);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
