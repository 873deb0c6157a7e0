//! Configuration validation
//!
//! Rules:
//! - feed url, cluster_id and subject are present
//! - throttle low watermark <= high watermark
//! - status interval > 0
//! - listener names non-empty and unique
//! - listener max_tries >= 1

use std::collections::HashSet;

use contracts::{AppConfig, ContractError};

/// Validate an AppConfig
///
/// Returns the first error found, or Ok(()).
pub fn validate(config: &AppConfig) -> Result<(), ContractError> {
    validate_feed(config)?;
    validate_notifier(config)?;
    validate_listeners(config)?;
    Ok(())
}

/// Connection identity and throttle
fn validate_feed(config: &AppConfig) -> Result<(), ContractError> {
    let feed = &config.feed;
    for (field, value) in [
        ("feed.url", &feed.url),
        ("feed.cluster_id", &feed.cluster_id),
        ("feed.subject", &feed.subject),
    ] {
        if value.trim().is_empty() {
            return Err(ContractError::config_validation(field, "is required"));
        }
    }

    if feed.client_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        return Err(ContractError::config_validation(
            "feed.client_id",
            "cannot be empty when set",
        ));
    }

    let throttle = &feed.throttle;
    if throttle.low_watermark > throttle.high_watermark {
        return Err(ContractError::config_validation(
            "feed.throttle.low_watermark / feed.throttle.high_watermark",
            format!(
                "low_watermark ({}) must be <= high_watermark ({})",
                throttle.low_watermark, throttle.high_watermark
            ),
        ));
    }

    if feed.initial_catch_up_age_days < 0.0 {
        return Err(ContractError::config_validation(
            "feed.initial_catch_up_age_days",
            format!("must be >= 0, got {}", feed.initial_catch_up_age_days),
        ));
    }

    Ok(())
}

fn validate_notifier(config: &AppConfig) -> Result<(), ContractError> {
    if config.notifier.status_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "notifier.status_interval_ms",
            "status_interval_ms must be > 0",
        ));
    }
    Ok(())
}

/// Listener names and retry settings
fn validate_listeners(config: &AppConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, listener) in config.listeners.iter().enumerate() {
        if listener.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("listeners[{}].name", idx),
                "listener name cannot be empty",
            ));
        }
        if !seen.insert(&listener.name) {
            return Err(ContractError::config_validation(
                format!("listeners[name={}]", listener.name),
                "duplicate listener name",
            ));
        }
        if listener.max_tries == 0 {
            return Err(ContractError::config_validation(
                format!("listeners[{}].max_tries", listener.name),
                "max_tries must be >= 1",
            ));
        }
    }
    Ok(())
}
