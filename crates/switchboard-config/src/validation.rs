// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: unique tenant ids,
//! channel credentials, provider references, and business-hours syntax.

use std::collections::HashSet;

use chrono::NaiveTime;

use crate::diagnostic::ConfigError;
use crate::model::{MIN_DEDUP_TTL_SECS, SwitchboardConfig, TenantConfig};

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of failing fast.
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(validation("storage.database_path must not be empty"));
    }

    if config.guard.dedup_ttl_secs < MIN_DEDUP_TTL_SECS {
        errors.push(validation(format!(
            "guard.dedup_ttl_secs must be at least {MIN_DEDUP_TTL_SECS}, got {}",
            config.guard.dedup_ttl_secs
        )));
    }
    if config.guard.rate_limit == 0 {
        errors.push(validation("guard.rate_limit must be greater than 0"));
    }
    if config.guard.rate_window_secs == 0 {
        errors.push(validation("guard.rate_window_secs must be greater than 0"));
    }
    if config.conversation.message_cap == 0 {
        errors.push(validation("conversation.message_cap must be greater than 0"));
    }

    let threshold = config.learning.confidence_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        errors.push(validation(format!(
            "learning.confidence_threshold must be within [0, 1], got {threshold}"
        )));
    }

    let mut provider_names = HashSet::new();
    for provider in &config.fallback.providers {
        if provider.name.trim().is_empty() {
            errors.push(validation("fallback.providers entries need a name"));
        } else if !provider_names.insert(provider.name.as_str()) {
            errors.push(validation(format!(
                "fallback provider `{}` is declared twice",
                provider.name
            )));
        }
        if provider.timeout_ms == 0 {
            errors.push(validation(format!(
                "fallback provider `{}` needs a timeout_ms above 0",
                provider.name
            )));
        }
    }
    if let Some(name) = &config.fallback.analysis_provider
        && !provider_names.contains(name.as_str())
    {
        errors.push(validation(format!(
            "fallback.analysis_provider `{name}` is not a declared provider"
        )));
    }

    let mut tenant_ids = HashSet::new();
    for (index, tenant) in config.tenants.iter().enumerate() {
        let label = if tenant.id.trim().is_empty() {
            errors.push(validation(format!("tenants[{index}] has an empty id")));
            format!("#{index}")
        } else {
            if !tenant_ids.insert(tenant.id.as_str()) {
                errors.push(validation(format!("tenant id `{}` is used twice", tenant.id)));
            }
            tenant.id.clone()
        };
        validate_tenant(&label, tenant, &provider_names, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_tenant(
    label: &str,
    tenant: &TenantConfig,
    providers: &HashSet<&str>,
    errors: &mut Vec<ConfigError>,
) {
    let mut tenant_error = |message: String| {
        errors.push(ConfigError::Tenant {
            tenant: label.to_string(),
            message,
        })
    };

    if tenant.line.is_none() && tenant.messenger.is_none() {
        tenant_error("configure at least one of [tenants.line] or [tenants.messenger]".into());
    }
    if let Some(line) = &tenant.line
        && (line.channel_secret.trim().is_empty() || line.access_token.trim().is_empty())
    {
        tenant_error("line.channel_secret and line.access_token must not be empty".into());
    }
    if let Some(messenger) = &tenant.messenger
        && (messenger.app_secret.trim().is_empty()
            || messenger.page_access_token.trim().is_empty())
    {
        tenant_error(
            "messenger.app_secret and messenger.page_access_token must not be empty".into(),
        );
    }
    if tenant.default_message.trim().is_empty() {
        tenant_error("default_message must not be empty".into());
    }

    if let Some(order) = &tenant.provider_order {
        for name in order {
            if !providers.contains(name.as_str()) {
                tenant_error(format!("provider_order references unknown provider `{name}`"));
            }
        }
    }

    if let Some(hours) = &tenant.business_hours {
        for (key, value) in [("open", &hours.open), ("close", &hours.close)] {
            if NaiveTime::parse_from_str(value, "%H:%M").is_err() {
                tenant_error(format!("business_hours.{key} `{value}` is not HH:MM"));
            }
        }
        if hours.days.iter().any(|d| !(1..=7).contains(d)) {
            tenant_error("business_hours.days must be ISO weekdays 1..=7".into());
        }
        if hours.utc_offset_minutes.abs() > 14 * 60 {
            tenant_error(format!(
                "business_hours.utc_offset_minutes {} is out of range",
                hours.utc_offset_minutes
            ));
        }
    }
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}
