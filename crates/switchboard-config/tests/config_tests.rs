// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the configuration system.

use switchboard_config::diagnostic::ConfigError;
use switchboard_config::model::{OffHoursPolicy, ProviderKind};
use switchboard_config::{load_and_validate_str, load_config_from_str};
use switchboard_core::ChannelKind;

const FULL: &str = r#"
[service]
log_level = "debug"

[gateway]
port = 8080
admin_token = "admin-secret"

[guard]
dedup_ttl_secs = 90
rate_limit = 10

[fallback]
analysis_provider = "backup"

[[fallback.providers]]
name = "primary"
kind = "anthropic"
model = "claude-haiku-4-5"
timeout_ms = 4000

[[fallback.providers]]
name = "backup"
kind = "openai"
model = "gpt-4o-mini"
base_url = "https://api.example.com/v1"

[[tenants]]
id = "coffee"
name = "Coffee Corner"
cancel_phrases = ["cancel", "never mind"]
escalation_phrases = ["talk to staff"]
provider_order = ["backup", "primary"]
admin_recipients = [{ channel = "line", user_id = "Uadmin" }]

[tenants.business_hours]
utc_offset_minutes = 420
open = "08:30"
close = "20:00"
days = [1, 2, 3, 4, 5, 6]
off_hours = "reply_with_note"

[tenants.line]
channel_secret = "line-secret"
access_token = "line-token"

[tenants.messenger]
app_secret = "fb-secret"
page_access_token = "fb-token"
verify_token = "verify-me"
"#;

#[test]
fn full_config_deserializes_and_validates() {
    let config = load_and_validate_str(FULL).expect("valid config");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.guard.dedup_ttl_secs, 90);
    assert_eq!(config.guard.rate_limit, 10);
    assert_eq!(config.guard.rate_window_secs, 60);
    assert_eq!(config.fallback.providers.len(), 2);
    assert_eq!(config.fallback.providers[1].kind, ProviderKind::Openai);
    assert_eq!(config.fallback.providers[1].timeout_ms, 8000);

    let tenant = config.tenant("coffee").expect("tenant");
    assert!(tenant.bot_enabled);
    assert_eq!(tenant.cancel_phrases.len(), 2);
    assert_eq!(tenant.admin_recipients[0].channel, ChannelKind::Line);
    let hours = tenant.business_hours.as_ref().unwrap();
    assert_eq!(hours.off_hours, OffHoursPolicy::ReplyWithNote);
    assert_eq!(hours.days.len(), 6);
    assert_eq!(tenant.messenger.as_ref().unwrap().verify_token, "verify-me");
}

#[test]
fn defaults_match_documented_values() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.guard.rate_limit, 20);
    assert_eq!(config.guard.rate_window_secs, 60);
    assert!(config.guard.dedup_ttl_secs >= 60);
    assert_eq!(config.conversation.message_cap, 500);
    assert_eq!(config.conversation.returning_gap_secs, 7200);
    assert_eq!(config.learning.confidence_threshold, 0.6);
    assert_eq!(config.learning.ttl_days, 180);
    assert!(config.tenants.is_empty());
}

#[test]
fn unknown_key_gets_suggestion() {
    let errors = load_and_validate_str("[guard]\nrate_limt = 5\n").unwrap_err();
    match &errors[0] {
        ConfigError::UnknownKey { key, suggestion, .. } => {
            assert_eq!(key, "rate_limt");
            assert_eq!(suggestion.as_deref(), Some("rate_limit"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_key_in_second_tenant_points_at_its_line() {
    let toml = r#"
[[tenants]]
id = "bakery"

[tenants.line]
channel_secret = "a"
access_token = "b"

[[tenants]]
id = "florist"

[tenants.line]
chanel_secret = "c"
access_token = "d"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(key, "chanel_secret");
            assert_eq!(suggestion.as_deref(), Some("channel_secret"));
            let span = span.as_ref().expect("span for the offending key");
            assert_eq!(&toml[span.offset()..span.offset() + span.len()], "chanel_secret");
            assert!(span.offset() > toml.find("florist").unwrap());
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn tenant_missing_credentials_is_a_validation_error() {
    let toml = r#"
[[tenants]]
id = "bare"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Tenant { tenant, .. } if tenant == "bare"))
    );
}
