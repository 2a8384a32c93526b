// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the tenant directory from configuration: channel adapters for
//! every configured channel and the per-tenant fallback chain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use switchboard_config::SwitchboardConfig;
use switchboard_config::model::{ProviderConfig, ProviderKind};
use switchboard_core::{ProviderAdapter, SwitchboardError};
use switchboard_orchestrator::tenant::{ChainMember, TenantContext, TenantDirectory};
use tracing::{info, warn};

#[cfg(feature = "line")]
use switchboard_line::LineChannel;

#[cfg(feature = "messenger")]
use switchboard_messenger::MessengerChannel;

/// A provider instance plus the limits it was declared with.
struct Declared {
    adapter: Arc<dyn ProviderAdapter>,
    timeout: Duration,
    max_tokens: u32,
}

fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, SwitchboardError> {
    match config.kind {
        #[cfg(feature = "anthropic")]
        ProviderKind::Anthropic => Ok(Arc::new(switchboard_anthropic::AnthropicProvider::new(config)?)),
        #[cfg(feature = "openai")]
        ProviderKind::Openai => Ok(Arc::new(switchboard_openai::OpenAiProvider::new(config)?)),
        #[allow(unreachable_patterns)]
        kind => Err(SwitchboardError::Config(format!(
            "provider `{}` uses kind {kind:?}, which this build does not include",
            config.name
        ))),
    }
}

fn build_providers(config: &SwitchboardConfig) -> Result<HashMap<String, Declared>, SwitchboardError> {
    let mut providers = HashMap::new();
    for provider in &config.fallback.providers {
        providers.insert(
            provider.name.clone(),
            Declared {
                adapter: build_provider(provider)?,
                timeout: Duration::from_millis(provider.timeout_ms),
                max_tokens: provider.max_tokens,
            },
        );
    }
    Ok(providers)
}

/// Resolves every configured tenant into a [`TenantContext`].
///
/// Fails on the first adapter that cannot be constructed; a deployment
/// with a broken credential should not start half-wired.
pub fn build_tenants(config: &SwitchboardConfig) -> Result<TenantDirectory, SwitchboardError> {
    let providers = build_providers(config)?;
    let declared_order: Vec<String> = config.fallback.providers.iter().map(|p| p.name.clone()).collect();
    let analysis_name = config
        .fallback
        .analysis_provider
        .clone()
        .or_else(|| declared_order.first().cloned());
    let send_timeout = Duration::from_millis(config.conversation.send_timeout_ms);

    let mut directory = TenantDirectory::new();
    for tenant in &config.tenants {
        let order = tenant.provider_order.as_ref().unwrap_or(&declared_order);
        let chain = order
            .iter()
            .map(|name| {
                providers
                    .get(name)
                    .map(|p| ChainMember {
                        provider: Arc::clone(&p.adapter),
                        timeout: p.timeout,
                        max_tokens: p.max_tokens,
                    })
                    .ok_or_else(|| {
                        SwitchboardError::Config(format!(
                            "tenant `{}` references unknown provider `{name}`",
                            tenant.id
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut context = TenantContext::new(tenant.clone())?.with_chain(chain);

        if let Some(line) = &tenant.line {
            #[cfg(feature = "line")]
            {
                context = context.with_channel(Arc::new(LineChannel::new(line, send_timeout)?));
            }
            #[cfg(not(feature = "line"))]
            {
                let _ = line;
                warn!(tenant_id = %tenant.id, "LINE configured but not compiled in, skipping");
            }
        }
        if let Some(messenger) = &tenant.messenger {
            #[cfg(feature = "messenger")]
            {
                context =
                    context.with_channel(Arc::new(MessengerChannel::new(messenger, send_timeout)?));
            }
            #[cfg(not(feature = "messenger"))]
            {
                let _ = messenger;
                warn!(tenant_id = %tenant.id, "Messenger configured but not compiled in, skipping");
            }
        }

        match analysis_name.as_ref().and_then(|name| providers.get(name)) {
            Some(p) => context = context.with_analysis_provider(Arc::clone(&p.adapter)),
            None => warn!(
                tenant_id = %tenant.id,
                "no analysis provider, learning and CRM extraction are disabled"
            ),
        }

        info!(
            tenant_id = %tenant.id,
            chain = %order.join(","),
            line = tenant.line.is_some(),
            messenger = tenant.messenger.is_some(),
            "tenant wired"
        );
        directory.insert(context);
    }
    Ok(directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::{ChannelKind, PluginAdapter};

    const CONFIG: &str = r#"
[fallback]
analysis_provider = "cheap"

[[fallback.providers]]
name = "main"
kind = "anthropic"
model = "claude-sonnet-4-5"
api_key = "sk-ant-test"

[[fallback.providers]]
name = "cheap"
kind = "openai"
model = "gpt-4o-mini"
api_key = "sk-test"
timeout_ms = 2000

[[tenants]]
id = "bakery"
provider_order = ["cheap"]

[tenants.line]
channel_secret = "secret"
access_token = "token"

[[tenants]]
id = "florist"

[tenants.messenger]
app_secret = "app"
page_access_token = "page"
verify_token = "verify"
"#;

    fn config() -> SwitchboardConfig {
        switchboard_config::load_and_validate_str(CONFIG).unwrap()
    }

    #[test]
    fn provider_order_restricts_the_chain() {
        let tenants = build_tenants(&config()).unwrap();
        let bakery = tenants.get("bakery").unwrap();
        assert_eq!(bakery.chain().len(), 1);
        assert_eq!(bakery.chain()[0].provider.name(), "cheap");
        assert_eq!(bakery.chain()[0].timeout, Duration::from_secs(2));

        let florist = tenants.get("florist").unwrap();
        let names: Vec<&str> = florist.chain().iter().map(|m| m.provider.name()).collect();
        assert_eq!(names, vec!["main", "cheap"]);
    }

    #[test]
    fn only_configured_channels_are_wired() {
        let tenants = build_tenants(&config()).unwrap();
        let bakery = tenants.get("bakery").unwrap();
        assert!(bakery.channel(ChannelKind::Line).is_ok());
        assert!(bakery.channel(ChannelKind::Messenger).is_err());
        let florist = tenants.get("florist").unwrap();
        assert!(florist.channel(ChannelKind::Messenger).is_ok());
    }

    #[test]
    fn analysis_provider_is_selected_by_name() {
        let tenants = build_tenants(&config()).unwrap();
        let analysis = tenants.get("florist").unwrap().analysis_provider().cloned().unwrap();
        assert_eq!(analysis.name(), "cheap");
    }

    #[test]
    fn tenants_without_providers_have_no_analysis() {
        let config = switchboard_config::load_and_validate_str(
            r#"
[[tenants]]
id = "solo"
[tenants.line]
channel_secret = "s"
access_token = "t"
"#,
        )
        .unwrap();
        let tenants = build_tenants(&config).unwrap();
        let solo = tenants.get("solo").unwrap();
        assert!(solo.chain().is_empty());
        assert!(solo.analysis_provider().is_none());
    }
}
