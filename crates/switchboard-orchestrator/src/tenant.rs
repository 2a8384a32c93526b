// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant context resolved once at startup and passed by reference
//! through every request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use switchboard_config::model::TenantConfig;
use switchboard_core::{ChannelAdapter, ChannelKind, ProviderAdapter, SwitchboardError};

use crate::hours::BusinessHours;

/// A fallback-chain member with its own attempt timeout.
#[derive(Clone)]
pub struct ChainMember {
    pub provider: Arc<dyn ProviderAdapter>,
    pub timeout: Duration,
    pub max_tokens: u32,
}

/// Configuration and adapters of one tenant.
pub struct TenantContext {
    pub config: TenantConfig,
    pub hours: Option<BusinessHours>,
    channels: HashMap<ChannelKind, Arc<dyn ChannelAdapter>>,
    chain: Vec<ChainMember>,
    analysis: Option<Arc<dyn ProviderAdapter>>,
}

impl TenantContext {
    pub fn new(config: TenantConfig) -> Result<Self, SwitchboardError> {
        let hours = config
            .business_hours
            .as_ref()
            .map(BusinessHours::from_config)
            .transpose()?;
        Ok(Self {
            config,
            hours,
            channels: HashMap::new(),
            chain: Vec::new(),
            analysis: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn with_channel(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.channels.insert(adapter.kind(), adapter);
        self
    }

    /// Sets the fallback chain, already in this tenant's priority order.
    pub fn with_chain(mut self, chain: Vec<ChainMember>) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_analysis_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.analysis = Some(provider);
        self
    }

    /// The adapter for `kind`, or a configuration error naming the tenant.
    pub fn channel(&self, kind: ChannelKind) -> Result<&Arc<dyn ChannelAdapter>, SwitchboardError> {
        self.channels.get(&kind).ok_or_else(|| {
            SwitchboardError::Config(format!(
                "tenant `{}` has no {kind} channel configured",
                self.config.id
            ))
        })
    }

    pub fn chain(&self) -> &[ChainMember] {
        &self.chain
    }

    pub fn analysis_provider(&self) -> Option<&Arc<dyn ProviderAdapter>> {
        self.analysis.as_ref()
    }
}

/// All tenants of the deployment, keyed by id.
#[derive(Default, Clone)]
pub struct TenantDirectory {
    tenants: HashMap<String, Arc<TenantContext>>,
}

impl TenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, context: TenantContext) {
        self.tenants.insert(context.id().to_string(), Arc::new(context));
    }

    pub fn get(&self, tenant_id: &str) -> Result<Arc<TenantContext>, SwitchboardError> {
        self.tenants
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| SwitchboardError::TenantNotFound(tenant_id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TenantContext>> {
        self.tenants.values()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}
