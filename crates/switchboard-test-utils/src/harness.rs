// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end orchestrator tests.
//!
//! `TestHarness` assembles an orchestrator over a temp SQLite database, one
//! tenant with mock LINE and Messenger channels, mock fallback providers,
//! and a scripted resolver. `send()` drives one customer message through
//! the full pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use switchboard_config::model::{SwitchboardConfig, TenantConfig};
use switchboard_core::records::{Conversation, Message};
use switchboard_core::{
    ChannelKind, EventKind, InboundEvent, PipelineResolver, ProviderAdapter, SwitchboardError,
};
use switchboard_orchestrator::tenant::{ChainMember, TenantContext, TenantDirectory};
use switchboard_orchestrator::{Orchestrator, TurnOutcome};
use switchboard_storage::Database;

use crate::mock_channel::MockChannel;
use crate::mock_provider::MockProvider;
use crate::scripted_resolver::ScriptedResolver;

/// Tenant id used by the harness.
pub const TENANT: &str = "shop";

/// Admin recipient pushed on escalation.
pub const ADMIN_RECIPIENT: &str = "Uadmin";

const BASE_CONFIG: &str = r#"
[[tenants]]
id = "shop"
name = "Test Shop"
default_message = "Sorry, we will get back to you soon."
auto_pin_ack = "Got it, an agent will follow up."
escalation_notice = "Customer needs a human"
cancel_ack = "Okay, I'm back to help!"
system_prompt = "You answer for Test Shop."
escalation_phrases = ["talk to staff", "ขอคุยกับแอดมิน"]
cancel_phrases = ["never mind", "ยกเลิก"]
admin_recipients = [{ channel = "line", user_id = "Uadmin" }]

[tenants.line]
channel_secret = "line-secret"
access_token = "line-token"

[tenants.messenger]
app_secret = "fb-secret"
page_access_token = "fb-token"
verify_token = "fb-verify"
"#;

type ConfigEdit = Box<dyn FnOnce(&mut SwitchboardConfig)>;
type TenantEdit = Box<dyn FnOnce(&mut TenantConfig)>;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config_edits: Vec<ConfigEdit>,
    tenant_edits: Vec<TenantEdit>,
    providers: Vec<MockProvider>,
    analysis: Option<MockProvider>,
    resolver: Option<Arc<dyn PipelineResolver>>,
    scripted: ScriptedResolver,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config_edits: Vec::new(),
            tenant_edits: Vec::new(),
            providers: Vec::new(),
            analysis: None,
            resolver: None,
            scripted: ScriptedResolver::new(),
        }
    }

    /// Adjust deployment settings.
    pub fn with_config(mut self, edit: impl FnOnce(&mut SwitchboardConfig) + 'static) -> Self {
        self.config_edits.push(Box::new(edit));
        self
    }

    /// Adjust the test tenant.
    pub fn with_tenant(mut self, edit: impl FnOnce(&mut TenantConfig) + 'static) -> Self {
        self.tenant_edits.push(Box::new(edit));
        self
    }

    /// Append a provider to the fallback chain.
    pub fn with_provider(mut self, provider: MockProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Provider used for learning, CRM, and follow-up analysis.
    pub fn with_analysis_provider(mut self, provider: MockProvider) -> Self {
        self.analysis = Some(provider);
        self
    }

    /// Replace the scripted resolver wired into the orchestrator.
    pub fn with_resolver(mut self, resolver: Arc<dyn PipelineResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use a pre-configured scripted resolver (for delays).
    pub fn with_scripted_resolver(mut self, resolver: ScriptedResolver) -> Self {
        self.scripted = resolver;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, SwitchboardError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(SwitchboardError::storage)?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy(), true).await?;

        let mut config = switchboard_config::load_and_validate_str(BASE_CONFIG).map_err(|errors| {
            SwitchboardError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        for edit in self.config_edits {
            edit(&mut config);
        }
        let mut tenant_config = config
            .tenant(TENANT)
            .cloned()
            .ok_or_else(|| SwitchboardError::TenantNotFound(TENANT.to_string()))?;
        for edit in self.tenant_edits {
            edit(&mut tenant_config);
        }

        let line = Arc::new(MockChannel::new(ChannelKind::Line));
        let messenger = Arc::new(MockChannel::new(ChannelKind::Messenger));
        let providers: Vec<Arc<MockProvider>> = self.providers.into_iter().map(Arc::new).collect();
        let analysis = self.analysis.map(Arc::new);

        let chain = providers
            .iter()
            .map(|p| ChainMember {
                provider: Arc::clone(p) as Arc<dyn ProviderAdapter>,
                timeout: Duration::from_secs(2),
                max_tokens: 256,
            })
            .collect();
        let mut context = TenantContext::new(tenant_config)?
            .with_channel(line.clone())
            .with_channel(messenger.clone())
            .with_chain(chain);
        if let Some(analysis) = &analysis {
            context = context.with_analysis_provider(Arc::clone(analysis) as Arc<dyn ProviderAdapter>);
        }
        let mut tenants = TenantDirectory::new();
        tenants.insert(context);
        let tenant = tenants.get(TENANT)?;
        let tenants = Arc::new(tenants);

        let scripted = Arc::new(self.scripted);
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::clone(&scripted) as Arc<dyn PipelineResolver>);
        let orchestrator = Orchestrator::new(&config, db.clone(), resolver);

        Ok(TestHarness {
            orchestrator,
            tenants,
            tenant,
            line,
            messenger,
            providers,
            analysis,
            resolver: scripted,
            db,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    pub orchestrator: Orchestrator,
    pub tenants: Arc<TenantDirectory>,
    /// The single test tenant.
    pub tenant: Arc<TenantContext>,
    pub line: Arc<MockChannel>,
    pub messenger: Arc<MockChannel>,
    /// Fallback chain, in priority order.
    pub providers: Vec<Arc<MockProvider>>,
    pub analysis: Option<Arc<MockProvider>>,
    /// The scripted resolver (unused when another resolver was supplied).
    pub resolver: Arc<ScriptedResolver>,
    pub db: Database,
    pub config: SwitchboardConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A LINE text event from `user` with delivery token `token`.
    pub fn text_event(&self, user: &str, token: &str, text: &str, at: DateTime<Utc>) -> InboundEvent {
        InboundEvent {
            tenant_id: TENANT.to_string(),
            channel: ChannelKind::Line,
            external_user_id: user.to_string(),
            kind: EventKind::Text,
            text: Some(text.to_string()),
            attachment_url: None,
            delivery_token: token.to_string(),
            reply_token: Some(format!("reply-{token}")),
            received_at: at,
        }
    }

    /// Drives one LINE text message through the pipeline at `at`.
    pub async fn send_at(
        &self,
        user: &str,
        token: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<TurnOutcome, SwitchboardError> {
        let event = self.text_event(user, token, text, at);
        self.orchestrator.handle_event_at(&self.tenant, event, at).await
    }

    /// Same as [`send_at`](Self::send_at) with a fresh token at the current time.
    pub async fn send(&self, user: &str, text: &str) -> Result<TurnOutcome, SwitchboardError> {
        let token = uuid::Uuid::new_v4().to_string();
        self.send_at(user, &token, text, Utc::now()).await
    }

    pub async fn conversation(&self, user: &str) -> Result<Conversation, SwitchboardError> {
        self.orchestrator.store().conversation(TENANT, user).await
    }

    /// The stored log, oldest first.
    pub async fn messages(&self, user: &str) -> Result<Vec<Message>, SwitchboardError> {
        self.orchestrator.store().recent_messages(TENANT, user, 1000).await
    }

    /// Waits for background side effects to finish.
    pub async fn settle(&self) {
        self.orchestrator.background().settle().await;
    }
}
