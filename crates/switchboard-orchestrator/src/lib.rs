// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation orchestration for Switchboard.
//!
//! The [`Orchestrator`] takes one channel-normalized event and:
//! - Suppresses redelivered events and rate-limits chatty users
//! - Loads or creates the conversation and stores the customer message
//! - Applies the business-hours, tenant and conversation gates
//! - Calls the pipeline resolver, then the AI fallback chain when it defers
//! - Drives escalation, cancel and auto-pin transitions
//! - Sends the reply and records it only after the channel accepted it
//! - Dispatches learning, CRM, Q&A and miss tracking in the background

pub mod admin;
pub mod background;
pub mod crm;
pub mod fallback;
pub mod followup;
pub mod hours;
pub mod resolver;
pub mod shutdown;
pub mod tenant;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use switchboard_config::model::{OffHoursPolicy, SwitchboardConfig};
use switchboard_core::records::{
    AdminAction, AttachmentKind, Conversation, LayerProvenance, MessageRole, NewActivity,
    NewMessage, SYSTEM_USER,
};
use switchboard_core::state::gap_reason;
use switchboard_core::{
    BotState, ChannelAdapter, ControlEvent, EventKind, InboundEvent, MessageId, OutboundMessage,
    PipelineResolver, ProviderMessage, ResolverInput, ResolverOutput, ResolverTrace,
    SwitchboardError, UserProfile,
};
use switchboard_cost::UsageLedger;
use switchboard_learning::{CorrectionAnalyzer, LearnedStore, MissTracker, QaLog};
use switchboard_storage::queries::guard;
use switchboard_storage::{ConversationStore, Database, Idempotency};
use tracing::{debug, info, warn};

use crate::background::BackgroundTasks;
use crate::crm::{CrmExtractor, crm_trigger};
use crate::fallback::{FallbackChain, FallbackRequest, FallbackSource};
use crate::followup::{FollowupAnalyzer, FollowupReport};
use crate::resolver::matches_any;
use crate::tenant::{TenantContext, TenantDirectory};

pub use crate::resolver::KeywordResolver;

/// Token budget for analysis calls (learning, CRM extraction).
const ANALYSIS_MAX_TOKENS: u32 = 512;

/// Messages handed to the CRM extractor.
const CRM_HISTORY: u32 = 20;

/// Layer name recorded when the resolver errored or timed out.
const RESOLVER_UNAVAILABLE: &str = "resolver_unavailable";

/// Tunables of the reply path, resolved once from configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dedup_ttl: Duration,
    pub rate_limit: u32,
    pub rate_window: Duration,
    /// A customer silent at least this long counts as returning.
    pub returning_gap: chrono::Duration,
    pub history_turns: u32,
    /// Resolver layers above this defer to the fallback chain.
    pub deferred_threshold: i64,
    pub resolver_timeout: Duration,
    pub send_timeout: Duration,
    pub crm_enabled: bool,
    pub crm_threshold: u32,
}

impl Settings {
    pub fn from_config(config: &SwitchboardConfig) -> Self {
        let conv = &config.conversation;
        Self {
            dedup_ttl: Duration::from_secs(config.guard.dedup_ttl_secs),
            rate_limit: config.guard.rate_limit,
            rate_window: Duration::from_secs(config.guard.rate_window_secs),
            returning_gap: chrono::Duration::seconds(conv.returning_gap_secs as i64),
            history_turns: conv.history_turns,
            deferred_threshold: conv.deferred_layer_threshold,
            resolver_timeout: Duration::from_millis(conv.resolver_timeout_ms),
            send_timeout: Duration::from_millis(conv.send_timeout_ms),
            crm_enabled: config.crm.enabled,
            crm_threshold: config.crm.message_threshold,
        }
    }
}

/// Why no reply was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    OffHours,
    TenantBotOff,
    /// The conversation is escalated, auto-pinned, or in manual handling.
    BotOff,
}

/// What produced a delivered reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySource {
    Resolver { layer: i64 },
    Provider(String),
    /// Every fallback provider failed.
    DefaultMessage,
}

/// Result of handling one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Redelivery of an event already handled.
    Duplicate,
    RateLimited,
    /// Follow event: the conversation exists now, nothing else happened.
    Registered,
    /// The message was stored but carried nothing to answer.
    Stored,
    Suppressed(SuppressReason),
    Replied(ReplySource),
    Escalated { notified: usize, replied: bool },
    Cancelled,
    AutoPinned { acknowledged: bool },
    /// The channel refused the reply; no bot message was stored.
    SendFailed,
}

/// Periodic cleanup counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub guard_rows: usize,
    pub learned_entries: usize,
}

/// The per-message decision pipeline plus the stores it coordinates.
#[derive(Clone)]
pub struct Orchestrator {
    settings: Settings,
    store: ConversationStore,
    learned: LearnedStore,
    misses: MissTracker,
    qa: QaLog,
    ledger: UsageLedger,
    analyzer: CorrectionAnalyzer,
    crm: CrmExtractor,
    followups: FollowupAnalyzer,
    fallback: FallbackChain,
    resolver: Arc<dyn PipelineResolver>,
    background: BackgroundTasks,
}

impl Orchestrator {
    /// Wires every store onto `db`.
    pub fn new(config: &SwitchboardConfig, db: Database, resolver: Arc<dyn PipelineResolver>) -> Self {
        let settings = Settings::from_config(config);
        let store = ConversationStore::new(db.clone(), config.conversation.message_cap);
        let learned = LearnedStore::new(db.clone(), config.learning.ttl_days);
        let ledger = UsageLedger::new(db.clone(), config.usage.recent_call_cap);
        let analyzer = CorrectionAnalyzer::new(
            learned.clone(),
            ledger.clone(),
            config.learning.confidence_threshold,
            ANALYSIS_MAX_TOKENS,
        );
        let crm = CrmExtractor::new(store.clone(), ledger.clone(), CRM_HISTORY, ANALYSIS_MAX_TOKENS);
        let followups = FollowupAnalyzer::new(
            store.clone(),
            ledger.clone(),
            config.followup.idle_minutes,
            config.followup.lookback_hours,
            settings.history_turns,
        );
        info!(
            dedup_ttl_secs = settings.dedup_ttl.as_secs(),
            rate_limit = settings.rate_limit,
            deferred_threshold = settings.deferred_threshold,
            "orchestrator initialized"
        );
        Self {
            settings,
            misses: MissTracker::new(db.clone(), config.learning.ttl_days, config.learning.miss_examples),
            qa: QaLog::new(db, config.learning.qa_log_cap, config.learning.ttl_days),
            fallback: FallbackChain::new(ledger.clone()),
            store,
            learned,
            ledger,
            analyzer,
            crm,
            followups,
            resolver,
            background: BackgroundTasks::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn learned(&self) -> &LearnedStore {
        &self.learned
    }

    pub fn misses(&self) -> &MissTracker {
        &self.misses
    }

    pub fn qa(&self) -> &QaLog {
        &self.qa
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    pub async fn handle_event(
        &self,
        tenant: &TenantContext,
        event: InboundEvent,
    ) -> Result<TurnOutcome, SwitchboardError> {
        self.handle_event_at(tenant, event, Utc::now()).await
    }

    /// Runs one event through the pipeline as of `now`.
    ///
    /// Gates short-circuit in order: idempotency, rate limit, business
    /// hours, tenant switch, conversation switch. The customer message is
    /// stored before any gate that can still reply, so it survives a later
    /// send failure.
    pub async fn handle_event_at(
        &self,
        tenant: &TenantContext,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome, SwitchboardError> {
        let tenant_id = tenant.id();
        if event.tenant_id != tenant_id {
            return Err(SwitchboardError::InvalidInput(format!(
                "event for tenant `{}` routed to `{tenant_id}`",
                event.tenant_id
            )));
        }
        let user_id = event.external_user_id.as_str();

        // Duplicate suppression.
        let key = event.idempotency_key();
        if guard::claim_event(self.store.database(), &key, self.settings.dedup_ttl, now).await?
            == Idempotency::Duplicate
        {
            debug!(tenant_id, user_id, key = key.as_str(), "duplicate delivery suppressed");
            return Ok(TurnOutcome::Duplicate);
        }

        let decision = guard::hit_rate_limit(
            self.store.database(),
            tenant_id,
            user_id,
            self.settings.rate_limit,
            self.settings.rate_window,
            now,
        )
        .await?;
        if decision.limited {
            warn!(tenant_id, user_id, count = decision.count, "rate limit exceeded");
            return Ok(TurnOutcome::RateLimited);
        }

        let channel = tenant.channel(event.channel)?;

        // Load or create the conversation; history is read before the new
        // message lands so the resolver sees it only as the question.
        let conversation = match self.store.find_conversation(tenant_id, user_id).await? {
            Some(conversation) => conversation,
            None => {
                let profile = self.fetch_profile(channel.as_ref(), user_id).await;
                self.store
                    .get_or_create(tenant_id, user_id, event.channel, &profile, now)
                    .await?
            }
        };
        if event.kind == EventKind::Follow {
            info!(tenant_id, user_id, channel = %event.channel, "new follower registered");
            return Ok(TurnOutcome::Registered);
        }
        let history = self.history(tenant_id, user_id).await?;

        let mut customer = NewMessage::text(MessageRole::Customer, event.text.clone().unwrap_or_default(), now);
        if let Some(url) = &event.attachment_url {
            customer = customer.with_attachment(AttachmentKind::Image, url);
        }
        if customer.text.is_empty() && customer.attachment_url.is_none() {
            debug!(tenant_id, user_id, kind = %event.kind, "event carried no content");
            return Ok(TurnOutcome::Stored);
        }
        self.store.add_message(tenant_id, user_id, &customer).await?;

        // Business hours.
        let mut off_hours_note = None;
        if let Some(hours) = &tenant.hours
            && !hours.is_open(now)
        {
            match hours.policy {
                OffHoursPolicy::Suppress => {
                    debug!(tenant_id, user_id, "outside business hours, reply suppressed");
                    return Ok(TurnOutcome::Suppressed(SuppressReason::OffHours));
                }
                OffHoursPolicy::ReplyWithNote => off_hours_note = Some(hours.note.as_str()),
            }
        }

        if !self
            .store
            .tenant_bot_enabled(tenant_id, tenant.config.bot_enabled)
            .await?
        {
            debug!(tenant_id, user_id, "tenant bot switched off");
            return Ok(TurnOutcome::Suppressed(SuppressReason::TenantBotOff));
        }

        let Some(question) = event.question() else {
            return Ok(TurnOutcome::Stored);
        };

        if !conversation.control.bot_enabled() {
            let cancellable = matches!(
                conversation.control.state,
                BotState::Escalated | BotState::AutoPinned
            );
            if cancellable
                && (matches_any(question, &tenant.config.cancel_phrases)
                    || self.resolve(tenant, question, &history, now).await.is_cancel_escalation)
            {
                return self.cancel_escalation(tenant, channel.as_ref(), &event, now).await;
            }
            debug!(
                tenant_id,
                user_id,
                state = %conversation.control.state,
                "conversation bot disabled, reply suppressed"
            );
            return Ok(TurnOutcome::Suppressed(SuppressReason::BotOff));
        }

        let output = self.resolve(tenant, question, &history, now).await;
        if !output.learned_hits.is_empty() {
            let learned = self.learned.clone();
            let (tenant_key, hits) = (tenant_id.to_string(), output.learned_hits.clone());
            self.background.spawn("learned_hits", async move {
                learned.record_hits(&tenant_key, &hits).await.map(|_| ())
            });
        }

        if output.is_admin_escalation {
            return self
                .escalate(tenant, channel.as_ref(), &event, &conversation, question, &output, now)
                .await;
        }

        let deferred =
            output.deferred(self.settings.deferred_threshold) || output.content.trim().is_empty();
        if deferred {
            let misses = self.misses.clone();
            let (tenant_key, question_text) = (tenant_id.to_string(), question.to_string());
            self.background.spawn("miss_tracker", async move {
                misses.record(&tenant_key, &question_text, now).await
            });

            if let Some(last_seen) = conversation.last_message_at
                && now - last_seen >= self.settings.returning_gap
            {
                return self
                    .auto_pin(tenant, channel.as_ref(), &event, gap_reason(now - last_seen), now)
                    .await;
            }
        }

        let (text, provenance, source) = if deferred {
            let reply = self
                .fallback
                .run(
                    tenant.chain(),
                    &FallbackRequest {
                        tenant_id,
                        message: question,
                        history: &history,
                        system_prompt: &tenant.config.system_prompt,
                        off_hours_note,
                    },
                    &tenant.config.default_message,
                    now,
                )
                .await;
            let (layer_name, source) = match reply.source {
                FallbackSource::Provider(name) => (format!("ai_fallback:{name}"), ReplySource::Provider(name)),
                FallbackSource::Default => ("default_message".to_string(), ReplySource::DefaultMessage),
            };
            let provenance = LayerProvenance {
                layer: output.trace.final_layer,
                layer_name,
            };
            (reply.text, provenance, source)
        } else {
            let provenance = LayerProvenance {
                layer: output.trace.final_layer,
                layer_name: output.trace.final_layer_name.clone(),
            };
            let source = ReplySource::Resolver {
                layer: output.trace.final_layer,
            };
            (output.content.clone(), provenance, source)
        };

        if let Err(e) = self.deliver(channel.as_ref(), &event, &text).await {
            warn!(tenant_id, user_id, error = %e, "reply not delivered, nothing recorded");
            return Ok(TurnOutcome::SendFailed);
        }
        self.store
            .add_message(
                tenant_id,
                user_id,
                &NewMessage::text(MessageRole::Bot, &text, now).with_provenance(provenance.clone()),
            )
            .await?;

        let qa = self.qa.clone();
        let (tenant_key, user_key, question_text, answer) =
            (tenant_id.to_string(), user_id.to_string(), question.to_string(), text.clone());
        self.background.spawn("qa_log", async move {
            qa.append(
                &tenant_key,
                &user_key,
                &question_text,
                &answer,
                provenance.layer,
                &provenance.layer_name,
                now,
            )
            .await
            .map(|_| ())
        });

        self.maybe_extract_crm(tenant, &conversation, question, now);

        info!(tenant_id, user_id, source = ?source, "reply delivered");
        Ok(TurnOutcome::Replied(source))
    }

    /// Runs the follow-up job for every tenant.
    pub async fn run_followups(
        &self,
        tenants: &TenantDirectory,
        now: DateTime<Utc>,
    ) -> Result<FollowupReport, SwitchboardError> {
        let mut total = FollowupReport::default();
        for tenant in tenants.iter() {
            let report = self.followups.run(tenant, now).await?;
            total.analyzed += report.analyzed;
            total.flagged += report.flagged;
        }
        Ok(total)
    }

    /// Deletes expired guard rows and learned entries.
    pub async fn purge(&self, now: DateTime<Utc>) -> Result<PurgeReport, SwitchboardError> {
        let report = PurgeReport {
            guard_rows: guard::purge_expired(self.store.database(), now).await?,
            learned_entries: self.learned.purge_expired(now).await?,
        };
        info!(
            guard_rows = report.guard_rows,
            learned_entries = report.learned_entries,
            "expired records purged"
        );
        Ok(report)
    }

    /// Profile for a new conversation; a failed lookup yields an empty one.
    async fn fetch_profile(&self, channel: &dyn ChannelAdapter, user_id: &str) -> UserProfile {
        match tokio::time::timeout(self.settings.send_timeout, channel.fetch_profile(user_id)).await {
            Ok(Ok(profile)) => profile,
            Ok(Err(e)) => {
                warn!(user_id, error = %e, "profile fetch failed, continuing without it");
                UserProfile::default()
            }
            Err(_) => {
                warn!(user_id, "profile fetch timed out, continuing without it");
                UserProfile::default()
            }
        }
    }

    /// Recent turns in provider shape, oldest first.
    async fn history(&self, tenant_id: &str, user_id: &str) -> Result<Vec<ProviderMessage>, SwitchboardError> {
        let messages = self
            .store
            .recent_messages(tenant_id, user_id, self.settings.history_turns)
            .await?;
        Ok(messages
            .into_iter()
            .filter(|m| !m.text.is_empty())
            .filter_map(|m| match m.role {
                MessageRole::Customer => Some(ProviderMessage::user(m.text)),
                MessageRole::Bot | MessageRole::Admin => Some(ProviderMessage::assistant(m.text)),
                MessageRole::System => None,
            })
            .collect())
    }

    /// Calls the resolver under its timeout. An error or timeout is treated
    /// as a deferral so the customer still gets a fallback answer.
    async fn resolve(
        &self,
        tenant: &TenantContext,
        question: &str,
        history: &[ProviderMessage],
        now: DateTime<Utc>,
    ) -> ResolverOutput {
        let learned = match self.learned.enabled_data(tenant.id(), now).await {
            Ok(data) => data,
            Err(e) => {
                warn!(tenant_id = tenant.id(), error = %e, "failed to load learned entries");
                Default::default()
            }
        };
        let input = ResolverInput {
            tenant_id: tenant.id(),
            message: question,
            history,
            escalation_phrases: &tenant.config.escalation_phrases,
            cancel_phrases: &tenant.config.cancel_phrases,
            learned: &learned,
        };
        let failure = match tokio::time::timeout(self.settings.resolver_timeout, self.resolver.resolve(input)).await {
            Ok(Ok(output)) => {
                debug!(
                    tenant_id = tenant.id(),
                    layer = output.trace.final_layer,
                    layer_name = output.trace.final_layer_name.as_str(),
                    "resolver finished"
                );
                return output;
            }
            Ok(Err(e)) => e,
            Err(_) => SwitchboardError::Timeout {
                duration: self.settings.resolver_timeout,
            },
        };
        warn!(tenant_id = tenant.id(), error = %failure, "resolver unavailable, deferring");
        ResolverOutput {
            content: String::new(),
            trace: ResolverTrace {
                final_layer: self.settings.deferred_threshold + 1,
                final_layer_name: RESOLVER_UNAVAILABLE.to_string(),
                steps: Vec::new(),
            },
            is_admin_escalation: false,
            is_cancel_escalation: false,
            carousel_product_ids: Vec::new(),
            learned_hits: Vec::new(),
        }
    }

    /// Sends a text reply to the event's sender under the send timeout.
    async fn deliver(
        &self,
        channel: &dyn ChannelAdapter,
        event: &InboundEvent,
        text: &str,
    ) -> Result<MessageId, SwitchboardError> {
        let msg = OutboundMessage::reply(&event.external_user_id, text, event.reply_token.clone());
        self.send_within_budget(channel, msg).await
    }

    async fn send_within_budget(
        &self,
        channel: &dyn ChannelAdapter,
        msg: OutboundMessage,
    ) -> Result<MessageId, SwitchboardError> {
        match tokio::time::timeout(self.settings.send_timeout, channel.send(msg)).await {
            Ok(result) => result,
            Err(_) => Err(SwitchboardError::Timeout {
                duration: self.settings.send_timeout,
            }),
        }
    }

    /// Delivers `text`, then stores it as a bot message. Returns whether it
    /// went out.
    async fn reply_and_record(
        &self,
        channel: &dyn ChannelAdapter,
        event: &InboundEvent,
        text: &str,
        provenance: Option<LayerProvenance>,
        now: DateTime<Utc>,
    ) -> Result<bool, SwitchboardError> {
        if text.trim().is_empty() {
            return Ok(false);
        }
        if let Err(e) = self.deliver(channel, event, text).await {
            warn!(
                tenant_id = %event.tenant_id,
                user_id = %event.external_user_id,
                error = %e,
                "reply not delivered, nothing recorded"
            );
            return Ok(false);
        }
        let mut message = NewMessage::text(MessageRole::Bot, text, now);
        message.provenance = provenance;
        self.store
            .add_message(&event.tenant_id, &event.external_user_id, &message)
            .await?;
        Ok(true)
    }

    async fn record_system(
        &self,
        tenant_id: &str,
        user_id: &str,
        action: AdminAction,
        note: String,
        now: DateTime<Utc>,
    ) -> Result<(), SwitchboardError> {
        self.store
            .add_message(tenant_id, user_id, &NewMessage::text(MessageRole::System, &note, now))
            .await?;
        self.store
            .log_activity(
                tenant_id,
                &NewActivity {
                    username: SYSTEM_USER.to_string(),
                    action,
                    target_user: Some(user_id.to_string()),
                    detail: Some(note),
                    created_at: now,
                },
            )
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn escalate(
        &self,
        tenant: &TenantContext,
        channel: &dyn ChannelAdapter,
        event: &InboundEvent,
        conversation: &Conversation,
        question: &str,
        output: &ResolverOutput,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome, SwitchboardError> {
        let (tenant_id, user_id) = (tenant.id(), event.external_user_id.as_str());
        let reason = format!("customer asked for staff: {}", question.chars().take(80).collect::<String>());
        match self
            .store
            .apply_control(tenant_id, user_id, &ControlEvent::Escalate { reason: reason.clone() }, now)
            .await
        {
            Ok(_) => {}
            Err(SwitchboardError::InvalidTransition { from, .. }) => {
                debug!(tenant_id, user_id, from = %from, "conversation left normal state concurrently");
                return Ok(TurnOutcome::Suppressed(SuppressReason::BotOff));
            }
            Err(e) => return Err(e),
        }

        let (notified, attempted) = self.notify_admins(tenant, conversation, question).await;
        self.record_system(
            tenant_id,
            user_id,
            AdminAction::EscalationNotified,
            format!("escalated ({reason}); admins notified {notified}/{attempted}"),
            now,
        )
        .await?;

        let provenance = LayerProvenance {
            layer: output.trace.final_layer,
            layer_name: output.trace.final_layer_name.clone(),
        };
        let replied = self
            .reply_and_record(channel, event, &output.content, Some(provenance), now)
            .await?;
        info!(tenant_id, user_id, notified, attempted, replied, "conversation escalated");
        Ok(TurnOutcome::Escalated { notified, replied })
    }

    /// Pushes the escalation notice to every admin recipient. Best-effort;
    /// returns (delivered, attempted).
    async fn notify_admins(
        &self,
        tenant: &TenantContext,
        conversation: &Conversation,
        question: &str,
    ) -> (usize, usize) {
        let who = conversation
            .display_name
            .as_deref()
            .unwrap_or(conversation.user_id.as_str());
        let notice = format!("{}\n{who}: {question}", tenant.config.escalation_notice);
        let recipients = &tenant.config.admin_recipients;
        let mut delivered = 0;
        for recipient in recipients {
            let sent = match tenant.channel(recipient.channel) {
                Ok(channel) => {
                    self.send_within_budget(channel.as_ref(), OutboundMessage::push(&recipient.user_id, &notice))
                        .await
                }
                Err(e) => Err(e),
            };
            match sent {
                Ok(_) => delivered += 1,
                Err(e) => warn!(
                    tenant_id = tenant.id(),
                    recipient = recipient.user_id.as_str(),
                    error = %e,
                    "escalation notice not delivered"
                ),
            }
        }
        (delivered, recipients.len())
    }

    async fn cancel_escalation(
        &self,
        tenant: &TenantContext,
        channel: &dyn ChannelAdapter,
        event: &InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome, SwitchboardError> {
        let (tenant_id, user_id) = (tenant.id(), event.external_user_id.as_str());
        match self
            .store
            .apply_control(tenant_id, user_id, &ControlEvent::CancelEscalation, now)
            .await
        {
            Ok(_) => {}
            Err(SwitchboardError::InvalidTransition { from, .. }) => {
                debug!(tenant_id, user_id, from = %from, "nothing left to cancel");
                return Ok(TurnOutcome::Suppressed(SuppressReason::BotOff));
            }
            Err(e) => return Err(e),
        }
        self.record_system(
            tenant_id,
            user_id,
            AdminAction::EscalationCancelled,
            "escalation cancelled by customer".to_string(),
            now,
        )
        .await?;
        if let Some(ack) = &tenant.config.cancel_ack {
            self.reply_and_record(channel, event, ack, None, now).await?;
        }
        info!(tenant_id, user_id, "escalation cancelled, bot re-enabled");
        Ok(TurnOutcome::Cancelled)
    }

    async fn auto_pin(
        &self,
        tenant: &TenantContext,
        channel: &dyn ChannelAdapter,
        event: &InboundEvent,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome, SwitchboardError> {
        let (tenant_id, user_id) = (tenant.id(), event.external_user_id.as_str());
        match self
            .store
            .apply_control(tenant_id, user_id, &ControlEvent::AutoPin { reason: reason.clone() }, now)
            .await
        {
            Ok(_) => {}
            Err(SwitchboardError::InvalidTransition { from, .. }) => {
                debug!(tenant_id, user_id, from = %from, "conversation left normal state concurrently");
                return Ok(TurnOutcome::Suppressed(SuppressReason::BotOff));
            }
            Err(e) => return Err(e),
        }
        self.record_system(
            tenant_id,
            user_id,
            AdminAction::AutoPinned,
            format!("auto-pinned: {reason}"),
            now,
        )
        .await?;
        let acknowledged = self
            .reply_and_record(channel, event, &tenant.config.auto_pin_ack, None, now)
            .await?;
        info!(tenant_id, user_id, reason = reason.as_str(), "returning customer auto-pinned");
        Ok(TurnOutcome::AutoPinned { acknowledged })
    }

    fn maybe_extract_crm(
        &self,
        tenant: &TenantContext,
        conversation: &Conversation,
        question: &str,
        now: DateTime<Utc>,
    ) {
        if !self.settings.crm_enabled {
            return;
        }
        let Some(provider) = tenant.analysis_provider() else {
            return;
        };
        // This turn added the customer message and the bot reply.
        let before = conversation.message_count;
        let Some(trigger) = crm_trigger(before, before + 2, self.settings.crm_threshold, question) else {
            return;
        };
        debug!(
            tenant_id = tenant.id(),
            user_id = %conversation.user_id,
            trigger = trigger.as_str(),
            "CRM extraction triggered"
        );
        let (crm, provider) = (self.crm.clone(), Arc::clone(provider));
        let (tenant_key, user_key) = (tenant.id().to_string(), conversation.user_id.clone());
        self.background.spawn("crm_extraction", async move {
            crm.extract(provider.as_ref(), &tenant_key, &user_key, now)
                .await
                .map(|_| ())
        });
    }
}
