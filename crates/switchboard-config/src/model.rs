// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use switchboard_core::ChannelKind;

/// Top-level Switchboard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP server for webhooks and the review API.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Duplicate suppression and rate limiting.
    #[serde(default)]
    pub guard: GuardConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Ordered AI providers for the fallback chain.
    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub learning: LearningConfig,

    #[serde(default)]
    pub crm: CrmConfig,

    #[serde(default)]
    pub usage: UsageConfig,

    #[serde(default)]
    pub followup: FollowupConfig,

    /// Onboarded businesses.
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

impl SwitchboardConfig {
    /// Looks up a tenant by id.
    pub fn tenant(&self, id: &str) -> Option<&TenantConfig> {
        self.tenants.iter().find(|t| t.id == id)
    }
}

/// Service identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "switchboard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Shared store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("switchboard").join("switchboard.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("switchboard.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required by the review API. The API is disabled when unset.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Wall-clock budget for handling one webhook delivery.
    #[serde(default = "default_webhook_budget_ms")]
    pub webhook_budget_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_token: None,
            webhook_budget_ms: default_webhook_budget_ms(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_webhook_budget_ms() -> u64 {
    8_000
}

/// Duplicate suppression and rate limiting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// How long a delivery token is remembered. Must exceed channel redelivery.
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,

    /// Events allowed per user per window.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            dedup_ttl_secs: default_dedup_ttl_secs(),
            rate_limit: default_rate_limit(),
            rate_window_secs: default_rate_window_secs(),
        }
    }
}

/// Minimum accepted dedup TTL; channels redeliver within a minute.
pub const MIN_DEDUP_TTL_SECS: u64 = 60;

fn default_dedup_ttl_secs() -> u64 {
    120
}

fn default_rate_limit() -> u32 {
    20
}

fn default_rate_window_secs() -> u64 {
    60
}

/// Conversation handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Messages kept per conversation; older ones are trimmed.
    #[serde(default = "default_message_cap")]
    pub message_cap: u32,

    /// Silence after which a customer counts as returning.
    #[serde(default = "default_returning_gap_secs")]
    pub returning_gap_secs: u64,

    /// Recent messages passed to the resolver and providers.
    #[serde(default = "default_history_turns")]
    pub history_turns: u32,

    /// Resolver layers above this value count as deferred.
    #[serde(default = "default_deferred_layer_threshold")]
    pub deferred_layer_threshold: i64,

    #[serde(default = "default_resolver_timeout_ms")]
    pub resolver_timeout_ms: u64,

    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            message_cap: default_message_cap(),
            returning_gap_secs: default_returning_gap_secs(),
            history_turns: default_history_turns(),
            deferred_layer_threshold: default_deferred_layer_threshold(),
            resolver_timeout_ms: default_resolver_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

fn default_message_cap() -> u32 {
    500
}

fn default_returning_gap_secs() -> u64 {
    2 * 60 * 60
}

fn default_history_turns() -> u32 {
    10
}

fn default_deferred_layer_threshold() -> i64 {
    3
}

fn default_resolver_timeout_ms() -> u64 {
    3_000
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

/// Supported provider API families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    /// Any OpenAI-compatible chat completions endpoint.
    Openai,
}

/// One provider in the fallback chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique name referenced by `provider_order` and `analysis_provider`.
    pub name: String,

    pub kind: ProviderKind,

    pub model: String,

    /// API key. Falls back to `ANTHROPIC_API_KEY` / `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Override the API endpoint (OpenAI-compatible gateways, tests).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-attempt timeout.
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider_timeout_ms() -> u64 {
    8_000
}

fn default_max_tokens() -> u32 {
    1024
}

/// Fallback chain configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    /// Providers in priority order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Provider used by learning, CRM, and follow-up analysis. Defaults to the first.
    #[serde(default)]
    pub analysis_provider: Option<String>,
}

/// Learning feedback loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LearningConfig {
    /// Analyses scoring below this are discarded.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Retention of learned entries, misses, and Q&A log entries.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,

    /// Q&A log entries kept per tenant.
    #[serde(default = "default_qa_log_cap")]
    pub qa_log_cap: u32,

    /// Raw examples kept per miss.
    #[serde(default = "default_miss_examples")]
    pub miss_examples: u32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            ttl_days: default_ttl_days(),
            qa_log_cap: default_qa_log_cap(),
            miss_examples: default_miss_examples(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.6
}

fn default_ttl_days() -> u32 {
    180
}

fn default_qa_log_cap() -> u32 {
    1000
}

fn default_miss_examples() -> u32 {
    5
}

/// CRM auto-extraction trigger.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrmConfig {
    #[serde(default = "default_crm_enabled")]
    pub enabled: bool,

    /// Extraction fires every time the conversation crosses a multiple of this.
    #[serde(default = "default_message_threshold")]
    pub message_threshold: u32,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            enabled: default_crm_enabled(),
            message_threshold: default_message_threshold(),
        }
    }
}

fn default_crm_enabled() -> bool {
    true
}

fn default_message_threshold() -> u32 {
    8
}

/// Usage ledger.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UsageConfig {
    /// Recent calls kept per tenant.
    #[serde(default = "default_recent_call_cap")]
    pub recent_call_cap: u32,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            recent_call_cap: default_recent_call_cap(),
        }
    }
}

fn default_recent_call_cap() -> u32 {
    200
}

/// Follow-up analysis job.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FollowupConfig {
    /// Customer messages unanswered this long need a follow-up.
    #[serde(default = "default_idle_minutes")]
    pub idle_minutes: u32,

    /// Conversations older than this are ignored.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,

    /// How often `serve` runs the job.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
}

impl Default for FollowupConfig {
    fn default() -> Self {
        Self {
            idle_minutes: default_idle_minutes(),
            lookback_hours: default_lookback_hours(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

fn default_idle_minutes() -> u32 {
    30
}

fn default_lookback_hours() -> u32 {
    72
}

fn default_interval_minutes() -> u32 {
    15
}

/// One onboarded business.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TenantConfig {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Initial value of the tenant-wide bot switch.
    #[serde(default = "default_bot_enabled")]
    pub bot_enabled: bool,

    /// Reply used when every fallback provider fails.
    #[serde(default = "default_default_message")]
    pub default_message: String,

    /// Acknowledgment sent when a returning customer is auto-pinned.
    #[serde(default = "default_auto_pin_ack")]
    pub auto_pin_ack: String,

    /// Push text sent to admin recipients on escalation.
    #[serde(default = "default_escalation_notice")]
    pub escalation_notice: String,

    /// Reply sent after a customer cancels an escalation.
    #[serde(default)]
    pub cancel_ack: Option<String>,

    /// System instructions for fallback providers.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub escalation_phrases: Vec<String>,

    #[serde(default)]
    pub cancel_phrases: Vec<String>,

    /// Who gets pushed escalation notices.
    #[serde(default)]
    pub admin_recipients: Vec<AdminRecipient>,

    /// Reorders or restricts the fallback providers for this tenant.
    #[serde(default)]
    pub provider_order: Option<Vec<String>>,

    #[serde(default)]
    pub business_hours: Option<BusinessHoursConfig>,

    #[serde(default)]
    pub line: Option<LineConfig>,

    #[serde(default)]
    pub messenger: Option<MessengerConfig>,
}

fn default_bot_enabled() -> bool {
    true
}

fn default_default_message() -> String {
    "Thanks for your message! Our team will get back to you shortly.".to_string()
}

fn default_auto_pin_ack() -> String {
    "We received your message. An agent will follow up with you soon.".to_string()
}

fn default_escalation_notice() -> String {
    "A customer asked to talk to staff.".to_string()
}

fn default_system_prompt() -> String {
    "You are a friendly customer-service assistant. Answer briefly and politely.".to_string()
}

/// Push target for admin notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdminRecipient {
    pub channel: ChannelKind,
    pub user_id: String,
}

/// What happens to messages outside business hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffHoursPolicy {
    /// Store the message, send nothing.
    #[default]
    Suppress,
    /// Answer as usual with an off-hours note handed to providers.
    ReplyWithNote,
}

/// Weekly opening window in a fixed UTC offset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusinessHoursConfig {
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Opening time, `HH:MM`.
    #[serde(default = "default_open")]
    pub open: String,

    /// Closing time, `HH:MM`. Earlier than `open` means the window spans midnight.
    #[serde(default = "default_close")]
    pub close: String,

    /// ISO weekdays the business opens on (Monday = 1).
    #[serde(default = "default_days")]
    pub days: Vec<u8>,

    #[serde(default)]
    pub off_hours: OffHoursPolicy,

    #[serde(default = "default_off_hours_note")]
    pub off_hours_note: String,
}

fn default_open() -> String {
    "09:00".to_string()
}

fn default_close() -> String {
    "18:00".to_string()
}

fn default_days() -> Vec<u8> {
    vec![1, 2, 3, 4, 5]
}

fn default_off_hours_note() -> String {
    "The shop is currently closed; staff will reply during business hours.".to_string()
}

/// LINE Messaging API credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LineConfig {
    pub channel_secret: String,
    pub access_token: String,
    /// Override the API endpoint (tests).
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Messenger Platform credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessengerConfig {
    pub app_secret: String,
    pub page_access_token: String,
    /// Token echoed during the webhook subscription handshake.
    pub verify_token: String,
    #[serde(default)]
    pub api_base: Option<String>,
}
