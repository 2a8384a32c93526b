// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Switchboard.
//!
//! Foundational traits, error types, persisted records, the conversation
//! control state machine, and the CRM merge rules. Every other crate in the
//! workspace depends on this one.

pub mod crm;
pub mod error;
pub mod records;
pub mod state;
pub mod traits;
pub mod types;

pub use error::SwitchboardError;
pub use state::{BotState, ControlEvent, ConversationControl};
pub use types::{
    AdapterType, ChannelKind, EventKind, HealthStatus, InboundEvent, MessageId, OutboundMessage,
    ProviderMessage, ProviderRequest, ProviderResponse, TokenUsage, UserProfile,
};

pub use traits::{
    ChannelAdapter, PipelineResolver, PluginAdapter, ProviderAdapter, ResolverInput,
    ResolverOutput, ResolverTrace, StorageAdapter,
};
