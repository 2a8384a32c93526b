// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contract of the pipeline resolver that matches a message to a scripted
//! or knowledge-based answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SwitchboardError;
use crate::records::LearnedData;
use crate::types::ProviderMessage;

/// Everything the resolver sees for one turn.
#[derive(Debug, Clone)]
pub struct ResolverInput<'a> {
    pub tenant_id: &'a str,
    pub message: &'a str,
    pub history: &'a [ProviderMessage],
    /// Tenant escalation phrases.
    pub escalation_phrases: &'a [String],
    /// Tenant cancel-escalation phrases.
    pub cancel_phrases: &'a [String],
    pub learned: &'a LearnedData,
}

/// One step of the resolver's decision trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub layer: i64,
    pub name: String,
    pub matched: bool,
}

/// Which layer produced the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverTrace {
    pub final_layer: i64,
    pub final_layer_name: String,
    #[serde(default)]
    pub steps: Vec<TraceStep>,
}

/// Resolver outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverOutput {
    pub content: String,
    pub trace: ResolverTrace,
    #[serde(default)]
    pub is_admin_escalation: bool,
    #[serde(default)]
    pub is_cancel_escalation: bool,
    #[serde(default)]
    pub carousel_product_ids: Vec<i64>,
    /// Ids of learned entries used for the answer; their hit counters are bumped.
    #[serde(default)]
    pub learned_hits: Vec<String>,
}

impl ResolverOutput {
    /// Whether the resolver deferred to the AI fallback chain.
    pub fn deferred(&self, threshold: i64) -> bool {
        self.trace.final_layer > threshold
    }
}

/// Matches a customer message to an answer.
#[async_trait]
pub trait PipelineResolver: Send + Sync + 'static {
    async fn resolve(&self, input: ResolverInput<'_>) -> Result<ResolverOutput, SwitchboardError>;
}
