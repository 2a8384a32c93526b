// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pipeline resolver that returns queued outputs.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use switchboard_core::traits::resolver::{
    PipelineResolver, ResolverInput, ResolverOutput, ResolverTrace,
};
use switchboard_core::SwitchboardError;

/// Layer used by [`deferred`]; above every sensible threshold.
pub const DEFERRED_LAYER: i64 = 99;

/// A confident answer from `layer`.
pub fn answered(layer: i64, content: &str) -> ResolverOutput {
    output(layer, "scripted", content)
}

/// No match; the orchestrator should fall back.
pub fn deferred() -> ResolverOutput {
    output(DEFERRED_LAYER, "ai_fallback", "")
}

/// Explicit request for a human, echoing `content`.
pub fn escalation(content: &str) -> ResolverOutput {
    let mut out = output(0, "control_phrase", content);
    out.is_admin_escalation = true;
    out
}

/// The customer withdrew a request for a human.
pub fn cancel_request(content: &str) -> ResolverOutput {
    let mut out = output(0, "control_phrase", content);
    out.is_cancel_escalation = true;
    out
}

fn output(layer: i64, name: &str, content: &str) -> ResolverOutput {
    ResolverOutput {
        content: content.to_string(),
        trace: ResolverTrace {
            final_layer: layer,
            final_layer_name: name.to_string(),
            steps: Vec::new(),
        },
        is_admin_escalation: false,
        is_cancel_escalation: false,
        carousel_product_ids: Vec::new(),
        learned_hits: Vec::new(),
    }
}

/// What the resolver was asked.
#[derive(Debug, Clone)]
pub struct SeenInput {
    pub message: String,
    pub history_len: usize,
    pub learned_count: usize,
}

/// Returns queued outputs in order, then [`deferred`] forever.
#[derive(Default)]
pub struct ScriptedResolver {
    outputs: Mutex<VecDeque<Result<ResolverOutput, String>>>,
    seen: Mutex<Vec<SeenInput>>,
    delay: Option<Duration>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering, to exercise the resolver timeout.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push(&self, output: ResolverOutput) {
        self.outputs.lock().await.push_back(Ok(output));
    }

    pub async fn push_error(&self, message: &str) {
        self.outputs.lock().await.push_back(Err(message.to_string()));
    }

    pub async fn seen(&self) -> Vec<SeenInput> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl PipelineResolver for ScriptedResolver {
    async fn resolve(&self, input: ResolverInput<'_>) -> Result<ResolverOutput, SwitchboardError> {
        self.seen.lock().await.push(SeenInput {
            message: input.message.to_string(),
            history_len: input.history.len(),
            learned_count: input.learned.intents.len()
                + input.learned.knowledge.len()
                + input.learned.scripts.len(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.outputs.lock().await.pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(SwitchboardError::Internal(message)),
            None => Ok(deferred()),
        }
    }
}
