// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correction analysis: turns an admin correction into a learned entry.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use strum::{Display, EnumString};
use switchboard_core::records::{Correction, LearnedEntry, LearnedKind};
use switchboard_core::{ProviderAdapter, ProviderMessage, ProviderRequest, SwitchboardError};
use switchboard_cost::{CallSite, UsageLedger};
use tracing::{debug, info, warn};

use crate::store::{LearnedStore, NewLearned};

const ANALYSIS_PROMPT: &str = r#"You review corrections an admin made to a customer-service bot's answer.
Decide what the bot should learn so it answers correctly next time.

Reply with one JSON object only, no explanation:
{
  "action": "intent" | "knowledge" | "script" | "none",
  "confidence": number between 0 and 1,
  "title": short label,
  "triggers": short phrases a customer would use (for "intent"),
  "content": the answer or document text to store
}

Use "intent" when the question is a recurring request that maps to a fixed reply,
"knowledge" for a fact about the business, "script" for a reusable multi-step reply,
and "none" when the correction is a one-off or only a tone change."#;

/// What the analysis model decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LearnAction {
    Intent,
    Knowledge,
    Script,
    None,
}

impl LearnAction {
    fn kind(self) -> Option<LearnedKind> {
        match self {
            Self::Intent => Some(LearnedKind::Intent),
            Self::Knowledge => Some(LearnedKind::Knowledge),
            Self::Script => Some(LearnedKind::Script),
            Self::None => None,
        }
    }
}

/// Parsed analysis reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Analysis {
    pub action: LearnAction,
    pub confidence: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub content: String,
}

/// Result of analyzing one correction.
#[derive(Debug, Clone)]
pub enum LearnOutcome {
    Learned(LearnedEntry),
    /// Classified, but below the confidence threshold.
    BelowThreshold { action: LearnAction, confidence: f64 },
    NoAction,
    /// The model's reply could not be parsed.
    Unparseable,
}

impl LearnOutcome {
    /// Short label stored on the correction row.
    pub fn label(&self) -> String {
        match self {
            Self::Learned(entry) => format!("learned:{}", entry.kind),
            Self::BelowThreshold { action, confidence } => {
                format!("below_threshold:{action}:{confidence:.2}")
            }
            Self::NoAction => "none".to_string(),
            Self::Unparseable => "unparseable".to_string(),
        }
    }
}

/// Builds the user turn describing a correction.
pub fn build_analysis_request(correction: &Correction, max_tokens: u32) -> ProviderRequest {
    let body = format!(
        "Customer question:\n{}\n\nBot answer:\n{}\n\nAdmin's corrected answer:\n{}",
        correction.question, correction.bot_answer, correction.admin_answer
    );
    ProviderRequest {
        model: None,
        system_prompt: ANALYSIS_PROMPT.to_string(),
        messages: vec![ProviderMessage::user(body)],
        max_tokens,
    }
}

/// Extracts the JSON object from a model reply, tolerating code fences and
/// surrounding prose.
pub fn parse_analysis(response: &str) -> Option<Analysis> {
    let trimmed = response.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Analysis>(&trimmed[start..=end]) {
        Ok(analysis) => Some(analysis),
        Err(e) => {
            warn!("failed to parse correction analysis: {e}");
            debug!("raw analysis response: {response}");
            None
        }
    }
}

/// Applies the confidence threshold. Confidence at or above the threshold
/// is accepted.
pub fn decide(analysis: &Analysis, correction: &Correction, threshold: f64) -> Result<NewLearned, LearnOutcome> {
    let Some(kind) = analysis.action.kind() else {
        return Err(LearnOutcome::NoAction);
    };
    if !analysis.confidence.is_finite() || analysis.confidence < threshold {
        return Err(LearnOutcome::BelowThreshold {
            action: analysis.action,
            confidence: analysis.confidence,
        });
    }
    let title = if analysis.title.trim().is_empty() {
        correction.question.chars().take(60).collect()
    } else {
        analysis.title.trim().to_string()
    };
    let answer = if analysis.content.trim().is_empty() {
        correction.admin_answer.clone()
    } else {
        analysis.content.trim().to_string()
    };
    let mut triggers: Vec<String> = analysis
        .triggers
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    triggers.dedup();
    if kind == LearnedKind::Intent && triggers.is_empty() {
        triggers.push(switchboard_core::records::normalize_question(&correction.question));
    }
    Ok(NewLearned {
        kind,
        title,
        source_question: correction.question.clone(),
        answer,
        triggers,
        confidence: analysis.confidence,
    })
}

/// Runs correction analysis against a provider and persists the result.
#[derive(Clone)]
pub struct CorrectionAnalyzer {
    store: LearnedStore,
    ledger: UsageLedger,
    threshold: f64,
    max_tokens: u32,
}

impl CorrectionAnalyzer {
    pub fn new(store: LearnedStore, ledger: UsageLedger, threshold: f64, max_tokens: u32) -> Self {
        Self {
            store,
            ledger,
            threshold,
            max_tokens,
        }
    }

    pub fn store(&self) -> &LearnedStore {
        &self.store
    }

    /// Analyzes a stored correction. Usage is recorded whether or not the
    /// call succeeds.
    pub async fn analyze(
        &self,
        provider: &dyn ProviderAdapter,
        correction_id: i64,
        correction: &Correction,
        now: DateTime<Utc>,
    ) -> Result<LearnOutcome, SwitchboardError> {
        let request = build_analysis_request(correction, self.max_tokens);
        let result = provider.complete(request).await;

        let (model, usage, success) = match &result {
            Ok(resp) => (resp.model.clone(), resp.usage, true),
            Err(_) => (provider.default_model().to_string(), Default::default(), false),
        };
        if let Err(e) = self
            .ledger
            .record_call(&correction.tenant_id, provider.name(), &model, CallSite::Learning, usage, success, now)
            .await
        {
            warn!(error = %e, "failed to record learning usage");
        }
        let response = result?;

        let outcome = match parse_analysis(&response.text) {
            None => LearnOutcome::Unparseable,
            Some(analysis) => match decide(&analysis, correction, self.threshold) {
                Ok(draft) => {
                    LearnOutcome::Learned(self.store.insert(&correction.tenant_id, draft, now).await?)
                }
                Err(outcome) => outcome,
            },
        };
        self.store
            .set_correction_outcome(correction_id, &outcome.label())
            .await?;
        info!(
            tenant_id = %correction.tenant_id,
            correction_id,
            outcome = %outcome.label(),
            "correction analyzed"
        );
        Ok(outcome)
    }
}
