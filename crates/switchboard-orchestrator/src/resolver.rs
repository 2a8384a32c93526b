// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword resolver shipped with the binary.
//!
//! Layers, in order:
//!
//! | layer | name              | matches                                  |
//! |-------|-------------------|------------------------------------------|
//! | 0     | `control_phrase`  | tenant escalation / cancel phrases       |
//! | 1     | `learned_intent`  | trigger of an enabled learned intent     |
//! | 2     | `learned_knowledge` | title or trigger of a knowledge entry  |
//! | 3     | `learned_script`  | trigger of a learned script              |
//! | 4     | `ai_fallback`     | nothing; defers to the fallback chain    |

use async_trait::async_trait;
use switchboard_core::records::{LearnedEntry, normalize_question};
use switchboard_core::traits::resolver::TraceStep;
use switchboard_core::{PipelineResolver, ResolverInput, ResolverOutput, ResolverTrace, SwitchboardError};

pub const FALLBACK_LAYER: i64 = 4;

/// Whether `text` contains any of `phrases`, compared after normalization.
pub fn matches_any(text: &str, phrases: &[String]) -> bool {
    let text = normalize_question(text);
    phrases
        .iter()
        .map(|p| normalize_question(p))
        .any(|p| !p.is_empty() && text.contains(&p))
}

fn entry_matches(text: &str, entry: &LearnedEntry, include_title: bool) -> bool {
    matches_any(text, &entry.triggers) || (include_title && matches_any(text, std::slice::from_ref(&entry.title)))
}

pub struct KeywordResolver {
    escalation_reply: String,
}

impl KeywordResolver {
    /// `escalation_reply` is echoed to customers who ask for staff.
    pub fn new(escalation_reply: impl Into<String>) -> Self {
        Self {
            escalation_reply: escalation_reply.into(),
        }
    }
}

impl Default for KeywordResolver {
    fn default() -> Self {
        Self::new("Sure, one of our staff will be with you shortly.")
    }
}

struct Trace(Vec<TraceStep>);

impl Trace {
    fn step(&mut self, layer: i64, name: &str, matched: bool) -> bool {
        self.0.push(TraceStep {
            layer,
            name: name.to_string(),
            matched,
        });
        matched
    }

    fn finish(self, content: String, hits: Vec<String>) -> ResolverOutput {
        let (final_layer, final_layer_name) = self
            .0
            .last()
            .map(|s| (s.layer, s.name.clone()))
            .unwrap_or((FALLBACK_LAYER, "ai_fallback".to_string()));
        ResolverOutput {
            content,
            trace: ResolverTrace {
                final_layer,
                final_layer_name,
                steps: self.0,
            },
            is_admin_escalation: false,
            is_cancel_escalation: false,
            carousel_product_ids: Vec::new(),
            learned_hits: hits,
        }
    }
}

#[async_trait]
impl PipelineResolver for KeywordResolver {
    async fn resolve(&self, input: ResolverInput<'_>) -> Result<ResolverOutput, SwitchboardError> {
        let message = input.message;
        let mut trace = Trace(Vec::new());

        let escalation = matches_any(message, input.escalation_phrases);
        let cancel = !escalation && matches_any(message, input.cancel_phrases);
        if trace.step(0, "control_phrase", escalation || cancel) {
            let content = if escalation { self.escalation_reply.clone() } else { String::new() };
            let mut out = trace.finish(content, Vec::new());
            out.is_admin_escalation = escalation;
            out.is_cancel_escalation = cancel;
            return Ok(out);
        }

        let layers: [(i64, &str, &[LearnedEntry], bool); 3] = [
            (1, "learned_intent", input.learned.intents.as_slice(), false),
            (2, "learned_knowledge", input.learned.knowledge.as_slice(), true),
            (3, "learned_script", input.learned.scripts.as_slice(), false),
        ];
        for (layer, name, entries, include_title) in layers {
            let hit = entries.iter().find(|e| e.enabled && entry_matches(message, e, include_title));
            if trace.step(layer, name, hit.is_some())
                && let Some(entry) = hit
            {
                return Ok(trace.finish(entry.answer.clone(), vec![entry.id.clone()]));
            }
        }

        trace.step(FALLBACK_LAYER, "ai_fallback", true);
        Ok(trace.finish(String::new(), Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use switchboard_core::records::{LearnedData, LearnedKind};

    fn entry(kind: LearnedKind, id: &str, title: &str, triggers: &[&str], answer: &str) -> LearnedEntry {
        LearnedEntry {
            id: id.into(),
            tenant_id: "t".into(),
            kind,
            title: title.into(),
            source_question: String::new(),
            answer: answer.into(),
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
            confidence: 0.9,
            enabled: true,
            hit_count: 0,
            created_at: Utc::now(),
            expires_at: Utc::now(),
        }
    }

    async fn resolve(message: &str, learned: &LearnedData) -> ResolverOutput {
        let escalation = vec!["talk to staff".to_string(), "human".to_string()];
        let cancel = vec!["never mind".to_string()];
        KeywordResolver::default()
            .resolve(ResolverInput {
                tenant_id: "t",
                message,
                history: &[],
                escalation_phrases: &escalation,
                cancel_phrases: &cancel,
                learned,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn escalation_phrase_is_layer_zero() {
        let out = resolve("Can I TALK TO STAFF please", &LearnedData::default()).await;
        assert!(out.is_admin_escalation);
        assert!(!out.is_cancel_escalation);
        assert_eq!(out.trace.final_layer, 0);
        assert!(!out.content.is_empty());
    }

    #[tokio::test]
    async fn cancel_phrase_is_flagged() {
        let out = resolve("never mind, thanks", &LearnedData::default()).await;
        assert!(out.is_cancel_escalation);
        assert!(!out.is_admin_escalation);
    }

    #[tokio::test]
    async fn learned_intent_answers_and_reports_hit() {
        let mut learned = LearnedData::default();
        learned.push(entry(LearnedKind::Intent, "i1", "Sunday delivery", &["sunday"], "Yes, we deliver on Sunday."));
        let out = resolve("Do you deliver on Sunday?", &learned).await;
        assert_eq!(out.content, "Yes, we deliver on Sunday.");
        assert_eq!(out.trace.final_layer, 1);
        assert_eq!(out.learned_hits, vec!["i1".to_string()]);
        assert!(!out.deferred(3));
    }

    #[tokio::test]
    async fn knowledge_matches_by_title() {
        let mut learned = LearnedData::default();
        learned.push(entry(LearnedKind::Knowledge, "k1", "parking", &[], "Free parking behind the shop."));
        let out = resolve("is there parking?", &learned).await;
        assert_eq!(out.trace.final_layer, 2);
        assert_eq!(out.trace.steps.len(), 3);
    }

    #[tokio::test]
    async fn disabled_entries_are_ignored_and_unknown_defers() {
        let mut learned = LearnedData::default();
        let mut off = entry(LearnedKind::Intent, "i1", "x", &["refund"], "no");
        off.enabled = false;
        learned.push(off);
        let out = resolve("I want a refund", &learned).await;
        assert_eq!(out.trace.final_layer, FALLBACK_LAYER);
        assert_eq!(out.trace.final_layer_name, "ai_fallback");
        assert!(out.deferred(3));
        assert!(out.content.is_empty());
    }
}
