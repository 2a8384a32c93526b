// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end correction analysis against an in-memory store.

use async_trait::async_trait;
use chrono::Utc;
use switchboard_core::records::{Correction, LearnedKind};
use switchboard_core::{
    AdapterType, HealthStatus, PluginAdapter, ProviderAdapter, ProviderRequest, ProviderResponse,
    SwitchboardError, TokenUsage,
};
use switchboard_cost::UsageLedger;
use switchboard_learning::{CorrectionAnalyzer, LearnOutcome, LearnedStore};
use switchboard_storage::Database;

struct CannedProvider(String);

#[async_trait]
impl PluginAdapter for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }
    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }
    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }
    async fn health_check(&self) -> Result<HealthStatus, SwitchboardError> {
        Ok(HealthStatus::Healthy)
    }
    async fn shutdown(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for CannedProvider {
    fn default_model(&self) -> &str {
        "claude-haiku-4-5"
    }
    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, SwitchboardError> {
        Ok(ProviderResponse {
            text: self.0.clone(),
            model: "claude-haiku-4-5".into(),
            usage: TokenUsage {
                prompt_tokens: 120,
                completion_tokens: 40,
            },
        })
    }
}

fn correction() -> Correction {
    Correction {
        tenant_id: "t".into(),
        user_id: Some("u".into()),
        admin: "alice".into(),
        question: "how much is shipping?".into(),
        bot_answer: "I don't know".into(),
        admin_answer: "Shipping is 50 baht.".into(),
        created_at: Utc::now(),
    }
}

const KINDS: [LearnedKind; 3] = [LearnedKind::Intent, LearnedKind::Knowledge, LearnedKind::Script];

async fn run(kind: LearnedKind, confidence: f64) -> (LearnOutcome, LearnedStore, UsageLedger) {
    let db = Database::open_in_memory().await.unwrap();
    let store = LearnedStore::new(db.clone(), 180);
    let ledger = UsageLedger::new(db, 200);
    let analyzer = CorrectionAnalyzer::new(store.clone(), ledger.clone(), 0.6, 512);
    let provider = CannedProvider(format!(
        r#"{{"action":"{kind}","confidence":{confidence},"title":"shipping cost","triggers":["shipping","delivery fee"],"content":"Shipping is 50 baht."}}"#
    ));
    let c = correction();
    let id = store.record_correction(&c).await.unwrap();
    let outcome = analyzer.analyze(&provider, id, &c, Utc::now()).await.unwrap();
    assert!(store.correction_outcome(id).await.unwrap().is_some());
    (outcome, store, ledger)
}

#[tokio::test]
async fn confidence_below_threshold_persists_nothing() {
    for kind in KINDS {
        let (outcome, store, ledger) = run(kind, 0.59).await;
        assert!(matches!(outcome, LearnOutcome::BelowThreshold { .. }), "{kind}");
        assert!(store.enabled_data("t", Utc::now()).await.unwrap().is_empty(), "{kind}");
        assert_eq!(ledger.totals("t").await.unwrap().calls, 1);
    }
}

#[tokio::test]
async fn confidence_above_threshold_persists_one_entry_of_the_classified_kind() {
    for kind in KINDS {
        let (outcome, store, _) = run(kind, 0.61).await;
        let LearnOutcome::Learned(entry) = outcome else {
            panic!("expected a learned {kind}");
        };
        assert_eq!(entry.kind, kind);

        let data = store.enabled_data("t", Utc::now()).await.unwrap();
        let counts = (data.intents.len(), data.knowledge.len(), data.scripts.len());
        let expected = match kind {
            LearnedKind::Intent => (1, 0, 0),
            LearnedKind::Knowledge => (0, 1, 0),
            LearnedKind::Script => (0, 0, 1),
        };
        assert_eq!(counts, expected, "{kind}");
        assert_eq!(store.list("t", kind, Utc::now()).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn learned_intent_keeps_its_triggers() {
    let (_, store, _) = run(LearnedKind::Intent, 0.61).await;
    let data = store.enabled_data("t", Utc::now()).await.unwrap();
    assert_eq!(data.intents[0].triggers, ["shipping", "delivery fee"]);
}
