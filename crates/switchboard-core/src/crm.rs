// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRM profile record and its merge rules.
//!
//! AI extraction only ever fills gaps or refreshes AI-sourced values: an
//! extracted `None` never clears anything, and fields on a manually saved
//! profile are never replaced by the extractor. Manual saves replace the
//! profile wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Username stamped on profiles written by the extractor.
pub const AI_EXTRACTOR: &str = "ai-extractor";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PurchaseIntent {
    Hot,
    Warm,
    Cold,
    Purchased,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CustomerStage {
    Lead,
    Prospect,
    Customer,
    Churned,
}

/// Who last shaped the profile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProfileSource {
    Ai,
    Manual,
}

/// CRM profile for one (tenant, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmProfile {
    pub tenant_id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub note: Option<String>,
    pub purchase_intent: Option<PurchaseIntent>,
    pub stage: Option<CustomerStage>,
    pub tags: Vec<String>,
    pub interested_products: Vec<String>,
    pub extracted_by: ProfileSource,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Fields an extraction call may return. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFields {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub note: Option<String>,
    pub purchase_intent: Option<PurchaseIntent>,
    pub stage: Option<CustomerStage>,
    pub tags: Vec<String>,
    pub interested_products: Vec<String>,
}

impl CrmProfile {
    /// Merges an AI extraction into `existing` (if any).
    pub fn merge_extracted(
        existing: Option<&CrmProfile>,
        tenant_id: &str,
        user_id: &str,
        extracted: &ProfileFields,
        now: DateTime<Utc>,
    ) -> CrmProfile {
        let Some(current) = existing else {
            return CrmProfile {
                tenant_id: tenant_id.to_string(),
                user_id: user_id.to_string(),
                name: non_empty(&extracted.name),
                phone: non_empty(&extracted.phone),
                email: non_empty(&extracted.email),
                address: non_empty(&extracted.address),
                note: non_empty(&extracted.note),
                purchase_intent: extracted.purchase_intent,
                stage: extracted.stage,
                tags: union(&[], &extracted.tags),
                interested_products: union(&[], &extracted.interested_products),
                extracted_by: ProfileSource::Ai,
                updated_by: AI_EXTRACTOR.to_string(),
                updated_at: now,
            };
        };

        let locked = current.extracted_by == ProfileSource::Manual;
        CrmProfile {
            tenant_id: current.tenant_id.clone(),
            user_id: current.user_id.clone(),
            name: merge_text(&current.name, &extracted.name, locked),
            phone: merge_text(&current.phone, &extracted.phone, locked),
            email: merge_text(&current.email, &extracted.email, locked),
            address: merge_text(&current.address, &extracted.address, locked),
            note: merge_text(&current.note, &extracted.note, locked),
            purchase_intent: merge_value(current.purchase_intent, extracted.purchase_intent, locked),
            stage: merge_value(current.stage, extracted.stage, locked),
            tags: union(&current.tags, &extracted.tags),
            interested_products: union(&current.interested_products, &extracted.interested_products),
            extracted_by: current.extracted_by,
            updated_by: AI_EXTRACTOR.to_string(),
            updated_at: now,
        }
    }

    /// Builds the profile an admin saved by hand; every field comes from the form.
    pub fn manual(
        tenant_id: &str,
        user_id: &str,
        fields: &ProfileFields,
        admin: &str,
        now: DateTime<Utc>,
    ) -> CrmProfile {
        CrmProfile {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            name: non_empty(&fields.name),
            phone: non_empty(&fields.phone),
            email: non_empty(&fields.email),
            address: non_empty(&fields.address),
            note: non_empty(&fields.note),
            purchase_intent: fields.purchase_intent,
            stage: fields.stage,
            tags: union(&[], &fields.tags),
            interested_products: union(&[], &fields.interested_products),
            extracted_by: ProfileSource::Manual,
            updated_by: admin.to_string(),
            updated_at: now,
        }
    }

    /// Same profile content, ignoring who wrote it and when.
    pub fn same_fields(&self, other: &CrmProfile) -> bool {
        self.name == other.name
            && self.phone == other.phone
            && self.email == other.email
            && self.address == other.address
            && self.note == other.note
            && self.purchase_intent == other.purchase_intent
            && self.stage == other.stage
            && self.tags == other.tags
            && self.interested_products == other.interested_products
            && self.extracted_by == other.extracted_by
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn merge_text(current: &Option<String>, extracted: &Option<String>, locked: bool) -> Option<String> {
    if locked && current.is_some() {
        return current.clone();
    }
    non_empty(extracted).or_else(|| current.clone())
}

fn merge_value<T: Copy>(current: Option<T>, extracted: Option<T>, locked: bool) -> Option<T> {
    if locked && current.is_some() {
        return current;
    }
    extracted.or(current)
}

/// Order-preserving union with trimmed, case-insensitive de-duplication.
fn union(current: &[String], extra: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(current.len() + extra.len());
    for item in current.iter().chain(extra) {
        let item = item.trim();
        if item.is_empty() || out.iter().any(|o| o.eq_ignore_ascii_case(item)) {
            continue;
        }
        out.push(item.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn manual_profile() -> CrmProfile {
        CrmProfile::manual(
            "shop",
            "U1",
            &ProfileFields {
                name: Some("Somchai".into()),
                phone: Some("0812345678".into()),
                stage: Some(CustomerStage::Customer),
                tags: vec!["vip".into()],
                ..Default::default()
            },
            "alice",
            now(),
        )
    }

    #[test]
    fn extraction_fills_gaps_on_manual_profile() {
        let extracted = ProfileFields {
            name: None,
            phone: Some("0999999999".into()),
            email: Some("s@example.com".into()),
            tags: vec!["VIP".into(), "wholesale".into()],
            ..Default::default()
        };
        let merged = CrmProfile::merge_extracted(Some(&manual_profile()), "shop", "U1", &extracted, now());
        assert_eq!(merged.name.as_deref(), Some("Somchai"));
        assert_eq!(merged.phone.as_deref(), Some("0812345678"));
        assert_eq!(merged.email.as_deref(), Some("s@example.com"));
        assert_eq!(merged.tags, vec!["vip".to_string(), "wholesale".to_string()]);
        assert_eq!(merged.extracted_by, ProfileSource::Manual);
        assert_eq!(merged.updated_by, AI_EXTRACTOR);
    }

    #[test]
    fn extraction_refreshes_ai_values() {
        let first = CrmProfile::merge_extracted(
            None,
            "shop",
            "U1",
            &ProfileFields {
                purchase_intent: Some(PurchaseIntent::Warm),
                ..Default::default()
            },
            now(),
        );
        let second = CrmProfile::merge_extracted(
            Some(&first),
            "shop",
            "U1",
            &ProfileFields {
                purchase_intent: Some(PurchaseIntent::Hot),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(second.purchase_intent, Some(PurchaseIntent::Hot));
        assert_eq!(second.extracted_by, ProfileSource::Ai);
    }

    #[test]
    fn blank_strings_count_as_null() {
        let merged = CrmProfile::merge_extracted(
            None,
            "shop",
            "U1",
            &ProfileFields {
                name: Some("   ".into()),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(merged.name, None);
    }

    #[test]
    fn intent_parses_case_insensitively() {
        use std::str::FromStr;
        assert_eq!(PurchaseIntent::from_str("HOT").unwrap(), PurchaseIntent::Hot);
    }
}
