// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use switchboard_core::crm::{CrmProfile, CustomerStage, ProfileFields, PurchaseIntent};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn opt_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), Just(Some(String::new())), "[a-z0-9@. ]{1,12}".prop_map(Some)]
}

fn opt_intent() -> impl Strategy<Value = Option<PurchaseIntent>> {
    prop_oneof![
        Just(None),
        Just(Some(PurchaseIntent::Hot)),
        Just(Some(PurchaseIntent::Cold)),
        Just(Some(PurchaseIntent::Purchased)),
    ]
}

fn opt_stage() -> impl Strategy<Value = Option<CustomerStage>> {
    prop_oneof![
        Just(None),
        Just(Some(CustomerStage::Lead)),
        Just(Some(CustomerStage::Customer)),
    ]
}

prop_compose! {
    fn fields()(
        name in opt_text(),
        phone in opt_text(),
        email in opt_text(),
        address in opt_text(),
        note in opt_text(),
        purchase_intent in opt_intent(),
        stage in opt_stage(),
        tags in proptest::collection::vec("[a-z]{1,6}", 0..4),
        interested_products in proptest::collection::vec("[a-z]{1,6}", 0..3),
    ) -> ProfileFields {
        ProfileFields { name, phone, email, address, note, purchase_intent, stage, tags, interested_products }
    }
}

proptest! {
    #[test]
    fn ai_merge_never_clears_manual_fields(manual in fields(), extracted in fields()) {
        let existing = CrmProfile::manual("t", "u", &manual, "alice", at(1));
        let merged = CrmProfile::merge_extracted(Some(&existing), "t", "u", &extracted, at(2));

        if existing.name.is_some() { prop_assert_eq!(&merged.name, &existing.name); }
        if existing.phone.is_some() { prop_assert_eq!(&merged.phone, &existing.phone); }
        if existing.email.is_some() { prop_assert_eq!(&merged.email, &existing.email); }
        if existing.address.is_some() { prop_assert_eq!(&merged.address, &existing.address); }
        if existing.note.is_some() { prop_assert_eq!(&merged.note, &existing.note); }
        if existing.purchase_intent.is_some() { prop_assert_eq!(merged.purchase_intent, existing.purchase_intent); }
        if existing.stage.is_some() { prop_assert_eq!(merged.stage, existing.stage); }
        for tag in &existing.tags {
            prop_assert!(merged.tags.contains(tag));
        }
    }

    #[test]
    fn repeated_extraction_is_idempotent(base in fields(), manual in any::<bool>(), extracted in fields()) {
        let existing = if manual {
            CrmProfile::manual("t", "u", &base, "alice", at(1))
        } else {
            CrmProfile::merge_extracted(None, "t", "u", &base, at(1))
        };
        let once = CrmProfile::merge_extracted(Some(&existing), "t", "u", &extracted, at(2));
        let twice = CrmProfile::merge_extracted(Some(&once), "t", "u", &extracted, at(3));
        prop_assert!(once.same_fields(&twice));
    }
}
