// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRM profile persistence.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use switchboard_core::SwitchboardError;
use switchboard_core::crm::CrmProfile;

use crate::database::{Database, map_tr_err};
use crate::rows::{list_json, opt_parsed, parsed, string_list, time, to_ms};

const COLUMNS: &str = "tenant_id, user_id, name, phone, email, address, note, purchase_intent, \
     stage, tags, interested_products, extracted_by, updated_by, updated_at";

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<CrmProfile> {
    Ok(CrmProfile {
        tenant_id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        address: row.get(5)?,
        note: row.get(6)?,
        purchase_intent: opt_parsed(row, 7)?,
        stage: opt_parsed(row, 8)?,
        tags: string_list(row, 9)?,
        interested_products: string_list(row, 10)?,
        extracted_by: parsed(row, 11)?,
        updated_by: row.get(12)?,
        updated_at: time(row, 13)?,
    })
}

pub async fn get(
    db: &Database,
    tenant_id: &str,
    user_id: &str,
) -> Result<Option<CrmProfile>, SwitchboardError> {
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM crm_profiles WHERE tenant_id = ?1 AND user_id = ?2"),
                params![tenant_id, user_id],
                row_to_profile,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Unconditional write (manual saves).
pub async fn save(db: &Database, profile: &CrmProfile) -> Result<(), SwitchboardError> {
    let p = profile.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO crm_profiles ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    p.tenant_id,
                    p.user_id,
                    p.name,
                    p.phone,
                    p.email,
                    p.address,
                    p.note,
                    p.purchase_intent.map(|v| v.to_string()),
                    p.stage.map(|v| v.to_string()),
                    list_json(&p.tags),
                    list_json(&p.interested_products),
                    p.extracted_by.to_string(),
                    p.updated_by,
                    to_ms(p.updated_at)
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Writes a merged profile only if the stored row is still the one the merge
/// was based on: absent when `based_on` is `None`, otherwise stamped
/// `based_on`. Returns false when another writer got there first.
pub async fn save_if_unchanged(
    db: &Database,
    profile: &CrmProfile,
    based_on: Option<DateTime<Utc>>,
) -> Result<bool, SwitchboardError> {
    let p = profile.clone();
    let based_on = based_on.map(to_ms);
    db.connection()
        .call(move |conn| {
            let intent = p.purchase_intent.map(|v| v.to_string());
            let stage = p.stage.map(|v| v.to_string());
            let tags = list_json(&p.tags);
            let products = list_json(&p.interested_products);
            let source = p.extracted_by.to_string();
            let updated_at = to_ms(p.updated_at);
            let changed = match based_on {
                None => conn.execute(
                    &format!(
                        "INSERT INTO crm_profiles ({COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                         ON CONFLICT(tenant_id, user_id) DO NOTHING"
                    ),
                    params![
                        p.tenant_id, p.user_id, p.name, p.phone, p.email, p.address, p.note,
                        intent, stage, tags, products, source, p.updated_by, updated_at
                    ],
                )?,
                Some(expected) => conn.execute(
                    "UPDATE crm_profiles SET
                        name = ?3, phone = ?4, email = ?5, address = ?6, note = ?7,
                        purchase_intent = ?8, stage = ?9, tags = ?10, interested_products = ?11,
                        extracted_by = ?12, updated_by = ?13, updated_at = ?14
                     WHERE tenant_id = ?1 AND user_id = ?2 AND updated_at = ?15",
                    params![
                        p.tenant_id, p.user_id, p.name, p.phone, p.email, p.address, p.note,
                        intent, stage, tags, products, source, p.updated_by, updated_at, expected
                    ],
                )?,
            };
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::crm::{CustomerStage, ProfileFields, ProfileSource};

    #[tokio::test]
    async fn manual_save_round_trips() {
        let db = Database::open_in_memory().await.unwrap();
        let fields = ProfileFields {
            name: Some("Mali".into()),
            stage: Some(CustomerStage::Prospect),
            tags: vec!["vip".into()],
            ..Default::default()
        };
        let profile = CrmProfile::manual("t", "u", &fields, "alice", Utc::now());
        save(&db, &profile).await.unwrap();

        let stored = get(&db, "t", "u").await.unwrap().unwrap();
        assert!(stored.same_fields(&profile));
        assert_eq!(stored.extracted_by, ProfileSource::Manual);
        assert_eq!(stored.updated_by, "alice");
    }

    #[tokio::test]
    async fn conditional_save_detects_concurrent_writer() {
        let db = Database::open_in_memory().await.unwrap();
        let t0 = Utc::now();
        let fields = ProfileFields {
            phone: Some("0812345678".into()),
            ..Default::default()
        };
        let first = CrmProfile::merge_extracted(None, "t", "u", &fields, t0);
        assert!(save_if_unchanged(&db, &first, None).await.unwrap());
        // A second insert based on "no profile" loses.
        assert!(!save_if_unchanged(&db, &first, None).await.unwrap());

        let stored = get(&db, "t", "u").await.unwrap().unwrap();
        let t1 = t0 + chrono::Duration::seconds(1);
        let next = CrmProfile::merge_extracted(Some(&stored), "t", "u", &ProfileFields::default(), t1);
        assert!(save_if_unchanged(&db, &next, Some(stored.updated_at)).await.unwrap());
        // Stale base timestamp is rejected.
        assert!(!save_if_unchanged(&db, &next, Some(stored.updated_at)).await.unwrap());
    }
}
