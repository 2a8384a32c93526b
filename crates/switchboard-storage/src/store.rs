// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation Store: the authoritative record of conversations, messages,
//! control state, CRM profiles, follow-ups, and admin activity.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use switchboard_core::crm::{CrmProfile, ProfileFields};
use switchboard_core::records::{
    ActivityEntry, AdminStats, Conversation, DailyDigest, FollowUp, Message, NewActivity,
    NewMessage,
};
use switchboard_core::{ChannelKind, ControlEvent, SwitchboardError, UserProfile};

use crate::database::Database;
use crate::queries::activity::ActivityFilter;
use crate::queries::conversations::ConversationFilter;
use crate::queries::{activity, conversations, crm, digest, followups, messages, tenants};

/// Attempts at a compare-and-set write before giving up.
const CAS_ATTEMPTS: usize = 8;

/// Typed access to the shared store for one deployment.
#[derive(Clone)]
pub struct ConversationStore {
    db: Database,
    message_cap: u32,
}

impl ConversationStore {
    pub fn new(db: Database, message_cap: u32) -> Self {
        Self { db, message_cap }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn get_or_create(
        &self,
        tenant_id: &str,
        user_id: &str,
        source: ChannelKind,
        profile: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<Conversation, SwitchboardError> {
        conversations::get_or_create(&self.db, tenant_id, user_id, source, profile, now).await
    }

    pub async fn conversation(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Conversation, SwitchboardError> {
        conversations::get(&self.db, tenant_id, user_id)
            .await?
            .ok_or_else(|| SwitchboardError::NotFound {
                entity: "conversation",
                id: user_id.to_string(),
            })
    }

    pub async fn find_conversation(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Option<Conversation>, SwitchboardError> {
        conversations::get(&self.db, tenant_id, user_id).await
    }

    pub async fn list_conversations(
        &self,
        tenant_id: &str,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, SwitchboardError> {
        conversations::list(&self.db, tenant_id, filter).await
    }

    /// Appends to the log (trimming to the cap) and updates the summary.
    pub async fn add_message(
        &self,
        tenant_id: &str,
        user_id: &str,
        message: &NewMessage,
    ) -> Result<i64, SwitchboardError> {
        messages::append(&self.db, tenant_id, user_id, message, self.message_cap).await
    }

    /// The last `limit` messages, oldest first.
    pub async fn recent_messages(
        &self,
        tenant_id: &str,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Message>, SwitchboardError> {
        messages::recent(&self.db, tenant_id, user_id, limit).await
    }

    pub async fn messages_before(
        &self,
        tenant_id: &str,
        user_id: &str,
        before_seq: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Message>, SwitchboardError> {
        messages::page(&self.db, tenant_id, user_id, before_seq, limit).await
    }

    /// Applies a control event with optimistic concurrency.
    ///
    /// The transition is recomputed from a fresh read on every conflict, so
    /// two racing writers both see their event applied to the state the
    /// other left behind. An event that is invalid for the current state
    /// fails with `InvalidTransition`.
    pub async fn apply_control(
        &self,
        tenant_id: &str,
        user_id: &str,
        event: &ControlEvent,
        now: DateTime<Utc>,
    ) -> Result<Conversation, SwitchboardError> {
        for attempt in 0..CAS_ATTEMPTS {
            let mut current = self.conversation(tenant_id, user_id).await?;
            let next = current.control.apply(event, now)?;
            if conversations::update_control(
                &self.db,
                tenant_id,
                user_id,
                current.control_version,
                &next,
            )
            .await?
            {
                current.control = next;
                current.control_version += 1;
                return Ok(current);
            }
            debug!(tenant_id, user_id, attempt, %event, "control write conflicted, retrying");
        }
        Err(SwitchboardError::Internal(format!(
            "control state for {tenant_id}/{user_id} kept changing underneath {event}"
        )))
    }

    /// Removes the conversation with its messages, follow-up and CRM profile.
    pub async fn delete_conversation(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<bool, SwitchboardError> {
        conversations::delete(&self.db, tenant_id, user_id).await
    }

    pub async fn mark_read(&self, tenant_id: &str, user_id: &str) -> Result<bool, SwitchboardError> {
        conversations::mark_read(&self.db, tenant_id, user_id).await
    }

    pub async fn tenant_bot_enabled(
        &self,
        tenant_id: &str,
        default: bool,
    ) -> Result<bool, SwitchboardError> {
        tenants::tenant_bot_enabled(&self.db, tenant_id, default).await
    }

    pub async fn set_tenant_bot_enabled(
        &self,
        tenant_id: &str,
        enabled: bool,
        updated_by: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SwitchboardError> {
        tenants::set_tenant_bot_enabled(&self.db, tenant_id, enabled, updated_by, now).await
    }

    // --- Follow-ups ---

    pub async fn set_followup(&self, followup: &FollowUp) -> Result<(), SwitchboardError> {
        followups::set(&self.db, followup).await
    }

    pub async fn dismiss_followup(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<bool, SwitchboardError> {
        followups::dismiss(&self.db, tenant_id, user_id).await
    }

    pub async fn pending_followups(&self, tenant_id: &str) -> Result<Vec<FollowUp>, SwitchboardError> {
        followups::pending(&self.db, tenant_id).await
    }

    pub async fn idle_conversations(
        &self,
        tenant_id: &str,
        since: DateTime<Utc>,
        idle_before: DateTime<Utc>,
    ) -> Result<Vec<Conversation>, SwitchboardError> {
        followups::idle_conversations(&self.db, tenant_id, since, idle_before).await
    }

    // --- CRM ---

    pub async fn crm_profile(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Option<CrmProfile>, SwitchboardError> {
        crm::get(&self.db, tenant_id, user_id).await
    }

    /// Replaces the profile with an admin's manual edit.
    pub async fn save_crm_manual(
        &self,
        tenant_id: &str,
        user_id: &str,
        fields: &ProfileFields,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<CrmProfile, SwitchboardError> {
        let profile = CrmProfile::manual(tenant_id, user_id, fields, admin, now);
        crm::save(&self.db, &profile).await?;
        Ok(profile)
    }

    /// Merges an AI extraction into the stored profile.
    ///
    /// Returns `None` when the merge changed nothing. A concurrent manual
    /// save between our read and write makes the write fail its condition,
    /// and the merge is redone against the new row.
    pub async fn merge_crm_extraction(
        &self,
        tenant_id: &str,
        user_id: &str,
        fields: &ProfileFields,
        now: DateTime<Utc>,
    ) -> Result<Option<CrmProfile>, SwitchboardError> {
        for _ in 0..CAS_ATTEMPTS {
            let existing = crm::get(&self.db, tenant_id, user_id).await?;
            let merged = CrmProfile::merge_extracted(existing.as_ref(), tenant_id, user_id, fields, now);
            if let Some(current) = &existing
                && current.same_fields(&merged)
            {
                return Ok(None);
            }
            let based_on = existing.as_ref().map(|p| p.updated_at);
            if crm::save_if_unchanged(&self.db, &merged, based_on).await? {
                return Ok(Some(merged));
            }
        }
        Err(SwitchboardError::Internal(format!(
            "CRM profile for {tenant_id}/{user_id} kept changing during merge"
        )))
    }

    // --- Activity ---

    pub async fn log_activity(
        &self,
        tenant_id: &str,
        entry: &NewActivity,
    ) -> Result<i64, SwitchboardError> {
        activity::append(&self.db, tenant_id, entry).await
    }

    pub async fn activity(
        &self,
        tenant_id: &str,
        filter: &ActivityFilter,
    ) -> Result<Vec<ActivityEntry>, SwitchboardError> {
        activity::query(&self.db, tenant_id, filter).await
    }

    /// Stats for every admin, or just `username` when given.
    pub async fn admin_stats(
        &self,
        tenant_id: &str,
        username: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AdminStats>, SwitchboardError> {
        let mut stats = activity::admin_stats(&self.db, tenant_id, from, to).await?;
        if let Some(username) = username {
            stats.retain(|s| s.username == username);
        }
        Ok(stats)
    }

    // --- Digest ---

    pub async fn daily_digest(
        &self,
        tenant_id: &str,
        date: NaiveDate,
        refresh: bool,
        now: DateTime<Utc>,
    ) -> Result<DailyDigest, SwitchboardError> {
        digest::get_or_compute(&self.db, tenant_id, date, refresh, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::BotState;
    use switchboard_core::crm::ProfileSource;
    use switchboard_core::records::MessageRole;

    async fn store() -> ConversationStore {
        ConversationStore::new(Database::open_in_memory().await.unwrap(), 500)
    }

    #[tokio::test]
    async fn apply_control_walks_the_state_machine() {
        let store = store().await;
        let now = Utc::now();
        store
            .get_or_create("t", "u", ChannelKind::Line, &UserProfile::default(), now)
            .await
            .unwrap();

        let escalated = store
            .apply_control("t", "u", &ControlEvent::Escalate { reason: "staff".into() }, now)
            .await
            .unwrap();
        assert_eq!(escalated.control.state, BotState::Escalated);
        assert_eq!(escalated.control_version, 1);

        let err = store
            .apply_control("t", "u", &ControlEvent::AutoPin { reason: "gap".into() }, now)
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::InvalidTransition { .. }));

        let stored = store.conversation("t", "u").await.unwrap();
        assert_eq!(stored.control.state, BotState::Escalated);
        assert_eq!(stored.control.pin_reason(), Some("staff"));
    }

    #[tokio::test]
    async fn missing_conversation_is_not_found() {
        let store = store().await;
        let err = store
            .apply_control("t", "ghost", &ControlEvent::Unpin, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::NotFound { entity: "conversation", .. }));
    }

    #[tokio::test]
    async fn extraction_never_overwrites_manual_profile() {
        let store = store().await;
        let now = Utc::now();
        let manual = ProfileFields {
            phone: Some("0811111111".into()),
            ..Default::default()
        };
        store.save_crm_manual("t", "u", &manual, "alice", now).await.unwrap();

        let extracted = ProfileFields {
            phone: Some("0999999999".into()),
            email: Some("a@example.com".into()),
            ..Default::default()
        };
        let merged = store
            .merge_crm_extraction("t", "u", &extracted, now + chrono::Duration::seconds(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged.phone.as_deref(), Some("0811111111"));
        assert_eq!(merged.email.as_deref(), Some("a@example.com"));
        assert_eq!(merged.extracted_by, ProfileSource::Manual);

        // Same extraction again is a no-op.
        let again = store
            .merge_crm_extraction("t", "u", &extracted, now + chrono::Duration::seconds(2))
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn messages_round_trip_through_facade() {
        let store = store().await;
        let now = Utc::now();
        store
            .get_or_create("t", "u", ChannelKind::Messenger, &UserProfile::default(), now)
            .await
            .unwrap();
        store
            .add_message("t", "u", &NewMessage::text(MessageRole::Customer, "hello", now))
            .await
            .unwrap();
        assert!(store.mark_read("t", "u").await.unwrap());
        let conv = store.conversation("t", "u").await.unwrap();
        assert_eq!(conv.unread_count, 0);
        assert_eq!(store.recent_messages("t", "u", 5).await.unwrap().len(), 1);
    }
}
