// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal review API consumed by the admin dashboard.
//!
//! Every route lives under `/v1/tenants/{tenant}`. Mutations name the acting
//! admin, which is recorded in the activity log.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use switchboard_core::SwitchboardError;
use switchboard_core::crm::{CrmProfile, ProfileFields};
use switchboard_core::records::{
    ActivityEntry, AdminAction, AdminStats, Conversation, DailyAggregate, DailyDigest, FollowUp,
    LearnedEntry, LearnedKind, Message, MissEntry, QaLogEntry, ReviewStatus, UsageEntry,
    UsageTotals,
};
use switchboard_orchestrator::admin::{AdminMessage, CorrectionInput};
use switchboard_orchestrator::tenant::TenantContext;
use switchboard_storage::{ActivityFilter, ConversationFilter};

use crate::error::{ApiError, ApiResult};
use crate::server::GatewayState;

const DEFAULT_PAGE: u32 = 50;
const MAX_PAGE: u32 = 500;

fn page(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
}

fn tenant(state: &GatewayState, tenant_id: &str) -> Result<Arc<TenantContext>, ApiError> {
    Ok(state.tenants.get(tenant_id)?)
}

fn admin_name(admin: &str) -> Result<&str, ApiError> {
    let admin = admin.trim();
    if admin.is_empty() {
        return Err(ApiError::invalid("`admin` must name the acting admin"));
    }
    Ok(admin)
}

fn learned_kind(kind: &str) -> Result<LearnedKind, ApiError> {
    kind.parse()
        .map_err(|_| ApiError::invalid(format!("unknown learned kind `{kind}`")))
}

/// Acknowledgment for mutations without a richer result.
#[derive(Debug, Serialize)]
pub struct Done {
    pub ok: bool,
}

const DONE: Done = Done { ok: true };

#[derive(Debug, Serialize)]
pub struct Created {
    pub id: i64,
}

/// `?admin=` for mutations without a body.
#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    pub admin: String,
}

// --- Conversations ---

#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
    pub pinned: Option<bool>,
    pub assigned: Option<String>,
}

/// GET conversations
pub async fn list_conversations(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
    Query(q): Query<ConversationQuery>,
) -> ApiResult<Vec<Conversation>> {
    let tenant = tenant(&state, &tenant_id)?;
    let filter = ConversationFilter {
        pinned: q.pinned,
        assigned_admin: q.assigned,
        limit: page(q.limit),
        offset: q.offset,
    };
    Ok(Json(
        state
            .orchestrator
            .store()
            .list_conversations(tenant.id(), &filter)
            .await?,
    ))
}

/// GET conversations/{user}
pub async fn get_conversation(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
) -> ApiResult<Conversation> {
    let tenant = tenant(&state, &tenant_id)?;
    Ok(Json(
        state
            .orchestrator
            .store()
            .conversation(tenant.id(), &user_id)
            .await?,
    ))
}

/// DELETE conversations/{user}?admin=
pub async fn delete_conversation(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Query(q): Query<AdminQuery>,
) -> ApiResult<Done> {
    let tenant = tenant(&state, &tenant_id)?;
    state
        .orchestrator
        .delete_conversation(tenant.id(), &user_id, admin_name(&q.admin)?, Utc::now())
        .await?;
    Ok(Json(DONE))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<u32>,
    /// Page backwards from this sequence number.
    pub before: Option<i64>,
}

/// GET conversations/{user}/messages, oldest first.
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Query(q): Query<MessagesQuery>,
) -> ApiResult<Vec<Message>> {
    let tenant = tenant(&state, &tenant_id)?;
    let store = state.orchestrator.store();
    store.conversation(tenant.id(), &user_id).await?;
    Ok(Json(
        store
            .messages_before(tenant.id(), &user_id, q.before, page(q.limit))
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub admin: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub seq: i64,
}

/// POST conversations/{user}/send
pub async fn send_message(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Json(body): Json<SendRequest>,
) -> ApiResult<SendResponse> {
    let tenant = tenant(&state, &tenant_id)?;
    let message = AdminMessage {
        text: body.text,
        media_url: body.media_url,
    };
    let seq = state
        .orchestrator
        .admin_send(&tenant, &user_id, admin_name(&body.admin)?, message, Utc::now())
        .await?;
    Ok(Json(SendResponse { seq }))
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub admin: String,
    pub enabled: bool,
}

/// POST conversations/{user}/bot
pub async fn set_bot(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Json(body): Json<ToggleRequest>,
) -> ApiResult<Conversation> {
    let tenant = tenant(&state, &tenant_id)?;
    Ok(Json(
        state
            .orchestrator
            .set_bot(tenant.id(), &user_id, admin_name(&body.admin)?, body.enabled, Utc::now())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct PinRequest {
    pub admin: String,
    #[serde(default)]
    pub reason: String,
}

/// POST conversations/{user}/pin
pub async fn pin(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Json(body): Json<PinRequest>,
) -> ApiResult<Conversation> {
    let tenant = tenant(&state, &tenant_id)?;
    let reason = match body.reason.trim() {
        "" => "pinned by admin",
        reason => reason,
    };
    Ok(Json(
        state
            .orchestrator
            .pin(tenant.id(), &user_id, admin_name(&body.admin)?, reason, Utc::now())
            .await?,
    ))
}

/// DELETE conversations/{user}/pin?admin=
pub async fn unpin(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Query(q): Query<AdminQuery>,
) -> ApiResult<Conversation> {
    let tenant = tenant(&state, &tenant_id)?;
    Ok(Json(
        state
            .orchestrator
            .unpin(tenant.id(), &user_id, admin_name(&q.admin)?, Utc::now())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub admin: String,
    /// `None` unassigns.
    #[serde(default)]
    pub assignee: Option<String>,
}

/// POST conversations/{user}/assign
pub async fn assign(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Json(body): Json<AssignRequest>,
) -> ApiResult<Conversation> {
    let tenant = tenant(&state, &tenant_id)?;
    let assignee = body.assignee.filter(|a| !a.trim().is_empty());
    Ok(Json(
        state
            .orchestrator
            .assign(tenant.id(), &user_id, admin_name(&body.admin)?, assignee, Utc::now())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    pub admin: String,
}

/// POST conversations/{user}/read
pub async fn mark_read(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Json(body): Json<AdminRequest>,
) -> ApiResult<Done> {
    let tenant = tenant(&state, &tenant_id)?;
    state
        .orchestrator
        .mark_read(tenant.id(), &user_id, admin_name(&body.admin)?, Utc::now())
        .await?;
    Ok(Json(DONE))
}

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    pub admin: String,
    pub question: String,
    #[serde(default)]
    pub bot_answer: String,
    pub admin_answer: String,
}

/// POST conversations/{user}/corrections
pub async fn record_correction(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Json(body): Json<CorrectionRequest>,
) -> ApiResult<Created> {
    let tenant = tenant(&state, &tenant_id)?;
    let admin = admin_name(&body.admin)?.to_string();
    let input = CorrectionInput {
        user_id: Some(user_id),
        question: body.question,
        bot_answer: body.bot_answer,
        admin_answer: body.admin_answer,
    };
    let id = state
        .orchestrator
        .record_correction(&tenant, &admin, input, Utc::now())
        .await?;
    Ok(Json(Created { id }))
}

#[derive(Debug, Serialize)]
pub struct Dismissed {
    pub dismissed: bool,
}

/// DELETE conversations/{user}/followup?admin=
pub async fn dismiss_followup(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Query(q): Query<AdminQuery>,
) -> ApiResult<Dismissed> {
    let tenant = tenant(&state, &tenant_id)?;
    let dismissed = state
        .orchestrator
        .dismiss_followup(tenant.id(), &user_id, admin_name(&q.admin)?, Utc::now())
        .await?;
    Ok(Json(Dismissed { dismissed }))
}

/// GET followups
pub async fn list_followups(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Vec<FollowUp>> {
    let tenant = tenant(&state, &tenant_id)?;
    Ok(Json(
        state.orchestrator.store().pending_followups(tenant.id()).await?,
    ))
}

// --- CRM ---

/// GET crm/{user}
pub async fn get_crm(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
) -> ApiResult<CrmProfile> {
    let tenant = tenant(&state, &tenant_id)?;
    state
        .orchestrator
        .store()
        .crm_profile(tenant.id(), &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError(SwitchboardError::NotFound {
                entity: "crm profile",
                id: user_id,
            })
        })
}

#[derive(Debug, Deserialize)]
pub struct CrmSaveRequest {
    pub admin: String,
    #[serde(flatten)]
    pub fields: ProfileFields,
}

/// PUT crm/{user}
pub async fn save_crm(
    State(state): State<GatewayState>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Json(body): Json<CrmSaveRequest>,
) -> ApiResult<CrmProfile> {
    let tenant = tenant(&state, &tenant_id)?;
    Ok(Json(
        state
            .orchestrator
            .save_crm(tenant.id(), &user_id, admin_name(&body.admin)?, &body.fields, Utc::now())
            .await?,
    ))
}

// --- Activity ---

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub username: Option<String>,
    pub action: Option<AdminAction>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

/// GET activity, newest first.
pub async fn list_activity(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
    Query(q): Query<ActivityQuery>,
) -> ApiResult<Vec<ActivityEntry>> {
    let tenant = tenant(&state, &tenant_id)?;
    let filter = ActivityFilter {
        from: q.from,
        to: q.to,
        username: q.username,
        action: q.action,
        limit: page(q.limit),
        offset: q.offset,
    };
    Ok(Json(
        state.orchestrator.store().activity(tenant.id(), &filter).await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// GET admins/{username}/stats; defaults to the last seven days.
pub async fn admin_stats(
    State(state): State<GatewayState>,
    Path((tenant_id, username)): Path<(String, String)>,
    Query(q): Query<RangeQuery>,
) -> ApiResult<AdminStats> {
    let tenant = tenant(&state, &tenant_id)?;
    let to = q.to.unwrap_or_else(Utc::now);
    let from = q.from.unwrap_or(to - Duration::days(7));
    if from >= to {
        return Err(ApiError::invalid("`from` must be before `to`"));
    }
    let stats = state
        .orchestrator
        .store()
        .admin_stats(tenant.id(), Some(&username), from, to)
        .await?
        .into_iter()
        .next()
        .unwrap_or_else(|| AdminStats {
            username,
            ..Default::default()
        });
    Ok(Json(stats))
}

// --- Learning ---

/// GET learned/{kind}
pub async fn list_learned(
    State(state): State<GatewayState>,
    Path((tenant_id, kind)): Path<(String, String)>,
) -> ApiResult<Vec<LearnedEntry>> {
    let tenant = tenant(&state, &tenant_id)?;
    let kind = learned_kind(&kind)?;
    Ok(Json(
        state
            .orchestrator
            .learned()
            .list(tenant.id(), kind, Utc::now())
            .await?,
    ))
}

/// POST learned/{kind}/{id}/enabled
pub async fn set_learned_enabled(
    State(state): State<GatewayState>,
    Path((tenant_id, kind, id)): Path<(String, String, String)>,
    Json(body): Json<ToggleRequest>,
) -> ApiResult<Done> {
    let tenant = tenant(&state, &tenant_id)?;
    let kind = learned_kind(&kind)?;
    state
        .orchestrator
        .set_learned_enabled(tenant.id(), admin_name(&body.admin)?, kind, &id, body.enabled, Utc::now())
        .await?;
    Ok(Json(DONE))
}

/// DELETE learned/{kind}/{id}?admin=
pub async fn delete_learned(
    State(state): State<GatewayState>,
    Path((tenant_id, kind, id)): Path<(String, String, String)>,
    Query(q): Query<AdminQuery>,
) -> ApiResult<Done> {
    let tenant = tenant(&state, &tenant_id)?;
    let kind = learned_kind(&kind)?;
    state
        .orchestrator
        .delete_learned(tenant.id(), admin_name(&q.admin)?, kind, &id, Utc::now())
        .await?;
    Ok(Json(DONE))
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

/// GET misses, most frequent first.
pub async fn list_misses(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<MissEntry>> {
    let tenant = tenant(&state, &tenant_id)?;
    Ok(Json(
        state
            .orchestrator
            .misses()
            .top(tenant.id(), page(q.limit), Utc::now())
            .await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct QaQuery {
    pub status: Option<ReviewStatus>,
    pub limit: Option<u32>,
}

/// GET qa
pub async fn list_qa(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
    Query(q): Query<QaQuery>,
) -> ApiResult<Vec<QaLogEntry>> {
    let tenant = tenant(&state, &tenant_id)?;
    Ok(Json(
        state
            .orchestrator
            .qa()
            .list(tenant.id(), q.status, page(q.limit))
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub admin: String,
    pub status: ReviewStatus,
}

/// POST qa/{id}/review
pub async fn review_qa(
    State(state): State<GatewayState>,
    Path((tenant_id, id)): Path<(String, i64)>,
    Json(body): Json<ReviewRequest>,
) -> ApiResult<Done> {
    let tenant = tenant(&state, &tenant_id)?;
    state
        .orchestrator
        .review_qa(tenant.id(), admin_name(&body.admin)?, id, body.status, Utc::now())
        .await?;
    Ok(Json(DONE))
}

// --- Digest and usage ---

#[derive(Debug, Default, Deserialize)]
pub struct DigestQuery {
    #[serde(default)]
    pub refresh: bool,
}

/// GET digest/{date}
pub async fn digest(
    State(state): State<GatewayState>,
    Path((tenant_id, date)): Path<(String, String)>,
    Query(q): Query<DigestQuery>,
) -> ApiResult<DailyDigest> {
    let tenant = tenant(&state, &tenant_id)?;
    let date: NaiveDate = date
        .parse()
        .map_err(|_| ApiError::invalid(format!("`{date}` is not a YYYY-MM-DD date")))?;
    Ok(Json(
        state
            .orchestrator
            .store()
            .daily_digest(tenant.id(), date, q.refresh, Utc::now())
            .await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET usage/daily; defaults to the last 30 days.
pub async fn usage_daily(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
    Query(q): Query<DateRangeQuery>,
) -> ApiResult<Vec<DailyAggregate>> {
    let tenant = tenant(&state, &tenant_id)?;
    let to = q.to.unwrap_or_else(|| Utc::now().date_naive());
    let from = q.from.unwrap_or(to - Duration::days(30));
    if from > to {
        return Err(ApiError::invalid("`from` must not be after `to`"));
    }
    Ok(Json(
        state.orchestrator.ledger().daily(tenant.id(), from, to).await?,
    ))
}

/// GET usage/totals
pub async fn usage_totals(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<UsageTotals> {
    let tenant = tenant(&state, &tenant_id)?;
    Ok(Json(state.orchestrator.ledger().totals(tenant.id()).await?))
}

/// GET usage/recent, newest first.
pub async fn usage_recent(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<UsageEntry>> {
    let tenant = tenant(&state, &tenant_id)?;
    Ok(Json(
        state
            .orchestrator
            .ledger()
            .recent(tenant.id(), page(q.limit))
            .await?,
    ))
}

/// POST bot (tenant-wide switch)
pub async fn set_tenant_bot(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
    Json(body): Json<ToggleRequest>,
) -> ApiResult<Done> {
    let tenant = tenant(&state, &tenant_id)?;
    state
        .orchestrator
        .set_tenant_bot(tenant.id(), admin_name(&body.admin)?, body.enabled, Utc::now())
        .await?;
    Ok(Json(DONE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        assert_eq!(page(None), DEFAULT_PAGE);
        assert_eq!(page(Some(0)), 1);
        assert_eq!(page(Some(10_000)), MAX_PAGE);
    }

    #[test]
    fn admin_name_must_not_be_blank() {
        assert!(admin_name("  ").is_err());
        assert_eq!(admin_name(" alice ").unwrap(), "alice");
    }

    #[test]
    fn learned_kind_parses_lowercase() {
        assert_eq!(learned_kind("intent").unwrap(), LearnedKind::Intent);
        assert!(learned_kind("recipe").is_err());
    }

    #[test]
    fn crm_save_request_flattens_fields() {
        let body: CrmSaveRequest =
            serde_json::from_str(r#"{"admin": "alice", "name": "Nok", "tags": ["vip"]}"#).unwrap();
        assert_eq!(body.admin, "alice");
        assert_eq!(body.fields.name.as_deref(), Some("Nok"));
        assert_eq!(body.fields.tags, vec!["vip".to_string()]);
    }
}
