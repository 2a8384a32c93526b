// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel webhook endpoints.
//!
//! A delivery with a valid signature is always acknowledged with 200, even
//! when processing fails or runs out of time, so the channel does not
//! redeliver it. Failures are logged instead.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use switchboard_core::ChannelKind;
use tracing::{debug, info, warn};

use crate::server::GatewayState;

const LINE_SIGNATURE: &str = "x-line-signature";
const MESSENGER_SIGNATURE: &str = "x-hub-signature-256";

/// POST /webhook/line/{tenant}
pub async fn post_line(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    receive(&state, &tenant_id, ChannelKind::Line, LINE_SIGNATURE, &headers, &body).await
}

/// POST /webhook/messenger/{tenant}
pub async fn post_messenger(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    receive(&state, &tenant_id, ChannelKind::Messenger, MESSENGER_SIGNATURE, &headers, &body).await
}

/// GET /webhook/messenger/{tenant}
///
/// Subscription handshake: echoes `hub.challenge` when `hub.verify_token`
/// matches the tenant's configured token.
pub async fn verify_messenger(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(messenger) = state
        .tenants
        .get(&tenant_id)
        .ok()
        .and_then(|t| t.config.messenger.clone())
    else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let challenge = switchboard_messenger::signature::verify_subscription(
        &messenger.verify_token,
        params.get("hub.mode").map(String::as_str),
        params.get("hub.verify_token").map(String::as_str),
        params.get("hub.challenge").map(String::as_str),
    );
    match challenge {
        Some(challenge) => {
            info!(tenant_id = %tenant_id, "Messenger webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!(tenant_id = %tenant_id, "Messenger webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

async fn receive(
    state: &GatewayState,
    tenant_id: &str,
    kind: ChannelKind,
    signature_header: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let tenant = match state.tenants.get(tenant_id) {
        Ok(tenant) => tenant,
        Err(e) => {
            warn!(tenant_id, channel = %kind, error = %e, "webhook for unknown tenant");
            return StatusCode::NOT_FOUND.into_response();
        }
    };
    let channel = match tenant.channel(kind) {
        Ok(channel) => channel.clone(),
        Err(e) => {
            warn!(tenant_id, channel = %kind, error = %e, "webhook for unconfigured channel");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let signature = headers
        .get(signature_header)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if let Err(e) = channel.verify_signature(body, signature) {
        warn!(tenant_id, channel = %kind, error = %e, "webhook signature rejected");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let events = match channel.parse_events(tenant_id, body) {
        Ok(events) => events,
        Err(e) => {
            warn!(tenant_id, channel = %kind, error = %e, "unparseable webhook body acknowledged");
            return StatusCode::OK.into_response();
        }
    };

    let count = events.len();
    let work = async {
        for event in events {
            let user_id = event.external_user_id.clone();
            match state.orchestrator.handle_event(&tenant, event).await {
                Ok(outcome) => debug!(tenant_id, user_id = %user_id, outcome = ?outcome, "event handled"),
                Err(e) => warn!(tenant_id, user_id = %user_id, error = %e, "event processing failed"),
            }
        }
    };
    if tokio::time::timeout(state.webhook_budget, work).await.is_err() {
        warn!(
            tenant_id,
            channel = %kind,
            events = count,
            budget_ms = state.webhook_budget.as_millis() as u64,
            "webhook budget exhausted, acknowledging anyway"
        );
    }
    StatusCode::OK.into_response()
}
