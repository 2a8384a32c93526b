// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::State,
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use serde::Serialize;
use switchboard_core::SwitchboardError;
use switchboard_orchestrator::Orchestrator;
use switchboard_orchestrator::tenant::TenantDirectory;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::{review, webhooks};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Orchestrator,
    pub tenants: Arc<TenantDirectory>,
    pub auth: AuthConfig,
    /// Wall-clock budget for handling one webhook delivery.
    pub webhook_budget: Duration,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Response body for GET /v1/health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub tenants: usize,
}

/// GET /v1/health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        tenants: state.tenants.len(),
    })
}

/// Builds the full route table.
///
/// - `GET /v1/health` (public)
/// - `POST /webhook/line/{tenant}`, `POST|GET /webhook/messenger/{tenant}`
///   (channel signature, no bearer token)
/// - `/v1/tenants/{tenant}/...` review API (bearer token)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/v1/health", get(get_health))
        .route("/webhook/line/{tenant}", post(webhooks::post_line))
        .route(
            "/webhook/messenger/{tenant}",
            post(webhooks::post_messenger).get(webhooks::verify_messenger),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/tenants/{tenant}/conversations", get(review::list_conversations))
        .route(
            "/v1/tenants/{tenant}/conversations/{user}",
            get(review::get_conversation).delete(review::delete_conversation),
        )
        .route("/v1/tenants/{tenant}/conversations/{user}/messages", get(review::list_messages))
        .route("/v1/tenants/{tenant}/conversations/{user}/send", post(review::send_message))
        .route("/v1/tenants/{tenant}/conversations/{user}/bot", post(review::set_bot))
        .route(
            "/v1/tenants/{tenant}/conversations/{user}/pin",
            post(review::pin).delete(review::unpin),
        )
        .route("/v1/tenants/{tenant}/conversations/{user}/assign", post(review::assign))
        .route("/v1/tenants/{tenant}/conversations/{user}/read", post(review::mark_read))
        .route(
            "/v1/tenants/{tenant}/conversations/{user}/corrections",
            post(review::record_correction),
        )
        .route(
            "/v1/tenants/{tenant}/conversations/{user}/followup",
            delete(review::dismiss_followup),
        )
        .route("/v1/tenants/{tenant}/followups", get(review::list_followups))
        .route(
            "/v1/tenants/{tenant}/crm/{user}",
            get(review::get_crm).put(review::save_crm),
        )
        .route("/v1/tenants/{tenant}/activity", get(review::list_activity))
        .route("/v1/tenants/{tenant}/admins/{username}/stats", get(review::admin_stats))
        .route("/v1/tenants/{tenant}/learned/{kind}", get(review::list_learned))
        .route(
            "/v1/tenants/{tenant}/learned/{kind}/{id}/enabled",
            post(review::set_learned_enabled),
        )
        .route("/v1/tenants/{tenant}/learned/{kind}/{id}", delete(review::delete_learned))
        .route("/v1/tenants/{tenant}/misses", get(review::list_misses))
        .route("/v1/tenants/{tenant}/qa", get(review::list_qa))
        .route("/v1/tenants/{tenant}/qa/{id}/review", post(review::review_qa))
        .route("/v1/tenants/{tenant}/digest/{date}", get(review::digest))
        .route("/v1/tenants/{tenant}/usage/daily", get(review::usage_daily))
        .route("/v1/tenants/{tenant}/usage/totals", get(review::usage_totals))
        .route("/v1/tenants/{tenant}/usage/recent", get(review::usage_recent))
        .route("/v1/tenants/{tenant}/bot", post(review::set_tenant_bot))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// Serves the gateway until `shutdown` is cancelled.
///
/// In-flight requests finish before this returns.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), SwitchboardError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwitchboardError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| SwitchboardError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server stopped");
    Ok(())
}
