// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token middleware for the review API.
//!
//! When no admin token is configured every request is rejected.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Authentication configuration for the review API.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` disables the review API.
    pub admin_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Compares without short-circuiting on the first differing byte.
fn tokens_match(given: &str, expected: &str) -> bool {
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = auth.admin_token.as_deref() else {
        tracing::error!("review API has no admin token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let given = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match given {
        Some(token) if tokens_match(token, expected) => Ok(next.run(request).await),
        _ => {
            tracing::debug!(path = %request.uri().path(), "review API request rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
