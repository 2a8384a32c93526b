// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `x-hub-signature-256` verification and the subscription handshake.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use switchboard_core::SwitchboardError;

/// Verifies a `sha256=<hex>` header against HMAC-SHA256(app_secret, body).
pub fn verify(app_secret: &str, body: &[u8], header: &str) -> Result<(), SwitchboardError> {
    let digest = header
        .trim()
        .strip_prefix("sha256=")
        .ok_or_else(|| SwitchboardError::Signature("signature must use sha256=<hex> format".into()))?;
    let expected = hex::decode(digest)
        .map_err(|e| SwitchboardError::Signature(format!("signature is not hex: {e}")))?;
    let mut mac = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes())
        .map_err(|e| SwitchboardError::Signature(format!("invalid app secret: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SwitchboardError::Signature("x-hub-signature-256 mismatch".into()))
}

pub fn sign(app_secret: &str, body: &[u8]) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Answers `GET` subscription checks. Returns the challenge to echo when
/// the mode is `subscribe` and the token matches.
pub fn verify_subscription(
    expected_token: &str,
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
) -> Option<String> {
    match (mode, token, challenge) {
        (Some("subscribe"), Some(token), Some(challenge))
            if !expected_token.is_empty() && !challenge.is_empty() && token == expected_token =>
        {
            Some(challenge.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_signed_body() {
        let body = br#"{"object":"page","entry":[]}"#;
        let header = sign("app-secret", body);
        assert!(header.starts_with("sha256="));
        assert!(verify("app-secret", body, &header).is_ok());
        assert!(verify("wrong", body, &header).is_err());
    }

    #[test]
    fn rejects_malformed_headers() {
        let body = b"{}";
        assert!(verify("s", body, "deadbeef").is_err());
        assert!(verify("s", body, "sha256=zz").is_err());
        assert!(verify("s", body, "sha256=deadbeef").is_err());
    }

    #[test]
    fn subscription_handshake() {
        assert_eq!(
            verify_subscription("vt", Some("subscribe"), Some("vt"), Some("42")),
            Some("42".to_string())
        );
        assert_eq!(verify_subscription("vt", Some("subscribe"), Some("nope"), Some("42")), None);
        assert_eq!(verify_subscription("vt", Some("unsubscribe"), Some("vt"), Some("42")), None);
        assert_eq!(verify_subscription("", Some("subscribe"), Some(""), Some("42")), None);
    }
}
