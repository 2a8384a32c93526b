// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `x-line-signature` verification: base64(HMAC-SHA256(channel_secret, body)).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use switchboard_core::SwitchboardError;

/// Verifies in constant time.
pub fn verify(channel_secret: &str, body: &[u8], signature: &str) -> Result<(), SwitchboardError> {
    let expected = STANDARD
        .decode(signature.trim())
        .map_err(|e| SwitchboardError::Signature(format!("signature is not base64: {e}")))?;
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes())
        .map_err(|e| SwitchboardError::Signature(format!("invalid channel secret: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SwitchboardError::Signature("x-line-signature mismatch".into()))
}

/// Computes the header value for `body`. Used by tests and local tooling.
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => return String::new(),
    };
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_tamper() {
        let body = br#"{"events":[]}"#;
        let sig = sign("secret", body);
        assert!(verify("secret", body, &sig).is_ok());
        assert!(verify("other", body, &sig).is_err());
        assert!(verify("secret", b"{\"events\":[1]}", &sig).is_err());
        assert!(matches!(
            verify("secret", body, "%%%"),
            Err(SwitchboardError::Signature(_))
        ));
    }
}
