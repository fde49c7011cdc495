// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Timed, tamper-evident session cookie values.
//!
//! A session value is `payload.timestamp.signature`, each segment base64url
//! without padding; the signature is HMAC-SHA256 over the first two
//! segments. Verification checks the signature in constant time and then
//! the embedded timestamp against the configured max age.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Errors from unsealing a session value.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The value is not three base64url segments.
    #[error("malformed session value")]
    Malformed,

    /// The signature does not match.
    #[error("session signature mismatch")]
    BadSignature,

    /// The value is older than the allowed max age.
    #[error("session expired {age_secs}s ago (max {max_age_secs}s)")]
    Expired { age_secs: i64, max_age_secs: i64 },
}

/// Signs and verifies session cookie values with a shared secret.
pub struct SessionSerializer {
    secret: Vec<u8>,
    max_age_secs: i64,
}

impl SessionSerializer {
    pub fn new(secret: &str, max_age_secs: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            max_age_secs: max_age_secs as i64,
        }
    }

    fn mac(&self, signed_part: &str) -> HmacSha256 {
        // HMAC accepts keys of any length, so new_from_slice cannot fail.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
        mac.update(signed_part.as_bytes());
        mac
    }

    /// Seal a value, stamping it with the current time.
    pub fn sign(&self, value: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(value.as_bytes());
        let timestamp = URL_SAFE_NO_PAD.encode(Utc::now().timestamp().to_string().as_bytes());
        let signed_part = format!("{payload}.{timestamp}");
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&signed_part).finalize().into_bytes());
        format!("{signed_part}.{signature}")
    }

    /// Unseal a value, enforcing signature and max age.
    pub fn verify(&self, token: &str) -> Result<String, SessionError> {
        let (signed_part, signature) = token.rsplit_once('.').ok_or(SessionError::Malformed)?;
        let (payload, timestamp) = signed_part
            .rsplit_once('.')
            .ok_or(SessionError::Malformed)?;

        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::Malformed)?;
        // verify_slice is a constant-time comparison.
        self.mac(signed_part)
            .verify_slice(&signature_bytes)
            .map_err(|_| SessionError::BadSignature)?;

        let timestamp_bytes = URL_SAFE_NO_PAD
            .decode(timestamp)
            .map_err(|_| SessionError::Malformed)?;
        let issued_at: i64 = String::from_utf8(timestamp_bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(SessionError::Malformed)?;

        let age_secs = Utc::now().timestamp() - issued_at;
        if age_secs > self.max_age_secs {
            return Err(SessionError::Expired {
                age_secs: age_secs - self.max_age_secs,
                max_age_secs: self.max_age_secs,
            });
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SessionError::Malformed)?;
        String::from_utf8(payload_bytes).map_err(|_| SessionError::Malformed)
    }
}
