// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HS256 bearer tokens for service accounts.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Identity claims carried by both service-account bearer tokens and the
/// IdP access tokens resolved from the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub name: String,
    pub preferred_username: String,
    pub email: String,
    /// Issuer
    pub iss: String,
    /// Expiration time, epoch seconds
    pub exp: i64,
    /// Issued at, epoch seconds
    pub iat: i64,
}

/// Mints and verifies the server's own HS256 bearer tokens.
///
/// Tokens are self-issued with `iss` set to the external base URL, so a
/// leaked IdP token can never pass as a service-account token.
pub struct BearerTokenAuth {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl BearerTokenAuth {
    pub fn new(issuer: impl Into<String>, secret: &str) -> Self {
        Self {
            issuer: issuer.into(),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Verify a bearer token: signature, expiry, and issuer, with `exp`,
    /// `iat`, and `iss` all required to be present.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);
        let data = decode::<AccessClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Mint a token for a service account.
    pub fn create_token(
        &self,
        username: &str,
        name: &str,
        email: &str,
        expiration: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = AccessClaims {
            name: name.to_string(),
            preferred_username: username.to_string(),
            email: email.to_string(),
            iss: self.issuer.clone(),
            exp: expiration.timestamp(),
            iat: Utc::now().timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }
}

/// Parse identity claims from an IdP access token without checking its
/// signature. Only valid after the token was introspected against the
/// userinfo endpoint; that round-trip is the verification.
pub fn decode_unverified(token: &str) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.set_required_spec_claims(&["exp", "iat", "iss"]);
    let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}
