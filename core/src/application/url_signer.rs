// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! HMAC-SHA256 signed-URL minting and verification (spec §4.4).

use chrono::{Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::domain::coordination::CoordinationService;
use crate::domain::error::CoordinationError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signature does not match")]
    BadSignature,
    #[error("url has expired")]
    Expired,
    #[error("timestamp is in the future")]
    ClockSkew,
    #[error("url has already been used")]
    AlreadyUsed,
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

pub struct UrlSigner {
    secret: Vec<u8>,
    max_age: Duration,
    coordination: Arc<dyn CoordinationService>,
}

/// The components embedded in a signed URL's query string.
pub struct SignedParams {
    pub signature: String,
    pub timestamp: i64,
    pub nonce: String,
    pub user: String,
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>, max_age: Duration, coordination: Arc<dyn CoordinationService>) -> Self {
        Self { secret: secret.into(), max_age, coordination }
    }

    /// Signs `path` for `user`, returning the query string to append
    /// (without a leading `?`/`&`). The nonce is registered with the
    /// coordination service up front so `verify`'s atomic pop can tell a
    /// first use from a replay.
    pub async fn sign(&self, path: &str, user: &str) -> Result<String, SignatureError> {
        let timestamp = Utc::now().timestamp_millis();
        let nonce = Uuid::new_v4().simple().to_string();
        let signature = self.compute_signature(path, timestamp, &nonce, user);
        self.coordination
            .set_value(&format!("nonce:{nonce}"), "1", Some(self.max_age))
            .await?;
        Ok(format!("signature={signature}&timestamp={timestamp}&nonce={nonce}&user={user}"))
    }

    fn compute_signature(&self, path: &str, timestamp: i64, nonce: &str, user: &str) -> String {
        let message = format!("{path}|{timestamp}|{nonce}|{user}");
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verifies `params` against `path`, enforcing expiry, clock-skew
    /// allowance and single use. `consume_nonce = false` is the documented
    /// exception for non-final chunk-upload parts (spec §4.4).
    pub async fn verify(&self, path: &str, params: &SignedParams, consume_nonce: bool) -> Result<(), SignatureError> {
        let expected = self.compute_signature(path, params.timestamp, &params.nonce, &params.user);
        if expected.as_bytes().ct_eq(params.signature.as_bytes()).unwrap_u8() != 1 {
            return Err(SignatureError::BadSignature);
        }

        let now = Utc::now().timestamp_millis();
        let skew_allowance = ChronoDuration::seconds(5).num_milliseconds();
        if params.timestamp > now + skew_allowance {
            return Err(SignatureError::ClockSkew);
        }
        if now - params.timestamp > self.max_age.as_millis() as i64 {
            return Err(SignatureError::Expired);
        }

        if consume_nonce {
            let key = format!("nonce:{}", params.nonce);
            let popped = self.coordination.pop_value(&key).await?;
            if popped.is_none() {
                return Err(SignatureError::AlreadyUsed);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::in_memory::InMemoryCoordinationService;

    #[tokio::test]
    async fn signs_and_verifies_round_trip() {
        let coordination: Arc<dyn CoordinationService> = Arc::new(InMemoryCoordinationService::new());
        let signer = UrlSigner::new(b"secret".to_vec(), Duration::from_secs(900), coordination);
        let query = signer.sign("/api/oss/download", "alice").await.unwrap();
        let params = parse_query(&query);
        signer.verify("/api/oss/download", &params, false).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_tampered_signature() {
        let coordination: Arc<dyn CoordinationService> = Arc::new(InMemoryCoordinationService::new());
        let signer = UrlSigner::new(b"secret".to_vec(), Duration::from_secs(900), coordination);
        let query = signer.sign("/api/oss/download", "alice").await.unwrap();
        let mut params = parse_query(&query);
        params.signature = "deadbeef".to_string();
        let result = signer.verify("/api/oss/download", &params, false).await;
        assert!(matches!(result, Err(SignatureError::BadSignature)));
    }

    #[tokio::test]
    async fn download_url_is_single_use() {
        let coordination: Arc<dyn CoordinationService> = Arc::new(InMemoryCoordinationService::new());
        let signer = UrlSigner::new(b"secret".to_vec(), Duration::from_secs(900), coordination);
        let query = signer.sign("/api/oss/download", "alice").await.unwrap();
        let params = parse_query(&query);
        signer.verify("/api/oss/download", &params, true).await.unwrap();
        let result = signer.verify("/api/oss/download", &params, true).await;
        assert!(matches!(result, Err(SignatureError::AlreadyUsed)));
    }

    fn parse_query(query: &str) -> SignedParams {
        let mut signature = String::new();
        let mut timestamp = 0i64;
        let mut nonce = String::new();
        let mut user = String::new();
        for pair in query.split('&') {
            let (k, v) = pair.split_once('=').unwrap();
            match k {
                "signature" => signature = v.to_string(),
                "timestamp" => timestamp = v.parse().unwrap(),
                "nonce" => nonce = v.to_string(),
                "user" => user = v.to_string(),
                _ => {}
            }
        }
        SignedParams { signature, timestamp, nonce, user }
    }
}
