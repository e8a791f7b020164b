//! HMAC-signed retrieval URLs for backends without native presigning.
//!
//! Signature = base64url(HMAC-SHA256(secret, "{key}\n{expires}")), where `expires`
//! is a unix timestamp in seconds. The URL carries both as query parameters:
//! `{base_url}/{key}?expires={expires}&sig={signature}`.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature does not match")]
    Invalid,
    #[error("Signed URL has expired")]
    Expired,
}

/// Mints and verifies signed URLs with a shared secret.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> StorageResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(StorageError::ConfigError(
                "URL signing secret must not be empty".to_string(),
            ));
        }
        Ok(Self { secret })
    }

    fn mac(&self, storage_key: &str, expires: u64) -> StorageResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;
        mac.update(storage_key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Sign `storage_key` until the absolute unix time `expires`.
    pub fn sign(&self, storage_key: &str, expires: u64) -> StorageResult<String> {
        let tag = self.mac(storage_key, expires)?.finalize().into_bytes();
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(tag))
    }

    /// Build a full URL valid for `ttl` from now.
    pub fn signed_url(&self, base_url: &str, storage_key: &str, ttl: Duration) -> StorageResult<String> {
        let expires = unix_now().saturating_add(ttl.as_secs());
        let sig = self.sign(storage_key, expires)?;
        Ok(format!(
            "{}/{}?expires={}&sig={}",
            base_url.trim_end_matches('/'),
            storage_key,
            expires,
            sig
        ))
    }

    /// Verify a signature against the current clock.
    pub fn verify(&self, storage_key: &str, expires: u64, sig: &str) -> Result<(), SignatureError> {
        self.verify_at(storage_key, expires, sig, unix_now())
    }

    /// Verify a signature as of `now` (unix seconds).
    pub fn verify_at(
        &self,
        storage_key: &str,
        expires: u64,
        sig: &str,
        now: u64,
    ) -> Result<(), SignatureError> {
        let tag = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(sig)
            .map_err(|_| SignatureError::Invalid)?;
        let mac = self
            .mac(storage_key, expires)
            .map_err(|_| SignatureError::Invalid)?;
        mac.verify_slice(&tag).map_err(|_| SignatureError::Invalid)?;

        if now > expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new("0123456789abcdef0123456789abcdef").unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let s = signer();
        let sig = s.sign("media/ab/x.png", 2_000).unwrap();
        assert_eq!(s.verify_at("media/ab/x.png", 2_000, &sig, 1_000), Ok(()));
    }

    #[test]
    fn test_expired() {
        let s = signer();
        let sig = s.sign("media/ab/x.png", 2_000).unwrap();
        assert_eq!(
            s.verify_at("media/ab/x.png", 2_000, &sig, 2_001),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_tampered_key_or_expiry() {
        let s = signer();
        let sig = s.sign("media/ab/x.png", 2_000).unwrap();
        assert_eq!(
            s.verify_at("media/ab/y.png", 2_000, &sig, 1_000),
            Err(SignatureError::Invalid)
        );
        assert_eq!(
            s.verify_at("media/ab/x.png", 9_999, &sig, 1_000),
            Err(SignatureError::Invalid)
        );
        assert_eq!(
            s.verify_at("media/ab/x.png", 2_000, "not base64!", 1_000),
            Err(SignatureError::Invalid)
        );
    }

    #[test]
    fn test_different_secret_rejected() {
        let sig = signer().sign("k", 2_000).unwrap();
        let other = UrlSigner::new("another-secret-another-secret-xx").unwrap();
        assert_eq!(other.verify_at("k", 2_000, &sig, 1_000), Err(SignatureError::Invalid));
    }

    #[test]
    fn test_signed_url_shape() {
        let url = signer()
            .signed_url("http://localhost:8080/media/", "media/ab/x.png", Duration::from_secs(60))
            .unwrap();
        assert!(url.starts_with("http://localhost:8080/media/media/ab/x.png?expires="));
        assert!(url.contains("&sig="));
    }

    #[test]
    fn test_fresh_urls_each_call() {
        let s = signer();
        let a = s.signed_url("http://h", "k", Duration::from_secs(60)).unwrap();
        let b = s.signed_url("http://h", "k", Duration::from_secs(120)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(UrlSigner::new(Vec::new()).is_err());
    }
}
