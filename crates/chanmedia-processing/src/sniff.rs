//! Content fingerprinting and MIME sniffing.
//!
//! Classification looks only at magic bytes. Client-declared content types and
//! filename extensions never reach this module.

use std::collections::HashSet;

use bytes::Bytes;
use chanmedia_core::constants::DEFAULT_ALLOWED_MIME_TYPES;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SniffError {
    #[error("Unrecognized file signature")]
    Unrecognized,

    #[error("File type not allowed: {0}")]
    Disallowed(String),

    #[error("Digest computation failed: {0}")]
    Digest(String),
}

/// Identity and true type of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Lowercase hex SHA-256
    pub digest: String,
    pub mime_type: String,
}

/// Hex SHA-256 of `data`.
pub fn content_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Magic-byte classifier bound to an allow-list.
#[derive(Debug, Clone)]
pub struct Sniffer {
    allowed: HashSet<String>,
}

impl Default for Sniffer {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_MIME_TYPES.iter().copied())
    }
}

impl Sniffer {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|m| m.as_ref().trim().to_ascii_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn is_allowed(&self, mime_type: &str) -> bool {
        self.allowed.contains(&mime_type.to_ascii_lowercase())
    }

    /// Sniff the MIME type and check it against the allow-list.
    pub fn classify(&self, data: &[u8]) -> Result<&'static str, SniffError> {
        let kind = infer::get(data).ok_or(SniffError::Unrecognized)?;
        let mime_type = kind.mime_type();
        if !self.is_allowed(mime_type) {
            return Err(SniffError::Disallowed(mime_type.to_string()));
        }
        Ok(mime_type)
    }

    /// Classify, then hash. A disallowed payload is never hashed.
    ///
    /// Hashing runs on the blocking pool so large uploads do not stall the runtime.
    pub async fn sniff(&self, data: Bytes) -> Result<Fingerprint, SniffError> {
        let mime_type = self.classify(&data)?;
        let digest = tokio::task::spawn_blocking(move || content_digest(&data))
            .await
            .map_err(|e| SniffError::Digest(e.to_string()))?;

        Ok(Fingerprint {
            digest,
            mime_type: mime_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn elf_binary() -> Vec<u8> {
        let mut data = vec![0x7F, b'E', b'L', b'F', 2, 1, 1, 0];
        data.resize(128, 0);
        data
    }

    #[test]
    fn test_content_digest_known_value() {
        assert_eq!(
            content_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_classify_png() {
        let sniffer = Sniffer::default();
        assert_eq!(sniffer.classify(PNG_MAGIC), Ok("image/png"));
    }

    #[test]
    fn test_executable_rejected() {
        let sniffer = Sniffer::default();
        assert!(matches!(
            sniffer.classify(&elf_binary()),
            Err(SniffError::Disallowed(_))
        ));
    }

    #[test]
    fn test_unknown_bytes_rejected() {
        let sniffer = Sniffer::default();
        assert_eq!(
            sniffer.classify(b"just some text"),
            Err(SniffError::Unrecognized)
        );
        assert_eq!(sniffer.classify(b""), Err(SniffError::Unrecognized));
    }

    #[test]
    fn test_custom_allow_list() {
        let sniffer = Sniffer::new(["IMAGE/PNG"]);
        assert!(sniffer.is_allowed("image/png"));
        assert!(!sniffer.is_allowed("image/jpeg"));
    }

    #[tokio::test]
    async fn test_sniff_is_pure_function_of_bytes() {
        let sniffer = Sniffer::default();
        let a = sniffer.sniff(Bytes::from_static(PNG_MAGIC)).await.unwrap();
        let b = sniffer.sniff(Bytes::copy_from_slice(PNG_MAGIC)).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.mime_type, "image/png");
        assert_eq!(a.digest, content_digest(PNG_MAGIC));
        assert_eq!(a.digest.len(), 64);
    }

    #[tokio::test]
    async fn test_sniff_disallowed_never_hashes() {
        let sniffer = Sniffer::new(["image/jpeg"]);
        let err = sniffer.sniff(Bytes::from_static(PNG_MAGIC)).await.unwrap_err();
        assert_eq!(err, SniffError::Disallowed("image/png".to_string()));
    }
}
