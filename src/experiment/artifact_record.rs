//! Artifact Record - content-addressed blobs attached to a run

use std::hash::Hasher;

use chrono::{DateTime, Utc};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

/// Prefix of content hashes produced by [`content_hash`].
pub const HASH_ALGORITHM: &str = "fxhash64";

/// Artifact Record represents a stored artifact from a run.
///
/// The blob itself is stored once per content hash; the record links it to a
/// run under a key (e.g. "model").
///
/// ## Hash Format
///
/// `algorithm:hex_digest`, e.g. `fxhash64:9c1f0e2ab3d4c5e6`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    key: String,
    content_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a record for `content` stored under `key` in run `run_id`.
    #[must_use]
    pub fn for_content(run_id: impl Into<String>, key: impl Into<String>, content: &[u8]) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            content_hash: content_hash(content),
            size_bytes: content.len() as u64,
            created_at: Utc::now(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the content hash.
    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Hex digest without the algorithm prefix, used as the blob file name.
    #[must_use]
    pub fn digest(&self) -> &str {
        self.content_hash
            .split_once(':')
            .map_or(self.content_hash.as_str(), |(_, hex)| hex)
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Content hash of a blob: FxHash over the length and the bytes.
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = FxHasher::default();
    hasher.write_u64(content.len() as u64);
    hasher.write(content);
    format!("{HASH_ALGORITHM}:{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_record_for_content() {
        let artifact = ArtifactRecord::for_content("run-1", "model", b"{\"name\":\"rf\"}");
        assert_eq!(artifact.run_id(), "run-1");
        assert_eq!(artifact.key(), "model");
        assert_eq!(artifact.size_bytes(), 13);
        assert!(artifact.content_hash().starts_with("fxhash64:"));
        assert_eq!(artifact.digest().len(), 16);
    }

    #[test]
    fn test_content_hash_is_stable_and_content_sensitive() {
        assert_eq!(content_hash(b"model"), content_hash(b"model"));
        assert_ne!(content_hash(b"model"), content_hash(b"model2"));
        assert_ne!(content_hash(b""), content_hash(b"\0"));
    }
}
