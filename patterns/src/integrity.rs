//! Content hashing for pattern integrity checks.
//!
//! The digest covers `content` only, taken as raw UTF-8 bytes with no
//! trimming or newline normalisation.

use sha2::Digest;
use sha2::Sha256;

use crate::error::PatternError;
use crate::store::PatternStore;
use crate::types::Pattern;
use crate::types::TrustLevel;

pub const MISMATCH_WARNING: &str = "hash mismatch: content may have been tampered with";

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashStatus {
    Missing,
    Mismatched,
    Ok,
}

impl HashStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HashStatus::Missing => "missing",
            HashStatus::Mismatched => "mismatched",
            HashStatus::Ok => "ok",
        }
    }
}

impl std::fmt::Display for HashStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase hex SHA-256 of `content`.
pub fn compute_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

pub fn update_hash(pattern: &mut Pattern) {
    pattern.security.content_hash = compute_hash(&pattern.content);
}

/// True only when a stored hash is present and matches `content`.
pub fn verify_hash(pattern: &Pattern) -> bool {
    classify(pattern) == HashStatus::Ok
}

pub fn classify(pattern: &Pattern) -> HashStatus {
    let stored = &pattern.security.content_hash;
    if stored.is_empty() {
        HashStatus::Missing
    } else if *stored == compute_hash(&pattern.content) {
        HashStatus::Ok
    } else {
        HashStatus::Mismatched
    }
}

/// Fetches `name` and downgrades it to untrusted if its stored hash no longer
/// matches the content. Patterns without a hash are returned untouched.
pub fn load_verified(store: &dyn PatternStore, name: &str) -> Result<Pattern, PatternError> {
    let mut pattern = store.get(name)?.ok_or_else(|| PatternError::NotFound(name.to_string()))?;
    if classify(&pattern) == HashStatus::Mismatched {
        tracing::warn!(pattern = %pattern.name, "content hash mismatch; treating as untrusted");
        pattern.security.warnings.push(MISMATCH_WARNING.to_string());
        pattern.security.trust_level = TrustLevel::Untrusted;
    }
    Ok(pattern)
}
