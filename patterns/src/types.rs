use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_yaml::Value;

/// Current on-disk schema version written by the store.
pub const SCHEMA_VERSION: u32 = 2;

/// Inferred tags at or above this confidence count as confirmed for display
/// and filtering.
pub const CONFIDENT_INFERENCE: f64 = 0.7;

/// Stored keys the model does not name. Carried through every rewrite so
/// records written by other tools keep their full field set.
pub type Extra = BTreeMap<String, Value>;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Reads a string-valued enum; anything blank, unknown or non-string falls
/// back to the default instead of rejecting the whole record.
fn parse_loose<T: FromStr + Default>(raw: &Value) -> T {
    raw.as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

/// Enums stored as free-form strings.
trait Spelled: FromStr + Default + Copy + PartialEq {
    fn canonical(self) -> &'static str;
}

/// Parses a stored value, keeping its spelling when it is not canonical.
fn read_spelled<T: Spelled>(raw: Option<Value>) -> (T, Option<Value>) {
    let value: T = raw.as_ref().map(parse_loose).unwrap_or_default();
    let spelling = raw.filter(|r| r.as_str() != Some(value.canonical()));
    (value, spelling)
}

/// The stored spelling if it still means `value`, else the canonical name.
fn write_spelled<T: Spelled>(value: T, spelling: Option<Value>) -> Value {
    spelling
        .filter(|r| parse_loose::<T>(r) == value)
        .unwrap_or_else(|| Value::from(value.canonical()))
}

fn deserialize_loose<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    Ok(parse_loose(&Value::deserialize(deserializer)?))
}

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Untrusted,
    #[default]
    User,
    Team,
    System,
}

impl FromStr for TrustLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" | "owner" => Ok(TrustLevel::System),
            "team" => Ok(TrustLevel::Team),
            "user" | "verified" | "community" => Ok(TrustLevel::User),
            "untrusted" => Ok(TrustLevel::Untrusted),
            _ => Err(UnknownVariant {
                kind: "trust level",
                value: s.to_string(),
            }),
        }
    }
}

impl Spelled for TrustLevel {
    fn canonical(self) -> &'static str {
        self.as_str()
    }
}

impl<'de> Deserialize<'de> for TrustLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_loose(deserializer)
    }
}

impl TrustLevel {
    pub fn score(self) -> f64 {
        match self {
            TrustLevel::System => 1.0,
            TrustLevel::Team => 0.75,
            TrustLevel::User => 0.5,
            TrustLevel::Untrusted => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrustLevel::System => "system",
            TrustLevel::Team => "team",
            TrustLevel::User => "user",
            TrustLevel::Untrusted => "untrusted",
        }
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    #[default]
    Active,
    Deprecated,
    Archived,
}

impl LifecycleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleStatus::Active => "active",
            LifecycleStatus::Deprecated => "deprecated",
            LifecycleStatus::Archived => "archived",
        }
    }
}

impl FromStr for LifecycleStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(LifecycleStatus::Active),
            "deprecated" => Ok(LifecycleStatus::Deprecated),
            "archived" => Ok(LifecycleStatus::Archived),
            _ => Err(UnknownVariant {
                kind: "lifecycle status",
                value: s.to_string(),
            }),
        }
    }
}

impl Spelled for LifecycleStatus {
    fn canonical(self) -> &'static str {
        self.as_str()
    }
}

// An unset status reads as active.
impl<'de> Deserialize<'de> for LifecycleStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_loose(deserializer)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct InferredTag {
    pub tag: String,
    #[serde(default)]
    pub confidence: f64,
}

impl InferredTag {
    /// Builds an inferred tag, clamping `confidence` into `[0, 1]`.
    pub fn new(tag: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            tag: tag.into(),
            confidence,
        }
    }

    pub fn is_confident(&self) -> bool {
        self.confidence >= CONFIDENT_INFERENCE
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TagSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confirmed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inferred: Vec<InferredTag>,
    /// Tags the pattern must never be associated with. Round-tripped only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub negative: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl TagSet {
    /// Adds a confirmed tag unless an equal one (ignoring case) is present.
    /// Returns whether the tag was inserted.
    pub fn confirm(&mut self, tag: &str) -> bool {
        if tag.is_empty() || self.confirmed.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            return false;
        }
        self.confirmed.push(tag.to_string());
        true
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Applies {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Trust and integrity metadata.
///
/// Older records keep the hash under `hash` and spell trust levels
/// differently (`owner`, `verified`, `""`). Both are remembered on read and
/// written back the same way, so a hash repair changes nothing but the hash.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "SecurityRecord", into = "SecurityRecord")]
pub struct SecurityMeta {
    pub trust_level: TrustLevel,
    /// Lowercase hex SHA-256 of `content`. Empty until first hashed.
    pub content_hash: String,
    pub warnings: Vec<String>,
    pub extra: Extra,
    trust_spelling: Option<Value>,
    legacy_hash_key: bool,
}

/// On-disk shape of [`SecurityMeta`].
#[derive(Serialize, Deserialize)]
struct SecurityRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trust_level: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(flatten)]
    extra: Extra,
}

impl From<SecurityRecord> for SecurityMeta {
    fn from(record: SecurityRecord) -> Self {
        let (trust_level, trust_spelling) = read_spelled(record.trust_level);
        let mut extra = record.extra;
        let legacy_hash_key = record.content_hash.is_none() && record.hash.is_some();
        let content_hash = match (record.content_hash, record.hash) {
            (Some(current), legacy) => {
                if let Some(legacy) = legacy {
                    extra.insert("hash".to_string(), Value::String(legacy));
                }
                current
            }
            (None, legacy) => legacy.unwrap_or_default(),
        };
        Self {
            trust_level,
            content_hash,
            warnings: record.warnings,
            extra,
            trust_spelling,
            legacy_hash_key,
        }
    }
}

impl From<SecurityMeta> for SecurityRecord {
    fn from(meta: SecurityMeta) -> Self {
        let trust_level = write_spelled(meta.trust_level, meta.trust_spelling);
        let (content_hash, hash) = if meta.legacy_hash_key {
            (None, Some(meta.content_hash))
        } else {
            (Some(meta.content_hash), None)
        };
        Self {
            trust_level: Some(trust_level),
            content_hash,
            hash,
            warnings: meta.warnings,
            extra: meta.extra,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LearningMeta {
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub effectiveness: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback_scores: Vec<f64>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Lifecycle metadata. Like trust levels, a status spelled in a way the
/// model does not know reads as active and is written back unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "LifecycleRecord", into = "LifecycleRecord")]
pub struct LifecycleMeta {
    pub status: LifecycleStatus,
    /// Unset until the record first enters a store.
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub extra: Extra,
    status_spelling: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct LifecycleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: Extra,
}

impl From<LifecycleRecord> for LifecycleMeta {
    fn from(record: LifecycleRecord) -> Self {
        let (status, status_spelling) = read_spelled(record.status);
        Self {
            status,
            created: record.created,
            updated: record.updated,
            extra: record.extra,
            status_spelling,
        }
    }
}

impl From<LifecycleMeta> for LifecycleRecord {
    fn from(meta: LifecycleMeta) -> Self {
        Self {
            status: Some(write_spelled(meta.status, meta.status_spelling)),
            created: meta.created,
            updated: meta.updated,
            extra: meta.extra,
        }
    }
}

/// A named, tagged snippet of reusable content.
///
/// Every field except `name` tolerates absence in stored data; missing text
/// fields read back as empty strings. Keys outside the model land in `extra`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Pattern {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub applies: Applies,
    #[serde(default)]
    pub security: SecurityMeta,
    #[serde(default)]
    pub learning: LearningMeta,
    #[serde(default)]
    pub lifecycle: LifecycleMeta,
    #[serde(default, skip_serializing_if = "is_unset")]
    pub schema_version: u32,
    #[serde(flatten)]
    pub extra: Extra,
}

fn is_unset(version: &u32) -> bool {
    *version == 0
}

/// Domain vocabulary recognised by the domain filter.
pub const DOMAIN_TAGS: &[&str] = &[
    "go",
    "swift",
    "python",
    "node",
    "rust",
    "javascript",
    "typescript",
];

pub fn is_domain_tag(tag: &str) -> bool {
    DOMAIN_TAGS.iter().any(|d| d.eq_ignore_ascii_case(tag))
}

impl Pattern {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            schema_version: SCHEMA_VERSION,
            ..Default::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.status == LifecycleStatus::Active
    }

    pub fn is_trusted(&self) -> bool {
        matches!(
            self.security.trust_level,
            TrustLevel::System | TrustLevel::Team
        )
    }

    /// Confirmed tags followed by confidently inferred ones.
    pub fn display_tags(&self) -> Vec<&str> {
        self.tags
            .confirmed
            .iter()
            .map(String::as_str)
            .chain(
                self.tags
                    .inferred
                    .iter()
                    .filter(|t| t.is_confident())
                    .map(|t| t.tag.as_str()),
            )
            .collect()
    }

    /// First confirmed domain tag, then a confident inferred one, else `general`.
    pub fn primary_domain(&self) -> String {
        if let Some(t) = self.tags.confirmed.iter().find(|t| is_domain_tag(t)) {
            return t.to_ascii_lowercase();
        }
        if let Some(t) = self
            .tags
            .inferred
            .iter()
            .find(|t| t.is_confident() && is_domain_tag(&t.tag))
        {
            return t.tag.to_ascii_lowercase();
        }
        "general".to_string()
    }

    /// Up to `n` inferred tags by descending confidence; ties keep stored order.
    pub fn top_inferred(&self, n: usize) -> Vec<&InferredTag> {
        let mut tags: Vec<&InferredTag> = self.tags.inferred.iter().collect();
        tags.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        tags.truncate(n);
        tags
    }
}
