use chrono::DateTime;
use chrono::Utc;

use crate::integrity;
use crate::types::Pattern;
use crate::types::SCHEMA_VERSION;

/// Persistence contract the engine reads from and writes repairs through.
///
/// Records are handed out by value; mutating one has no effect until it is
/// passed back to [`PatternStore::update`].
pub trait PatternStore: Send + Sync {
    /// All records in the store's enumeration order (by name).
    fn list(&self) -> anyhow::Result<Vec<Pattern>>;
    fn get(&self, name: &str) -> anyhow::Result<Option<Pattern>>;
    /// Persists a new record and returns it with defaults filled in.
    fn add(&self, pattern: Pattern) -> anyhow::Result<Pattern>;
    fn update(&self, pattern: &Pattern) -> anyhow::Result<()>;
    fn delete(&self, name: &str) -> anyhow::Result<()>;

    fn stats(&self) -> anyhow::Result<serde_json::Value> {
        let patterns = self.list()?;
        let mut by_status = serde_json::Map::new();
        let mut by_trust = serde_json::Map::new();
        for p in &patterns {
            bump(&mut by_status, p.lifecycle.status.as_str());
            bump(&mut by_trust, p.security.trust_level.as_str());
        }
        Ok(serde_json::json!({
            "total": patterns.len(),
            "by_status": by_status,
            "by_trust": by_trust,
        }))
    }
}

fn bump(map: &mut serde_json::Map<String, serde_json::Value>, key: &str) {
    let n = map.get(key).and_then(serde_json::Value::as_u64).unwrap_or(0);
    map.insert(key.to_string(), serde_json::json!(n + 1));
}

/// Defaults applied to a record entering the store for the first time.
pub(crate) fn prepare_new(mut pattern: Pattern, now: DateTime<Utc>) -> Pattern {
    if pattern.id.is_empty() {
        pattern.id = uuid::Uuid::new_v4().to_string();
    }
    if pattern.lifecycle.created.is_none() {
        pattern.lifecycle.created = Some(now);
    }
    pattern.lifecycle.updated = Some(now);
    pattern.schema_version = SCHEMA_VERSION;
    integrity::update_hash(&mut pattern);
    pattern
}

/// Carries over what an update must not change and rehashes edited content.
pub(crate) fn prepare_update(existing: &Pattern, incoming: &Pattern, now: DateTime<Utc>) -> Pattern {
    let mut next = incoming.clone();
    next.lifecycle.created = existing.lifecycle.created;
    next.lifecycle.updated = Some(now);
    if next.content != existing.content {
        integrity::update_hash(&mut next);
    }
    next
}

pub mod yaml;

#[cfg(feature = "sqlite")]
pub mod sqlite;
