//! Cache record and backing document types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Current backing file format version.
pub const FORMAT_VERSION: &str = "1.0";

/// Flags derived from the payload; once set they stay set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFlags {
    #[serde(default)]
    pub downloaded: bool,
    #[serde(default)]
    pub analyzed: bool,
}

/// A cached result for one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub flags: RecordFlags,
}

impl CacheRecord {
    pub(crate) fn new(key: &str, now: DateTime<Utc>) -> Self {
        let mut payload = Map::new();
        payload.insert("cache_key".into(), Value::String(key.to_string()));
        Self { key: key.to_string(), payload, created_at: now, updated_at: now, flags: RecordFlags::default() }
    }

    /// Shallow-merge `partial` into the payload.
    ///
    /// Incoming top-level fields overwrite existing ones of the same name;
    /// every other field is retained.
    pub(crate) fn merge(&mut self, partial: Map<String, Value>, now: DateTime<Utc>) {
        let incoming = RecordFlags { downloaded: flag(&partial, "downloaded"), analyzed: flag(&partial, "analyzed") };

        for (field, value) in partial {
            self.payload.insert(field, value);
        }

        self.flags.downloaded |= incoming.downloaded;
        self.flags.analyzed |= incoming.analyzed;
        self.updated_at = now;
    }

    /// Get a payload field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

fn flag(payload: &Map<String, Value>, name: &str) -> bool {
    payload.get(name).and_then(Value::as_bool).unwrap_or(false)
}

/// Aggregate counts over the record set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub total: usize,
    pub downloaded: usize,
    pub analyzed: usize,
}

impl CacheStatistics {
    /// Recount from scratch over `records`.
    pub fn compute<'a>(records: impl IntoIterator<Item = &'a CacheRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut stats, record| {
            stats.total += 1;
            stats.downloaded += usize::from(record.flags.downloaded);
            stats.analyzed += usize::from(record.flags.analyzed);
            stats
        })
    }
}

/// Document header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

/// On-disk layout: `{metadata, cases: {key -> record}, statistics}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheDocument {
    pub metadata: CacheMetadata,
    #[serde(default)]
    pub cases: BTreeMap<String, CacheRecord>,
    #[serde(default)]
    pub statistics: CacheStatistics,
}

impl CacheDocument {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            metadata: CacheMetadata { created: now, last_updated: now, version: FORMAT_VERSION.to_string() },
            cases: BTreeMap::new(),
            statistics: CacheStatistics::default(),
        }
    }

    /// Refresh header timestamp and the stored statistics snapshot.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.last_updated = now;
        self.statistics = CacheStatistics::compute(self.cases.values());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_keeps_prior_fields() {
        let now = Utc::now();
        let mut record = CacheRecord::new("k", now);
        record.merge(map(json!({"a": 1})), now);
        record.merge(map(json!({"b": 2})), now);
        assert_eq!(record.field("a"), Some(&json!(1)));
        assert_eq!(record.field("b"), Some(&json!(2)));
        assert_eq!(record.field("cache_key"), Some(&json!("k")));
    }

    #[test]
    fn test_merge_overwrites_same_field() {
        let now = Utc::now();
        let mut record = CacheRecord::new("k", now);
        record.merge(map(json!({"a": 1})), now);
        record.merge(map(json!({"a": 3})), now);
        assert_eq!(record.field("a"), Some(&json!(3)));
    }

    #[test]
    fn test_flags_are_sticky() {
        let now = Utc::now();
        let mut record = CacheRecord::new("k", now);
        record.merge(map(json!({"analyzed": true})), now);
        record.merge(map(json!({"analyzed": false, "downloaded": true})), now);
        assert!(record.flags.analyzed);
        assert!(record.flags.downloaded);
    }

    #[test]
    fn test_non_boolean_flag_ignored() {
        let now = Utc::now();
        let mut record = CacheRecord::new("k", now);
        record.merge(map(json!({"downloaded": "yes"})), now);
        assert!(!record.flags.downloaded);
    }

    #[test]
    fn test_statistics_compute() {
        let now = Utc::now();
        let mut a = CacheRecord::new("a", now);
        a.merge(map(json!({"downloaded": true})), now);
        let mut b = CacheRecord::new("b", now);
        b.merge(map(json!({"downloaded": true, "analyzed": true})), now);
        let c = CacheRecord::new("c", now);

        let stats = CacheStatistics::compute([&a, &b, &c]);
        assert_eq!(stats, CacheStatistics { total: 3, downloaded: 2, analyzed: 1 });
    }
}
