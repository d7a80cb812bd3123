//! Key grammar of the job-queue keyspace: `<namespace>:<kind>:<job_id>`.

use std::collections::HashMap;

/// Kinds of per-job keys, ordered by priority: a result beats an in-progress
/// marker, which beats a bare definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    Definition,
    InProgress,
    Result,
}

impl KeyKind {
    pub fn segment(&self) -> &'static str {
        match self {
            KeyKind::Definition => "job",
            KeyKind::InProgress => "in-progress",
            KeyKind::Result => "result",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "job" => Some(KeyKind::Definition),
            "in-progress" => Some(KeyKind::InProgress),
            "result" => Some(KeyKind::Result),
            _ => None,
        }
    }
}

/// Key naming for one namespace (`arq` unless configured otherwise).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    namespace: String,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new("arq")
    }
}

impl KeyLayout {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self, kind: KeyKind, job_id: &str) -> String {
        format!("{}:{}:{}", self.namespace, kind.segment(), job_id)
    }

    /// Glob matching every key of the namespace.
    pub fn scan_pattern(&self) -> String {
        format!("{}:*", self.namespace)
    }

    /// Sorted set that receives abort requests.
    pub fn abort_set(&self) -> String {
        format!("{}:abort", self.namespace)
    }

    /// Split a raw key into its kind and job id.
    ///
    /// Job ids may themselves contain `:`; everything after the kind segment is the id.
    pub fn parse<'k>(&self, key: &'k str) -> Option<(KeyKind, &'k str)> {
        let rest = key.strip_prefix(self.namespace.as_str())?.strip_prefix(':')?;
        let (segment, job_id) = rest.split_once(':')?;
        if job_id.is_empty() {
            return None;
        }
        Some((KeyKind::from_segment(segment)?, job_id))
    }
}

/// Reduce raw keys to the winning kind per job id. Keys outside the grammar are dropped.
pub fn classify<I, K>(layout: &KeyLayout, keys: I) -> HashMap<String, KeyKind>
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    let mut kinds: HashMap<String, KeyKind> = HashMap::new();
    for key in keys {
        let Some((kind, job_id)) = layout.parse(key.as_ref()) else {
            continue;
        };
        kinds
            .entry(job_id.to_string())
            .and_modify(|current| *current = (*current).max(kind))
            .or_insert(kind);
    }
    kinds
}
