use std::collections::{BTreeMap, BTreeSet, HashMap};

use glob::Pattern;
use serde_json::Value;

use crate::error::StoreError;

use super::{KvStore, StoreCommand, StoreResult};

#[derive(Debug, Clone)]
enum Entry {
    String(String),
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
}

/// In-process store loaded from a JSON snapshot
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    entries: BTreeMap<String, Entry>,
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl MemoryStore {
    /// Parse `{ "key": "value" | { "field": "value" } | ["member"] }`. Numbers
    /// and booleans are stored as their string form; other values are skipped.
    pub(crate) fn from_json(json: &str) -> StoreResult<Self> {
        let data: BTreeMap<String, Value> = serde_json::from_str(json)?;
        let mut store = Self::default();
        for (key, value) in data {
            match value {
                Value::Object(fields) => {
                    let hash = fields
                        .iter()
                        .filter_map(|(f, v)| scalar(v).map(|s| (f.clone(), s)))
                        .collect();
                    store.entries.insert(key, Entry::Hash(hash));
                }
                Value::Array(members) => {
                    let set = members.iter().filter_map(scalar).collect();
                    store.entries.insert(key, Entry::Set(set));
                }
                other => {
                    if let Some(s) = scalar(&other) {
                        store.entries.insert(key, Entry::String(s));
                    }
                }
            }
        }
        Ok(store)
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), Entry::String(value.into()));
    }

    #[cfg(test)]
    pub(crate) fn hset(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) {
        let entry = self
            .entries
            .entry(key.into())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        if !matches!(entry, Entry::Hash(_)) {
            *entry = Entry::Hash(HashMap::new());
        }
        if let Entry::Hash(hash) = entry {
            hash.insert(field.into(), value.into());
        }
    }

    #[cfg(test)]
    pub(crate) fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) {
        let entry = self
            .entries
            .entry(key.into())
            .or_insert_with(|| Entry::Set(BTreeSet::new()));
        if !matches!(entry, Entry::Set(_)) {
            *entry = Entry::Set(BTreeSet::new());
        }
        if let Entry::Set(set) = entry {
            set.insert(member.into());
        }
    }

    fn string_value(&self, key: &str) -> Option<String> {
        match self.entries.get(key) {
            Some(Entry::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn field_value(&self, key: &str, field: &str) -> Option<String> {
        match self.entries.get(key) {
            Some(Entry::Hash(hash)) => hash.get(field).cloned(),
            _ => None,
        }
    }
}

impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.string_value(key))
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        Ok(match self.entries.get(key) {
            Some(Entry::Hash(hash)) => hash.clone(),
            _ => HashMap::new(),
        })
    }

    async fn hash_get_field(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        Ok(self.field_value(key, field))
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(match self.entries.get(key) {
            Some(Entry::Set(set)) => set.iter().cloned().collect(),
            _ => Vec::new(),
        })
    }

    async fn scan_keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let Ok(pattern) = Pattern::new(pattern) else {
            return Ok(Vec::new());
        };
        Ok(self
            .entries
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect())
    }

    async fn pipeline(&self, commands: &[StoreCommand]) -> StoreResult<Vec<Option<String>>> {
        commands
            .iter()
            .map(|command| match (command.name.as_str(), command.args.as_slice()) {
                ("GET", [key]) => Ok(self.string_value(key)),
                ("HGET", [key, field]) => Ok(self.field_value(key, field)),
                _ => Err(StoreError::UnsupportedCommand(command.name.clone())),
            })
            .collect()
    }
}
