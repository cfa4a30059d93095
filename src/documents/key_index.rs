use std::collections::{BTreeMap, BTreeSet, HashMap};
use serde::{Deserialize, Serialize};

/// Per-segment mapping from field name to a compact integer key, so the
/// document table never repeats field-name strings. Built once at write
/// time; key assignment is deterministic (sorted field names).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyIndex {
    keys: BTreeMap<String, u16>,
}

impl KeyIndex {
    pub fn build<'a>(field_names: impl IntoIterator<Item = &'a str>) -> Self {
        let unique: BTreeSet<&str> = field_names.into_iter().collect();
        let keys = unique
            .into_iter()
            .enumerate()
            .map(|(key, field)| (field.to_string(), key as u16))
            .collect();
        KeyIndex { keys }
    }

    pub fn key(&self, field: &str) -> Option<u16> {
        self.keys.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key -> field name, for expanding rows back at read time.
    pub fn reversed(&self) -> HashMap<u16, String> {
        self.keys.iter().map(|(field, key)| (*key, field.clone())).collect()
    }
}
