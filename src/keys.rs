//! Value types shared by the allocator, the reconciler and the store.

use serde_json::{Map, Value};
use std::fmt;
use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

/// Render a running index as a translation key.
///
/// Indices below 1000 are zero-padded to three digits, larger ones are
/// written as-is: `7 -> "007"`, `42 -> "042"`, `1234 -> "1234"`.
pub fn fill_number(index: u32) -> String {
    if index < 1000 {
        format!("{:03}", index)
    } else {
        index.to_string()
    }
}

/// Parse a numeric-looking key back into its index.
/// Keys with anything other than ASCII digits are not numeric.
pub fn parse_index(key: &str) -> Option<u32> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Dot-joined path identifying where a file's keys live in the resource store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacePrefix(String);

impl NamespacePrefix {
    /// Build a prefix, dropping empty segments (`".a..b"` becomes `"a.b"`)
    pub fn new(prefix: &str) -> Self {
        let joined = prefix
            .split('.')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(".");
        NamespacePrefix(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> Vec<&str> {
        self.0.split('.').filter(|s| !s.is_empty()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fully-qualified key: `<prefix>.<key>`
    pub fn qualify(&self, key: &str) -> String {
        format!("{}.{}", self.0, key)
    }
}

impl fmt::Display for NamespacePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compare two candidate texts in NFC form
pub fn same_text(left: &str, right: &str) -> bool {
    if left == right {
        return true;
    }
    let quick = |s: &str| matches!(is_nfc_quick(s.chars()), IsNormalized::Yes);
    if quick(left) && quick(right) {
        return false;
    }
    left.nfc().eq(right.nfc())
}

/// Flat key -> text table for one namespace, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextTable {
    entries: Vec<(String, String)>,
}

impl TextTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the string leaves of a namespace object.
    /// Nested objects are sub-namespaces and are not part of this table.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let entries = map
            .iter()
            .filter_map(|(key, value)| value.as_str().map(|text| (key.clone(), text.to_string())))
            .collect();
        TextTable { entries }
    }

    /// Key of an entry holding the same text, if any
    pub fn find_key(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, existing)| same_text(existing, text))
            .map(|(key, _)| key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, text)| text.as_str())
    }

    /// Insert or overwrite; an overwritten key keeps its position
    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        let key = key.into();
        let text = text.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = text,
            None => self.entries.push((key, text)),
        }
    }

    /// Largest numeric key, or 0 for a table without numeric keys
    pub fn max_index(&self) -> u32 {
        self.entries
            .iter()
            .filter_map(|(key, _)| parse_index(key))
            .max()
            .unwrap_or(0)
    }

    /// Later entries overwrite earlier ones on the same key
    pub fn extend(&mut self, other: TextTable) {
        for (key, text) in other.entries {
            self.insert(key, text);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}
