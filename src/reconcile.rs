//! Starting index for a file's namespace.
//!
//! The next free index is one past the largest index seen in either the
//! resource store or source that was already converted. Looking at both
//! keeps repeated runs from reusing a key when the store is stale.

use regex::Regex;

use crate::detect::short_call_name;
use crate::error::{AutokeyError, Result};
use crate::keys::NamespacePrefix;
use crate::store::ResourceStore;

/// Largest numeric key stored under `prefix`, 0 when the namespace is absent
pub fn store_max(store: &ResourceStore, prefix: &NamespacePrefix) -> u32 {
    store.max_index(prefix)
}

/// Matches translation calls whose first argument is `'<prefix>.<digits>'`
fn reference_regex(prefix: &NamespacePrefix, functions: &[String]) -> Option<Regex> {
    let mut names: Vec<String> = functions
        .iter()
        .map(|f| regex::escape(short_call_name(f)))
        .collect();
    names.sort();
    names.dedup();
    if names.is_empty() || prefix.is_empty() {
        return None;
    }
    let pattern = format!(
        r#"(?:{})\s*\(\s*['"`]{}\.(\d+)['"`]"#,
        names.join("|"),
        regex::escape(prefix.as_str())
    );
    Regex::new(&pattern).ok()
}

/// Largest index referenced as `fn('<prefix>.<n>')` anywhere in `source`.
///
/// The prefix must match exactly, so keys of a deeper or sibling namespace
/// (and `CommonText` keys) never count.
pub fn source_max(source: &str, prefix: &NamespacePrefix, functions: &[String]) -> u32 {
    let Some(re) = reference_regex(prefix, functions) else {
        return 0;
    };
    re.captures_iter(source)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// `max(candidates) + 1`; an index at `u32::MAX` leaves no key for `prefix`
pub fn starting_index(prefix: &NamespacePrefix, candidates: &[u32]) -> Result<u32> {
    candidates
        .iter()
        .copied()
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| AutokeyError::invalid_store(prefix.as_str(), "no numeric key left"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn functions() -> Vec<String> {
        vec!["window.$t".to_string(), "$t".to_string()]
    }

    #[test]
    fn test_store_max() {
        let store = ResourceStore::from_map(
            json!({"Censor": {"index": {"003": "a", "010": "b"}}})
                .as_object()
                .unwrap()
                .clone(),
            "test",
        )
        .unwrap();
        assert_eq!(store_max(&store, &NamespacePrefix::new("Censor.index")), 10);
        assert_eq!(store_max(&store, &NamespacePrefix::new("Other.index")), 0);
    }

    #[test]
    fn test_source_max_finds_markup_and_program_calls() {
        let source = r#"
            <span :title="$t('Censor.index.004')">{{ $t('Censor.index.002') }}</span>
            <p>{{ $t('CommonText.099') }}</p>
            const a = window.$t("Censor.index.011");
        "#;
        let prefix = NamespacePrefix::new("Censor.index");
        assert_eq!(source_max(source, &prefix, &functions()), 11);
    }

    #[test]
    fn test_source_max_requires_exact_prefix() {
        let source = "$t('Censor.index_list.050') $t('Censor.index.sub.070') $t('Censor.index.005')";
        let prefix = NamespacePrefix::new("Censor.index");
        assert_eq!(source_max(source, &prefix, &functions()), 5);
        assert_eq!(source_max("nothing here", &prefix, &functions()), 0);
    }

    #[test]
    fn test_starting_index() {
        let prefix = NamespacePrefix::new("Censor.index");
        assert_eq!(starting_index(&prefix, &[0, 0]).unwrap(), 1);
        assert_eq!(starting_index(&prefix, &[4, 11, 2]).unwrap(), 12);
        assert_eq!(starting_index(&prefix, &[]).unwrap(), 1);
    }

    #[test]
    fn test_starting_index_past_largest_key_fails() {
        let store = ResourceStore::from_map(
            json!({"Censor": {"index": {"4294967295": "a"}}})
                .as_object()
                .unwrap()
                .clone(),
            "test",
        )
        .unwrap();
        let prefix = NamespacePrefix::new("Censor.index");
        let err = starting_index(&prefix, &[store_max(&store, &prefix)]).unwrap_err();
        assert!(matches!(err, AutokeyError::InvalidStore { .. }));
    }
}
