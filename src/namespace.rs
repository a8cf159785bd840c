use std::path::{Component, Path};

use crate::config::Config;
use crate::keys::NamespacePrefix;

/// Namespace of a source file, derived from its path.
///
/// The area is the first directory after `marker_dir` that is not in
/// `skip_dirs`; the leaf is the parent directory and file stem joined by
/// `_` (the parent is dropped when it is the area itself):
///
/// `/p/src/view/Censor/components/guardList.vue` -> `Censor.components_guardList`
pub fn derive_prefix(path: &Path, marker_dir: &str, skip_dirs: &[String]) -> NamespacePrefix {
    let segments: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let area = segments
        .iter()
        .skip_while(|segment| segment.as_str() != marker_dir)
        .skip(1)
        .find(|segment| segment.as_str() != marker_dir && !skip_dirs.contains(segment))
        .cloned()
        .unwrap_or_default();

    let mut tail: Vec<String> = segments.iter().rev().take(2).rev().cloned().collect();
    if let Some(file) = tail.last_mut() {
        if let Some(stem) = Path::new(file.as_str()).file_stem() {
            *file = stem.to_string_lossy().into_owned();
        }
    }
    if tail.len() == 2 && !area.is_empty() && tail[0] == area {
        tail.remove(0);
    }
    let leaf = tail.join("_");

    NamespacePrefix::new(&format!("{}.{}", area, leaf))
}

pub fn derive_prefix_with_config(path: &Path, config: &Config) -> NamespacePrefix {
    derive_prefix(path, &config.marker_dir, &config.skip_dirs)
}
