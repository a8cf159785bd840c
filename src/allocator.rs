//! Reuse-or-assign decision for one candidate text.

use crate::config::Config;
use crate::error::{AutokeyError, Result};
use crate::keys::{fill_number, NamespacePrefix, TextTable};

/// Knobs of the allocation rules that come from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorSettings {
    pub common_namespace: String,
    pub short_text_max_chars: usize,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        AllocatorSettings::from(&Config::default())
    }
}

impl From<&Config> for AllocatorSettings {
    fn from(config: &Config) -> Self {
        AllocatorSettings {
            common_namespace: config.common_namespace.clone(),
            short_text_max_chars: config.short_text_max_chars,
        }
    }
}

impl AllocatorSettings {
    pub fn is_short(&self, text: &str) -> bool {
        text.chars().count() <= self.short_text_max_chars
    }
}

/// Result of allocating a key for one text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Fully-qualified key, e.g. `CommonText.003` or `Censor.index.012`
    pub key: String,
    /// Whether the caller's running index was used up
    pub consumed: bool,
}

/// Decide which key `text` is referenced by.
///
/// First match wins:
/// 1. identical text in the shared table: reuse it
/// 2. short text: append to the shared table at its own max + 1
/// 3. identical text in `local`: reuse it
/// 4. otherwise `prefix.<running_index>`, consuming the index
///
/// Fails with `InvalidStore` when the shared table has no number left.
pub fn allocate(
    settings: &AllocatorSettings,
    prefix: &NamespacePrefix,
    running_index: u32,
    text: &str,
    common: &mut TextTable,
    local: &mut TextTable,
) -> Result<Allocation> {
    let common_key = |key: &str| format!("{}.{}", settings.common_namespace, key);

    if let Some(key) = common.find_key(text) {
        return Ok(Allocation {
            key: common_key(key),
            consumed: false,
        });
    }

    if settings.is_short(text) {
        let next = common.max_index().checked_add(1).ok_or_else(|| {
            AutokeyError::invalid_store(&settings.common_namespace, "no numeric key left")
        })?;
        let key = fill_number(next);
        common.insert(key.clone(), text);
        return Ok(Allocation {
            key: common_key(&key),
            consumed: false,
        });
    }

    if let Some(key) = local.find_key(text) {
        return Ok(Allocation {
            key: prefix.qualify(key),
            consumed: false,
        });
    }

    let key = fill_number(running_index);
    local.insert(key.clone(), text);
    Ok(Allocation {
        key: prefix.qualify(&key),
        consumed: true,
    })
}

/// Allocation state threaded through one extractor run
#[derive(Debug)]
pub struct KeyAllocator<'a> {
    settings: &'a AllocatorSettings,
    prefix: &'a NamespacePrefix,
    index: u32,
    common: &'a mut TextTable,
    local: TextTable,
}

impl<'a> KeyAllocator<'a> {
    pub fn new(
        settings: &'a AllocatorSettings,
        prefix: &'a NamespacePrefix,
        start_index: u32,
        common: &'a mut TextTable,
    ) -> Self {
        KeyAllocator {
            settings,
            prefix,
            index: start_index,
            common,
            local: TextTable::new(),
        }
    }

    /// Allocate a key for `text`, advancing the running index when needed
    pub fn allocate(&mut self, text: &str) -> Result<String> {
        let allocation = allocate(
            self.settings,
            self.prefix,
            self.index,
            text,
            self.common,
            &mut self.local,
        )?;
        if allocation.consumed {
            self.index = self.index.checked_add(1).ok_or_else(|| {
                AutokeyError::invalid_store(self.prefix.as_str(), "no numeric key left")
            })?;
        }
        Ok(allocation.key)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Ending index and the keys this run added under the file's namespace
    pub fn finish(self) -> (u32, TextTable) {
        (self.index, self.local)
    }
}
