//! Contract shared by the markup and program extractors.

use crate::allocator::AllocatorSettings;
use crate::detect::TextDetector;
use crate::keys::{NamespacePrefix, TextTable};

/// Read-only inputs of one extractor run
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub settings: &'a AllocatorSettings,
    pub detector: &'a TextDetector,
    pub prefix: &'a NamespacePrefix,
    /// Call name written into the rewritten source
    pub function: &'a str,
    /// Source path, used in error messages only
    pub path: &'a str,
}

/// What an extractor hands back: rewritten text, next free index, new keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOutput {
    pub output: String,
    pub index: u32,
    pub local: TextTable,
    /// Number of source locations rewritten
    pub replaced: usize,
}

impl ExtractOutput {
    pub fn unchanged(source: &str, index: u32) -> Self {
        ExtractOutput {
            output: source.to_string(),
            index,
            local: TextTable::new(),
            replaced: 0,
        }
    }
}
