//! In-memory model of the nested language resource document.
//!
//! The document is a tree of namespaces whose leaves are translatable
//! texts. It is loaded once, mutated per file, and written back in full.

use anyhow::Result as AnyResult;
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::{Map, Value};
use std::io::Write;

use crate::error::{AutokeyError, Result};
use crate::keys::{NamespacePrefix, TextTable};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceStore {
    root: Map<String, Value>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a resource document. `origin` is only used in error messages.
    pub fn from_json_str(content: &str, origin: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: Value = serde_json::from_str(content)
            .map_err(|e| AutokeyError::invalid_store(origin, e.to_string()))?;
        match value {
            Value::Object(root) => Self::from_map(root, origin),
            _ => Err(AutokeyError::invalid_store(
                origin,
                "top level must be an object",
            )),
        }
    }

    /// Wrap an object, rejecting leaves that are not strings
    pub fn from_map(root: Map<String, Value>, origin: &str) -> Result<Self> {
        let mut path = Vec::new();
        validate_node(&root, &mut path).map_err(|message| AutokeyError::invalid_store(origin, message))?;
        Ok(ResourceStore { root })
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Sub-map at `path`, or `None` when the namespace does not exist yet
    pub fn get(&self, path: &[&str]) -> Option<&Map<String, Value>> {
        let mut current = &self.root;
        for segment in path {
            current = current.get(*segment)?.as_object()?;
        }
        Some(current)
    }

    pub fn namespace(&self, prefix: &NamespacePrefix) -> Option<&Map<String, Value>> {
        self.get(&prefix.segments())
    }

    /// Write `value` at `path.key`, creating intermediate namespaces.
    /// Fails when a text already sits where a namespace is needed.
    pub fn set(&mut self, path: &[&str], key: &str, value: &str) -> Result<()> {
        let mut current = &mut self.root;
        for (depth, segment) in path.iter().enumerate() {
            let entry = current
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(nested) => nested,
                _ => {
                    return Err(AutokeyError::invalid_store(
                        &path[..=depth].join("."),
                        "a text occupies a namespace path",
                    ))
                }
            };
        }
        if current.get(key).is_some_and(Value::is_object) {
            let full = path.iter().copied().chain([key]).collect::<Vec<_>>().join(".");
            return Err(AutokeyError::invalid_store(
                &full,
                "a namespace occupies a text key",
            ));
        }
        current.insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    /// Deep-merge `addition` into this store; its leaves win on collision
    pub fn merge(&mut self, addition: ResourceStore) {
        merge_into(&mut self.root, addition.root);
    }

    /// Largest numeric key directly under `prefix`, 0 when absent or empty
    pub fn max_index(&self, prefix: &NamespacePrefix) -> u32 {
        self.namespace(prefix)
            .map(|map| TextTable::from_map(map).max_index())
            .unwrap_or(0)
    }

    /// Flat text table of the namespace at `path` (empty when absent)
    pub fn text_table(&self, path: &[&str]) -> TextTable {
        self.get(path).map(TextTable::from_map).unwrap_or_default()
    }

    /// Write every entry of `table` under `prefix`
    pub fn write_table(&mut self, prefix: &NamespacePrefix, table: &TextTable) -> Result<()> {
        let segments = prefix.segments();
        for (key, text) in table.iter() {
            self.set(&segments, key, text)?;
        }
        Ok(())
    }

    /// Project a flat per-file table into the document shape
    pub fn fragment(prefix: &NamespacePrefix, table: &TextTable) -> Result<Self> {
        let mut store = Self::new();
        store.write_table(prefix, table)?;
        Ok(store)
    }

    /// Serialize with the given style, including the trailing newline if any
    pub fn to_json_string(&self, style: &JsonStyle) -> AnyResult<String> {
        let mut buffer = Vec::new();
        serialize_with_style(&mut buffer, &self.root, style)?;
        if style.trailing_newline {
            buffer.extend_from_slice(if style.use_crlf { b"\r\n" } else { b"\n" });
        }
        Ok(String::from_utf8(buffer)?)
    }
}

fn validate_node(map: &Map<String, Value>, path: &mut Vec<String>) -> std::result::Result<(), String> {
    for (key, value) in map {
        path.push(key.clone());
        match value {
            Value::String(_) => {}
            Value::Object(nested) => validate_node(nested, path)?,
            other => {
                return Err(format!(
                    "value at '{}' must be a string or an object, found {}",
                    path.join("."),
                    other
                ))
            }
        }
        path.pop();
    }
    Ok(())
}

/// Deep-merge `addition` into `root`.
///
/// Objects on both sides are combined recursively; anything else from
/// `addition` replaces what `root` had.
pub fn merge_into(root: &mut Map<String, Value>, addition: Map<String, Value>) {
    for (key, value) in addition {
        match (root.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            (_, value) => {
                root.insert(key, value);
            }
        }
    }
}

// =============================================================================
// JSON Style Detection and Custom Formatting
// =============================================================================

/// Detected JSON formatting style from an existing document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonStyle {
    /// Indentation string (e.g., "  ", "    ", "\t")
    pub indent: String,
    /// Whether the file uses CRLF line endings
    pub use_crlf: bool,
    /// Whether the file ends with a trailing newline
    pub trailing_newline: bool,
}

impl Default for JsonStyle {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            use_crlf: false,
            trailing_newline: false,
        }
    }
}

/// Detect JSON formatting style from document content
pub fn detect_json_style(content: &str) -> JsonStyle {
    let mut style = JsonStyle {
        use_crlf: content.contains("\r\n"),
        trailing_newline: content.ends_with('\n'),
        ..JsonStyle::default()
    };

    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed == "{" {
            continue;
        }
        // The first indented key or closing brace tells the indent unit
        if trimmed.starts_with('"') || trimmed.starts_with('}') {
            let indent_len = line.len() - trimmed.len();
            if indent_len > 0 {
                style.indent = line[..indent_len].to_string();
                break;
            }
        }
    }

    style
}

/// Pretty formatter honoring a detected `JsonStyle`
struct StylePreservingFormatter {
    indent: Vec<u8>,
    newline: Vec<u8>,
    current_indent: usize,
    has_value: bool,
}

impl StylePreservingFormatter {
    fn new(style: &JsonStyle) -> Self {
        Self {
            indent: style.indent.as_bytes().to_vec(),
            newline: if style.use_crlf {
                b"\r\n".to_vec()
            } else {
                b"\n".to_vec()
            },
            current_indent: 0,
            has_value: false,
        }
    }

    fn write_line_start<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(&self.newline)?;
        for _ in 0..self.current_indent {
            writer.write_all(&self.indent)?;
        }
        Ok(())
    }
}

impl Formatter for StylePreservingFormatter {
    fn begin_array<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.current_indent += 1;
        self.has_value = false;
        writer.write_all(b"[")
    }

    fn end_array<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.current_indent -= 1;
        if self.has_value {
            self.write_line_start(writer)?;
        }
        writer.write_all(b"]")
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        if !first {
            writer.write_all(b",")?;
        }
        self.write_line_start(writer)
    }

    fn end_array_value<W>(&mut self, _writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.has_value = true;
        Ok(())
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.current_indent += 1;
        self.has_value = false;
        writer.write_all(b"{")
    }

    fn end_object<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.current_indent -= 1;
        if self.has_value {
            self.write_line_start(writer)?;
        }
        writer.write_all(b"}")
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        if !first {
            writer.write_all(b",")?;
        }
        self.write_line_start(writer)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }

    fn end_object_value<W>(&mut self, _writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.has_value = true;
        Ok(())
    }
}

fn serialize_with_style<W: Write>(writer: W, value: &Map<String, Value>, style: &JsonStyle) -> AnyResult<()> {
    let formatter = StylePreservingFormatter::new(style);
    let mut serializer = Serializer::with_formatter(writer, formatter);
    value.serialize(&mut serializer)?;
    Ok(())
}
