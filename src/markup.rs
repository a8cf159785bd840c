//! Markup extractor.
//!
//! Walks template markup with a streaming rewriter: start tags are seen
//! before their children, so attributes are converted before any text
//! below them. Bytes that are not rewritten pass through untouched, which
//! keeps entities undecoded and tag/attribute casing as written.

use lol_html::html_content::{ContentType, Element, TextChunk, TextType};
use lol_html::{doc_text, element, rewrite_str, RewriteStrSettings};
use std::cell::RefCell;

use crate::allocator::KeyAllocator;
use crate::error::{AutokeyError, Dialect, Result};
use crate::expression::{decompose, has_interpolation};
use crate::extract::{ExtractContext, ExtractOutput};
use crate::keys::TextTable;
use crate::logging;

/// Attribute prefixes that already bind an expression (directives, events, props)
const DYNAMIC_ATTRIBUTE_PREFIXES: [&str; 3] = ["v-", "@", ":"];

pub fn is_dynamic_attribute(name: &str) -> bool {
    DYNAMIC_ATTRIBUTE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Newlines removed, surrounding whitespace trimmed
pub fn normalize_text(raw: &str) -> String {
    raw.replace(['\r', '\n'], "").trim().to_string()
}

struct MarkupRewriter<'a, 'c> {
    ctx: &'c ExtractContext<'c>,
    allocator: KeyAllocator<'a>,
    pending_text: String,
    replaced: usize,
    /// First allocation failure; the rewritten output is discarded when set
    failure: Option<AutokeyError>,
}

impl<'a, 'c> MarkupRewriter<'a, 'c> {
    fn allocate(&mut self, text: &str) -> Option<String> {
        match self.allocator.allocate(text) {
            Ok(key) => Some(key),
            Err(e) => {
                self.failure.get_or_insert(e);
                None
            }
        }
    }

    fn convert_attributes(&mut self, el: &mut Element) -> std::result::Result<(), lol_html::errors::AttributeNameError> {
        let attributes: Vec<(String, String)> = el
            .attributes()
            .iter()
            .map(|attr| (attr.name_preserve_case(), attr.value()))
            .collect();

        for (name, value) in attributes {
            if is_dynamic_attribute(&name) || !self.ctx.detector.is_translatable(&value) {
                continue;
            }
            let Some(key) = self.allocate(&value) else {
                return Ok(());
            };
            let call = format!("{}('{}')", self.ctx.function, key);
            logging::conversion(
                "markup attribute",
                &format!("<{} {}=\"{}\">", el.tag_name_preserve_case(), name, value),
                &format!(":{}=\"{}\"", name, call),
            );
            el.remove_attribute(&name);
            el.set_attribute(&format!(":{}", name), &call)?;
            self.replaced += 1;
        }
        Ok(())
    }

    /// Text nodes may arrive in several chunks; they are buffered and the
    /// whole node is written back through its last chunk.
    fn convert_text_chunk(&mut self, chunk: &mut TextChunk) {
        if !matches!(chunk.text_type(), TextType::Data | TextType::RCData) {
            return;
        }
        self.pending_text.push_str(chunk.as_str());
        if !chunk.last_in_text_node() {
            chunk.remove();
            return;
        }
        let raw = std::mem::take(&mut self.pending_text);
        let replacement = self.convert_text(&raw).unwrap_or(raw);
        chunk.replace(&replacement, ContentType::Html);
    }

    fn convert_text(&mut self, raw: &str) -> Option<String> {
        let text = normalize_text(raw);
        if !self.ctx.detector.is_translatable(&text) {
            return None;
        }

        let converted = if has_interpolation(&text) {
            let template = match decompose(&text, self.ctx.detector) {
                Ok(template) => template,
                Err(err) => {
                    logging::debug(&format!("{}: left unchanged: {}", self.ctx.path, err));
                    return None;
                }
            };
            let key = self.allocate(&template.skeleton)?;
            let converted = format!("{{{{ {} }}}}", template.call(self.ctx.function, &key));
            logging::conversion("markup expression", &text, &converted);
            converted
        } else {
            let key = self.allocate(&text)?;
            let converted = format!("{{{{ {}('{}') }}}}", self.ctx.function, key);
            logging::conversion("markup text", &text, &converted);
            converted
        };
        self.replaced += 1;

        let leading = &raw[..raw.len() - raw.trim_start().len()];
        let trailing = &raw[raw.trim_end().len()..];
        Some(format!("{}{}{}", leading, converted, trailing))
    }
}

/// Convert every translatable attribute and text node of `markup`.
///
/// Returns the rewritten markup, the next free index and the keys added
/// under the file's namespace. Short texts go to `common`.
pub fn extract_markup(
    markup: &str,
    ctx: &ExtractContext<'_>,
    start_index: u32,
    common: &mut TextTable,
) -> Result<ExtractOutput> {
    if markup.trim().is_empty() {
        return Ok(ExtractOutput::unchanged(markup, start_index));
    }

    let rewriter = RefCell::new(MarkupRewriter {
        ctx,
        allocator: KeyAllocator::new(ctx.settings, ctx.prefix, start_index, common),
        pending_text: String::new(),
        replaced: 0,
        failure: None,
    });

    let result = rewrite_str(
        markup,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                rewriter.borrow_mut().convert_attributes(el)?;
                Ok(())
            })],
            document_content_handlers: vec![doc_text!(|chunk| {
                rewriter.borrow_mut().convert_text_chunk(chunk);
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );

    let rewriter = rewriter.into_inner();
    if let Some(failure) = rewriter.failure {
        return Err(failure);
    }
    let output =
        result.map_err(|e| AutokeyError::parse_failure(Dialect::Markup, ctx.path, e.to_string()))?;
    let replaced = rewriter.replaced;
    let (index, local) = rewriter.allocator.finish();
    Ok(ExtractOutput {
        output,
        index,
        local,
        replaced,
    })
}
