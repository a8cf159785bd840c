//! Splitting a single-file component into its template and script bodies.
//!
//! The template runs from the first `<template>` tag to the last
//! `</template>`, so nested templates stay inside it. Each `<script>` block
//! ends at its own `</script>`.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

const TEMPLATE_CLOSE: &str = "</template>";
const SCRIPT_CLOSE: &str = "</script>";

static TEMPLATE_OPEN_REGEX: OnceLock<Regex> = OnceLock::new();
static SCRIPT_OPEN_REGEX: OnceLock<Regex> = OnceLock::new();
static LANG_ATTR_REGEX: OnceLock<Regex> = OnceLock::new();

fn template_open_regex() -> &'static Regex {
    TEMPLATE_OPEN_REGEX.get_or_init(|| {
        Regex::new(r"<template(\s[^>]*)?>")
            .expect("TEMPLATE_OPEN_REGEX pattern is invalid - this is a bug")
    })
}

fn script_open_regex() -> &'static Regex {
    SCRIPT_OPEN_REGEX.get_or_init(|| {
        Regex::new(r"<script(\s[^>]*)?>")
            .expect("SCRIPT_OPEN_REGEX pattern is invalid - this is a bug")
    })
}

fn lang_attr_regex() -> &'static Regex {
    LANG_ATTR_REGEX.get_or_init(|| {
        Regex::new(r#"\blang\s*=\s*["']([^"']*)["']"#)
            .expect("LANG_ATTR_REGEX pattern is invalid - this is a bug")
    })
}

/// Body of one block plus the `lang` of its opening tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub range: Range<usize>,
    pub lang: Option<String>,
}

/// Byte ranges of the template body and of every script body of a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sfc<'a> {
    source: &'a str,
    pub template: Option<Block>,
    /// Script blocks in document order (`<script>` and `<script setup>` may both be present)
    pub scripts: Vec<Block>,
}

fn lang_of(attrs: Option<regex::Match<'_>>) -> Option<String> {
    attrs
        .and_then(|attrs| lang_attr_regex().captures(attrs.as_str()))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Body between the first `<template>` tag and the last `</template>`
fn find_template(source: &str) -> Option<Block> {
    let captures = template_open_regex().captures(source)?;
    let tag = captures.get(0)?;
    let end = source.rfind(TEMPLATE_CLOSE)?;
    if end < tag.end() {
        return None;
    }
    Some(Block {
        range: tag.end()..end,
        lang: lang_of(captures.get(1)),
    })
}

/// Every `<script>` block outside `skip`, each closed by its own `</script>`
fn find_scripts(source: &str, skip: Option<&Range<usize>>) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut cursor = 0;
    while let Some(captures) = script_open_regex().captures_at(source, cursor) {
        let Some(tag) = captures.get(0) else {
            break;
        };
        let Some(end) = source[tag.end()..].find(SCRIPT_CLOSE).map(|i| tag.end() + i) else {
            break;
        };
        cursor = end + SCRIPT_CLOSE.len();
        if skip.is_some_and(|range| range.contains(&tag.start())) {
            continue;
        }
        blocks.push(Block {
            range: tag.end()..end,
            lang: lang_of(captures.get(1)),
        });
    }
    blocks
}

pub fn split(source: &str) -> Sfc<'_> {
    // Templates in another language (pug, ...) are not markup we can walk
    let template = find_template(source);
    let scripts = find_scripts(source, template.as_ref().map(|t| &t.range));
    Sfc {
        source,
        template: template.filter(|block| matches!(block.lang.as_deref(), None | Some("html"))),
        scripts,
    }
}

impl<'a> Sfc<'a> {
    pub fn template(&self) -> &'a str {
        let source = self.source;
        self.template
            .as_ref()
            .map_or("", |block| &source[block.range.clone()])
    }

    pub fn body(&self, block: &Block) -> &'a str {
        &self.source[block.range.clone()]
    }

    /// Put rewritten bodies back; every byte outside them is kept.
    /// `scripts` pairs up with `self.scripts`; missing entries keep the original.
    pub fn reassemble(&self, template: &str, scripts: &[String]) -> String {
        let mut parts: Vec<(&Range<usize>, &str)> = Vec::new();
        if let Some(block) = &self.template {
            parts.push((&block.range, template));
        }
        for (block, body) in self.scripts.iter().zip(scripts) {
            parts.push((&block.range, body.as_str()));
        }
        parts.sort_by_key(|(range, _)| range.start);

        let mut output = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for (range, body) in parts {
            output.push_str(&self.source[cursor..range.start]);
            output.push_str(body);
            cursor = range.end;
        }
        output.push_str(&self.source[cursor..]);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COMPONENT: &str = "<template>\n  <div>\n    <template v-if=\"a\">你好</template>\n  </div>\n</template>\n\n<script lang=\"ts\">\nexport default {}\n</script>\n\n<style scoped>\n.a { color: red; }\n</style>\n";

    fn bodies<'a>(sfc: &Sfc<'a>) -> Vec<&'a str> {
        sfc.scripts.iter().map(|block| sfc.body(block)).collect()
    }

    #[test]
    fn test_split_finds_outer_blocks() {
        let sfc = split(COMPONENT);
        assert_eq!(
            sfc.template(),
            "\n  <div>\n    <template v-if=\"a\">你好</template>\n  </div>\n"
        );
        assert_eq!(bodies(&sfc), vec!["\nexport default {}\n"]);
        assert_eq!(sfc.scripts[0].lang.as_deref(), Some("ts"));
    }

    #[test]
    fn test_reassemble_keeps_everything_else() {
        let sfc = split(COMPONENT);
        let scripts: Vec<String> = bodies(&sfc).iter().map(|b| b.to_string()).collect();
        assert_eq!(sfc.reassemble(sfc.template(), &scripts), COMPONENT);

        let rewritten = sfc.reassemble("T", &["S".to_string()]);
        assert_eq!(
            rewritten,
            "<template>T</template>\n\n<script lang=\"ts\">S</script>\n\n<style scoped>\n.a { color: red; }\n</style>\n"
        );
    }

    #[test]
    fn test_each_script_block_is_closed_by_its_own_tag() {
        let source = "<script>\nexport default { name: 'A' }\n</script>\n\n<script setup lang=\"ts\">\nconst a = 1\n</script>\n\n<template><p>x</p></template>\n";
        let sfc = split(source);
        assert_eq!(
            bodies(&sfc),
            vec!["\nexport default { name: 'A' }\n", "\nconst a = 1\n"]
        );
        assert_eq!(sfc.scripts[0].lang, None);
        assert_eq!(sfc.scripts[1].lang.as_deref(), Some("ts"));
        assert_eq!(sfc.template(), "<p>x</p>");

        let rewritten = sfc.reassemble("<p>y</p>", &["A".to_string(), "B".to_string()]);
        assert_eq!(
            rewritten,
            "<script>A</script>\n\n<script setup lang=\"ts\">B</script>\n\n<template><p>y</p></template>\n"
        );
    }

    #[test]
    fn test_script_inside_template_is_not_a_component_script() {
        let sfc = split("<template><div><script>var a = 1</script></div></template>\n<script>\nvar b = 2\n</script>");
        assert_eq!(bodies(&sfc), vec!["\nvar b = 2\n"]);
    }

    #[test]
    fn test_missing_blocks() {
        let sfc = split("<script setup>\nconst a = 1\n</script>");
        assert_eq!(sfc.template(), "");
        assert_eq!(bodies(&sfc), vec!["\nconst a = 1\n"]);
        assert_eq!(sfc.scripts[0].lang, None);
        assert_eq!(sfc.reassemble("", &["X".to_string()]), "<script setup>X</script>");

        let none = split("<style></style>");
        assert!(none.template.is_none() && none.scripts.is_empty());
    }

    #[test]
    fn test_pug_template_is_not_markup() {
        let sfc = split("<template lang=\"pug\">div 你好</template>");
        assert!(sfc.template.is_none());
    }
}
