use regex::Regex;

/// Decides whether a piece of source text still needs translating.
///
/// Text counts as translatable when it contains a character of the target
/// script and does not already go through a translation call.
#[derive(Debug, Clone)]
pub struct TextDetector {
    script: Regex,
    call_names: Vec<String>,
    call_markers: Vec<String>,
}

impl TextDetector {
    pub fn new(script: Regex, functions: &[String]) -> Self {
        let mut call_names: Vec<String> = functions
            .iter()
            .map(|name| short_call_name(name).to_string())
            .collect();
        call_names.sort();
        call_names.dedup();
        let call_markers = call_names.iter().map(|name| format!("{}(", name)).collect();
        TextDetector {
            script,
            call_names,
            call_markers,
        }
    }

    /// Whether a (possibly dotted) callee is one of the translation functions
    pub fn is_translation_call(&self, callee: &str) -> bool {
        let name = short_call_name(callee);
        self.call_names.iter().any(|known| known == name)
    }

    pub fn has_script(&self, text: &str) -> bool {
        self.script.is_match(text)
    }

    pub fn is_translatable(&self, text: &str) -> bool {
        if self.call_markers.iter().any(|marker| text.contains(marker)) {
            return false;
        }
        self.has_script(text)
    }
}

/// Last member of a dotted call name: `window.$t` -> `$t`
pub fn short_call_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
