use anyhow::{bail, Context, Result};
use glob::Pattern;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

use crate::logging::LogLevel;

pub const DEFAULT_CONFIG_FILE: &str = "i18n-autokey.json";

/// Configuration for i18n-autokey
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Call name emitted into markup (e.g., `$t` -> `{{ $t('a.001') }}`)
    #[serde(default = "default_markup_function")]
    pub markup_function: String,

    /// Call name emitted into program source (e.g., `window.$t`)
    #[serde(default = "default_program_function")]
    pub program_function: String,

    /// Shared namespace for short texts
    #[serde(default = "default_common_namespace")]
    pub common_namespace: String,

    /// Texts with at most this many characters go to the shared namespace
    #[serde(default = "default_short_text_max_chars")]
    pub short_text_max_chars: usize,

    /// Regex matching a character of the language being extracted
    #[serde(default = "default_text_pattern")]
    pub text_pattern: String,

    /// Directory whose first child names the namespace area
    #[serde(default = "default_marker_dir")]
    pub marker_dir: String,

    /// Directory names never used as the namespace area
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    /// File extensions to process (without the dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Glob patterns of paths to leave alone
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Descend into sub-directories of a target directory
    #[serde(default)]
    pub recursive: bool,

    /// One of "error", "warn", "info", "debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_markup_function() -> String {
    "$t".to_string()
}

fn default_program_function() -> String {
    "window.$t".to_string()
}

fn default_common_namespace() -> String {
    "CommonText".to_string()
}

fn default_short_text_max_chars() -> usize {
    4
}

fn default_text_pattern() -> String {
    r"[\u{4E00}-\u{9FA5}]".to_string()
}

fn default_marker_dir() -> String {
    "src".to_string()
}

fn default_skip_dirs() -> Vec<String> {
    vec!["view".to_string(), "app".to_string()]
}

fn default_extensions() -> Vec<String> {
    vec!["vue".to_string(), "js".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            markup_function: default_markup_function(),
            program_function: default_program_function(),
            common_namespace: default_common_namespace(),
            short_text_max_chars: default_short_text_max_chars(),
            text_pattern: default_text_pattern(),
            marker_dir: default_marker_dir(),
            skip_dirs: default_skip_dirs(),
            extensions: default_extensions(),
            ignore: Vec::new(),
            recursive: false,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON (or JSON5) file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_json_string(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from a JSON string
    pub fn from_json_string(json_str: &str) -> Result<Self> {
        let config: Config = json5::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Try to load from default config file, or return default config
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.markup_function.trim().is_empty() || self.program_function.trim().is_empty() {
            bail!("markupFunction and programFunction must not be empty");
        }
        if self.common_namespace.trim().is_empty() || self.common_namespace.contains('.') {
            bail!("commonNamespace must be a single non-empty segment");
        }
        if self.short_text_max_chars == 0 {
            bail!("shortTextMaxChars must be at least 1");
        }
        self.text_regex()?;
        self.ignore_patterns()?;
        if self.log_level().is_none() {
            bail!("Unknown logLevel '{}'", self.log_level);
        }
        Ok(())
    }

    pub fn text_regex(&self) -> Result<Regex> {
        Regex::new(&self.text_pattern)
            .with_context(|| format!("Invalid textPattern: {}", self.text_pattern))
    }

    pub fn ignore_patterns(&self) -> Result<Vec<Pattern>> {
        self.ignore
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("Invalid ignore pattern: {}", p)))
            .collect()
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        LogLevel::parse(&self.log_level)
    }

    /// Every call name the tool emits, program name first
    pub fn translation_functions(&self) -> Vec<String> {
        let mut names = vec![self.program_function.clone()];
        if self.markup_function != self.program_function {
            names.push(self.markup_function.clone());
        }
        names
    }

    pub fn handles_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|allowed| allowed == ext))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.markup_function, "$t");
        assert_eq!(config.program_function, "window.$t");
        assert_eq!(config.common_namespace, "CommonText");
        assert_eq!(config.short_text_max_chars, 4);
        assert!(config.text_regex().unwrap().is_match("你好"));
        assert!(!config.text_regex().unwrap().is_match("hello"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json5_with_comments() {
        let config = Config::from_json_string(
            r#"{
                // emit plain calls in scripts too
                programFunction: "$t",
                shortTextMaxChars: 2,
                extensions: ["vue", "js", "ts"],
            }"#,
        )
        .unwrap();
        assert_eq!(config.program_function, "$t");
        assert_eq!(config.short_text_max_chars, 2);
        assert_eq!(config.translation_functions(), vec!["$t".to_string()]);
        assert!(config.handles_extension(Path::new("a/b.ts")));
        assert!(!config.handles_extension(Path::new("a/b.css")));
    }

    #[test]
    fn test_validation_failures() {
        assert!(Config::from_json_string(r#"{"shortTextMaxChars": 0}"#).is_err());
        assert!(Config::from_json_string(r#"{"textPattern": "["}"#).is_err());
        assert!(Config::from_json_string(r#"{"ignore": ["[a"]}"#).is_err());
        assert!(Config::from_json_string(r#"{"commonNamespace": "a.b"}"#).is_err());
        assert!(Config::from_json_string(r#"{"logLevel": "loud"}"#).is_err());
    }
}
