//! Batch run: file selection, per-file conversion and the single write of
//! the resource document at the end.
//!
//! Files are processed one after another. The shared `CommonText` table and
//! the resource store are the only state carried from one file to the next.

use anyhow::Result;
use glob::Pattern;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::allocator::AllocatorSettings;
use crate::config::Config;
use crate::detect::TextDetector;
use crate::error::{AutokeyError, Result as AutokeyResult};
use crate::extract::ExtractContext;
use crate::fs::FileSystem;
use crate::keys::{NamespacePrefix, TextTable};
use crate::logging;
use crate::markup::extract_markup;
use crate::namespace::derive_prefix_with_config;
use crate::program::{extract_program, max_referenced_index, ProgramSyntax};
use crate::reconcile::{source_max, starting_index, store_max};
use crate::sfc;
use crate::store::{detect_json_style, ResourceStore};

/// Options of one `exec` run
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Resource document (absolute path)
    pub resource: PathBuf,
    /// File or directory to convert (absolute path)
    pub target: PathBuf,
    /// File names to restrict a directory run to; empty means all
    pub only: Vec<String>,
    pub recursive: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Source rewritten; `keys_added` new keys under the file's namespace
    Transformed { keys_added: usize },
    Unchanged,
    /// Left untouched: unreadable, unparseable or not writable
    Skipped { reason: String },
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub prefix: String,
    pub outcome: FileOutcome,
}

impl FileReport {
    fn skipped(path: PathBuf, config: &Config, reason: String) -> Self {
        FileReport {
            prefix: derive_prefix_with_config(&path, config).to_string(),
            path,
            outcome: FileOutcome::Skipped { reason },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    /// New keys per namespace prefix
    pub keys_by_namespace: BTreeMap<String, usize>,
    /// New entries in the shared table
    pub common_added: usize,
    pub store_written: bool,
    pub dry_run: bool,
}

impl RunReport {
    pub fn scanned(&self) -> usize {
        self.files.len()
    }

    pub fn transformed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Transformed { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Unchanged))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    pub fn keys_added(&self) -> usize {
        self.keys_by_namespace.values().sum()
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// Result of converting one file's text
#[derive(Debug, Clone)]
pub struct FileConversion {
    pub prefix: NamespacePrefix,
    pub start_index: u32,
    pub output: String,
    /// Keys added under `prefix`
    pub local: TextTable,
    /// Shared table after this file
    pub common: TextTable,
    pub replaced: usize,
}

impl FileConversion {
    pub fn is_unchanged(&self, source: &str) -> bool {
        self.replaced == 0 && self.output == source
    }
}

/// Converts single files; holds everything derived from the configuration
#[derive(Debug, Clone)]
pub struct FileConverter {
    config: Config,
    settings: AllocatorSettings,
    detector: TextDetector,
    functions: Vec<String>,
}

impl FileConverter {
    pub fn new(config: &Config) -> Result<Self> {
        let functions = config.translation_functions();
        Ok(FileConverter {
            settings: AllocatorSettings::from(config),
            detector: TextDetector::new(config.text_regex()?, &functions),
            functions,
            config: config.clone(),
        })
    }

    pub fn common_namespace(&self) -> &str {
        &self.config.common_namespace
    }

    /// Convert `source`, read from `path`.
    ///
    /// Nothing is mutated: the new shared table comes back in the result,
    /// so a failed file leaves the caller's state as it was.
    pub fn convert(
        &self,
        path: &Path,
        source: &str,
        store: &ResourceStore,
        common: &TextTable,
    ) -> AutokeyResult<FileConversion> {
        let prefix = derive_prefix_with_config(path, &self.config);
        let display = path.display().to_string();

        let component = is_component(path).then(|| sfc::split(source));
        let (template, scripts): (&str, Vec<(&str, ProgramSyntax)>) = match &component {
            Some(sfc) => (
                sfc.template(),
                sfc.scripts
                    .iter()
                    .map(|block| (sfc.body(block), ProgramSyntax::from_lang(block.lang.as_deref())))
                    .collect(),
            ),
            None => ("", vec![(source, ProgramSyntax::from_path(path))]),
        };

        let mut candidates = vec![
            store_max(store, &prefix),
            source_max(source, &prefix, &self.functions),
        ];
        for (script, syntax) in &scripts {
            candidates.push(max_referenced_index(
                script,
                *syntax,
                &display,
                &prefix,
                &self.functions,
            )?);
        }
        let start_index = starting_index(&prefix, &candidates)?;
        logging::info(&format!(
            "Processing {} ({}, next index {})",
            display, prefix, start_index
        ));

        let mut scratch = common.clone();
        let markup_ctx = ExtractContext {
            settings: &self.settings,
            detector: &self.detector,
            prefix: &prefix,
            function: &self.config.markup_function,
            path: &display,
        };
        let markup = extract_markup(template, &markup_ctx, start_index, &mut scratch)?;

        // Script blocks continue the template's numbering in document order
        let program_ctx = ExtractContext {
            function: &self.config.program_function,
            ..markup_ctx
        };
        let mut index = markup.index;
        let mut local = markup.local;
        let mut replaced = markup.replaced;
        let mut outputs = Vec::with_capacity(scripts.len());
        for (script, syntax) in &scripts {
            let program = extract_program(script, *syntax, &program_ctx, index, &mut scratch)?;
            index = program.index;
            local.extend(program.local);
            replaced += program.replaced;
            outputs.push(program.output);
        }

        let output = match &component {
            Some(sfc) => sfc.reassemble(&markup.output, &outputs),
            None => outputs.into_iter().next().unwrap_or_default(),
        };

        Ok(FileConversion {
            prefix,
            start_index,
            output,
            local,
            common: scratch,
            replaced,
        })
    }
}

/// Single-file components carry a template and a script section
fn is_component(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("vue")
}

fn require_input(fs: &dyn FileSystem, path: &Path, what: &str) -> AutokeyResult<()> {
    let reason = if !path.is_absolute() {
        format!("{} must be an absolute path", what)
    } else if !fs.exists(path) {
        format!("{} does not exist", what)
    } else {
        return Ok(());
    };
    Err(AutokeyError::MissingInput {
        path: path.to_path_buf(),
        reason,
    })
}

/// Files the run will visit, in path order
pub fn select_files(
    fs: &dyn FileSystem,
    config: &Config,
    options: &ExecOptions,
) -> Result<Vec<PathBuf>> {
    // An explicitly named file is processed whatever its extension
    if fs.is_file(&options.target) {
        return Ok(vec![options.target.clone()]);
    }

    let ignore: Vec<Pattern> = config.ignore_patterns()?;
    let recursive = options.recursive || config.recursive;
    let files = fs
        .list_files(&options.target, recursive)?
        .into_iter()
        .filter(|path| config.handles_extension(path))
        .filter(|path| !ignore.iter().any(|p| p.matches_path(path)))
        .filter(|path| {
            options.only.is_empty()
                || path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| options.only.iter().any(|only| only == name))
        })
        .filter(|path| path != &options.resource)
        .collect();
    Ok(files)
}

/// Run the conversion over `options.target`.
///
/// Setup failures (missing input, unreadable or malformed resource
/// document) abort before any file is touched. A file that cannot be read
/// or parsed is reported as skipped and the run goes on. Rewritten sources
/// are only written once the resource document holds their keys.
pub fn run(fs: &dyn FileSystem, config: &Config, options: &ExecOptions) -> Result<RunReport> {
    require_input(fs, &options.resource, "resource document")?;
    require_input(fs, &options.target, "target")?;

    let converter = FileConverter::new(config)?;
    let origin = options.resource.display().to_string();

    let mut document = fs.open_locked(&options.resource)?;
    let content = document.read_content()?;
    let style = detect_json_style(&content);
    let mut store = ResourceStore::from_json_str(&content, &origin)?;

    let common_prefix = NamespacePrefix::new(converter.common_namespace());
    let mut common = store.text_table(&common_prefix.segments());
    let common_before = common.len();

    let mut report = RunReport {
        dry_run: options.dry_run,
        ..RunReport::default()
    };
    // (index into report.files, rewritten source)
    let mut pending: Vec<(usize, String)> = Vec::new();

    for path in select_files(fs, config, options)? {
        let source = match fs.read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                let reason = format!("{:#}", e);
                logging::warn(&format!("Skipping {}", reason));
                report.files.push(FileReport::skipped(path, config, reason));
                continue;
            }
        };

        let conversion = match converter.convert(&path, &source, &store, &common) {
            Ok(conversion) => conversion,
            Err(e) if e.is_file_scoped() => {
                logging::warn(&format!("Skipping {}", e));
                report.files.push(FileReport::skipped(path, config, e.to_string()));
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = if conversion.is_unchanged(&source) {
            FileOutcome::Unchanged
        } else {
            let fragment = ResourceStore::fragment(&conversion.prefix, &conversion.local)?;
            store.merge(fragment);
            common = conversion.common;
            pending.push((report.files.len(), conversion.output));

            let keys_added = conversion.local.len();
            if keys_added > 0 {
                *report
                    .keys_by_namespace
                    .entry(conversion.prefix.to_string())
                    .or_default() += keys_added;
            }
            FileOutcome::Transformed { keys_added }
        };
        logging::debug(&format!("{}: {:?}", path.display(), outcome));

        report.files.push(FileReport {
            path,
            prefix: conversion.prefix.to_string(),
            outcome,
        });
    }

    report.common_added = common.len() - common_before;
    if report.common_added > 0 {
        store.write_table(&common_prefix, &common)?;
    }

    if options.dry_run {
        if report.keys_added() > 0 || report.common_added > 0 {
            logging::info(&format!("Dry run: {} left unchanged", origin));
        }
        return Ok(report);
    }

    if report.keys_added() > 0 || report.common_added > 0 {
        let updated = store.to_json_string(&style)?;
        document.replace_content(&updated)?;
        report.store_written = true;
    }

    for (position, output) in pending {
        let file = &mut report.files[position];
        if let Err(e) = fs.atomic_write(&file.path, &output) {
            // Its keys are already stored; the source keeps its original text
            let reason = format!("{:#}", e);
            logging::warn(&format!("Skipping {}", reason));
            file.outcome = FileOutcome::Skipped { reason };
        }
    }

    Ok(report)
}
