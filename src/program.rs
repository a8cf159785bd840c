//! Program extractor.
//!
//! String literals in expression position that carry target-script text are
//! replaced by a call to the translation function. Replacements are spliced
//! into the original text at the literal spans, so everything else keeps its
//! formatting and comments.

use std::collections::HashSet;
use std::path::Path;

use swc_common::comments::SingleThreadedComments;
use swc_common::sync::Lrc;
use swc_common::{FileName, SourceFile, SourceMap, Span, Spanned};
use swc_ecma_ast::{
    CallExpr, Callee, ExportAll, Expr, ImportDecl, JSXAttrValue, Lit, MemberExpr, MemberProp,
    Module, NamedExport, PropName, Str, TsImportEqualsDecl, TsType,
};
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
use swc_ecma_visit::{Visit, VisitWith};

use crate::allocator::KeyAllocator;
use crate::detect::short_call_name;
use crate::error::{AutokeyError, Dialect, Result};
use crate::extract::{ExtractContext, ExtractOutput};
use crate::keys::{parse_index, NamespacePrefix, TextTable};
use crate::logging;

/// Which grammar a program section is parsed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramSyntax {
    /// ECMAScript with JSX and decorators
    JavaScript,
    TypeScript { tsx: bool },
}

impl ProgramSyntax {
    /// From a file extension or an SFC `lang` attribute
    pub fn from_lang(lang: Option<&str>) -> Self {
        match lang {
            Some("ts") | Some("mts") | Some("cts") => ProgramSyntax::TypeScript { tsx: false },
            Some("tsx") => ProgramSyntax::TypeScript { tsx: true },
            _ => ProgramSyntax::JavaScript,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::from_lang(path.extension().and_then(|e| e.to_str()))
    }

    fn to_swc(self) -> Syntax {
        match self {
            ProgramSyntax::JavaScript => Syntax::Es(EsSyntax {
                jsx: true,
                decorators: true,
                allow_return_outside_function: true,
                ..Default::default()
            }),
            ProgramSyntax::TypeScript { tsx } => Syntax::Typescript(TsSyntax {
                tsx,
                decorators: true,
                ..Default::default()
            }),
        }
    }
}

struct ParsedProgram {
    module: Module,
    file: Lrc<SourceFile>,
}

impl ParsedProgram {
    /// Byte range of `span` inside the parsed source
    fn range(&self, span: Span) -> (usize, usize) {
        let base = self.file.start_pos.0;
        ((span.lo.0 - base) as usize, (span.hi.0 - base) as usize)
    }
}

fn parse_program(source: &str, path: &str, syntax: ProgramSyntax) -> Result<ParsedProgram> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        FileName::Real(Path::new(path).to_path_buf()).into(),
        source.to_string(),
    );

    let comments = SingleThreadedComments::default();
    let lexer = Lexer::new(
        syntax.to_swc(),
        Default::default(),
        StringInput::from(&*fm),
        Some(&comments),
    );
    let mut parser = Parser::new_from(lexer);

    let parsed = parser.parse_module();
    // Recovered errors still mean the tree is a guess; treat them as fatal too
    let recovered = parser.take_errors();
    let error = match parsed {
        Err(e) => Some(e),
        Ok(_) if !recovered.is_empty() => recovered.into_iter().next(),
        Ok(module) => return Ok(ParsedProgram { module, file: fm }),
    };

    let message = match error {
        Some(e) => {
            let loc = cm.lookup_char_pos(e.span().lo);
            format!("{}:{}: {:?}", loc.line, loc.col_display + 1, e.kind())
        }
        None => "unknown parse error".to_string(),
    };
    Err(AutokeyError::parse_failure(Dialect::Program, path, message))
}

/// Dotted name of a callee: `t`, `window.$t`, `this.$t`
fn callee_name(callee: &Callee) -> Option<String> {
    match callee {
        Callee::Expr(expr) => expr_name(expr),
        _ => None,
    }
}

fn expr_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::This(_) => Some("this".to_string()),
        Expr::Member(MemberExpr { obj, prop, .. }) => match prop {
            MemberProp::Ident(prop) => Some(format!("{}.{}", expr_name(obj)?, prop.sym)),
            _ => None,
        },
        _ => None,
    }
}

/// `import('x')` and `require('x')` name modules, not text
fn is_module_reference(call: &CallExpr) -> bool {
    match &call.callee {
        Callee::Import(_) => true,
        Callee::Expr(expr) => matches!(expr.as_ref(), Expr::Ident(ident) if ident.sym.as_ref() == "require"),
        _ => false,
    }
}

fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).is_ok();
    }
    trimmed.parse::<f64>().is_ok()
}

/// Translation-call names reduced to their last member (`window.$t` -> `$t`)
fn short_names(functions: &[String]) -> HashSet<String> {
    functions
        .iter()
        .map(|f| short_call_name(f).to_string())
        .collect()
}

#[derive(Debug)]
struct Replacement {
    start: usize,
    end: usize,
    text: String,
}

/// Finds string literals and allocates their keys in traversal order
struct LiteralRewriter<'p, 'a, 'c> {
    program: &'p ParsedProgram,
    ctx: &'c ExtractContext<'c>,
    allocator: KeyAllocator<'a>,
    replacements: Vec<Replacement>,
    failure: Option<AutokeyError>,
}

impl LiteralRewriter<'_, '_, '_> {
    fn is_candidate(&self, value: &str) -> bool {
        !value.is_empty() && !is_numeric(value) && self.ctx.detector.is_translatable(value)
    }

    fn rewrite(&mut self, literal: &Str, in_jsx_attribute: bool) {
        let Some(value) = literal.value.as_str() else {
            return;
        };
        if self.failure.is_some() || !self.is_candidate(value) {
            return;
        }
        let key = match self.allocator.allocate(value) {
            Ok(key) => key,
            Err(e) => {
                self.failure = Some(e);
                return;
            }
        };
        let call = format!("{}('{}')", self.ctx.function, key);
        let text = if in_jsx_attribute {
            format!("{{{}}}", call)
        } else {
            call
        };
        logging::conversion("program literal", value, &text);

        let (start, end) = self.program.range(literal.span);
        self.replacements.push(Replacement { start, end, text });
    }
}

impl Visit for LiteralRewriter<'_, '_, '_> {
    fn visit_import_decl(&mut self, _: &ImportDecl) {}

    fn visit_export_all(&mut self, _: &ExportAll) {}

    fn visit_named_export(&mut self, _: &NamedExport) {}

    fn visit_ts_import_equals_decl(&mut self, _: &TsImportEqualsDecl) {}

    // Types are erased at runtime; literal types must stay literals
    fn visit_ts_type(&mut self, _: &TsType) {}

    fn visit_prop_name(&mut self, name: &PropName) {
        if let PropName::Computed(computed) = name {
            computed.visit_with(self);
        }
    }

    fn visit_call_expr(&mut self, call: &CallExpr) {
        if is_module_reference(call) {
            return;
        }
        let is_translation = callee_name(&call.callee)
            .map(|name| self.ctx.detector.is_translation_call(&name))
            .unwrap_or(false);
        if !is_translation {
            call.visit_children_with(self);
            return;
        }
        // The key argument of an existing translation call stays as written
        call.callee.visit_with(self);
        for arg in call.args.iter().skip(1) {
            arg.visit_with(self);
        }
    }

    fn visit_jsx_attr_value(&mut self, value: &JSXAttrValue) {
        match value {
            JSXAttrValue::Str(literal) => self.rewrite(literal, true),
            other => other.visit_children_with(self),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Lit(Lit::Str(literal)) => self.rewrite(literal, false),
            other => other.visit_children_with(self),
        }
    }
}

fn splice(source: &str, mut replacements: Vec<Replacement>) -> String {
    replacements.sort_by_key(|r| r.start);
    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;
    for replacement in replacements {
        if replacement.start < cursor {
            continue;
        }
        output.push_str(&source[cursor..replacement.start]);
        output.push_str(&replacement.text);
        cursor = replacement.end;
    }
    output.push_str(&source[cursor..]);
    output
}

/// Convert every translatable string literal of `source`.
///
/// A parse failure is returned as `ParseFailure` and nothing is allocated.
pub fn extract_program(
    source: &str,
    syntax: ProgramSyntax,
    ctx: &ExtractContext<'_>,
    start_index: u32,
    common: &mut TextTable,
) -> Result<ExtractOutput> {
    if source.trim().is_empty() {
        return Ok(ExtractOutput::unchanged(source, start_index));
    }

    let program = parse_program(source, ctx.path, syntax)?;

    // Allocate into a scratch copy so a failed file leaves `common` as it was
    let mut scratch = common.clone();
    let mut rewriter = LiteralRewriter {
        program: &program,
        ctx,
        allocator: KeyAllocator::new(ctx.settings, ctx.prefix, start_index, &mut scratch),
        replacements: Vec::new(),
        failure: None,
    };
    program.module.visit_with(&mut rewriter);

    let LiteralRewriter {
        allocator,
        replacements,
        failure,
        ..
    } = rewriter;
    if let Some(failure) = failure {
        return Err(failure);
    }
    let (index, local) = allocator.finish();
    *common = scratch;

    let replaced = replacements.len();
    Ok(ExtractOutput {
        output: splice(source, replacements),
        index,
        local,
        replaced,
    })
}

/// Collects indices of existing `fn('<prefix>.<n>')` calls
struct ReferenceScanner<'a> {
    prefix: &'a NamespacePrefix,
    names: HashSet<String>,
    max: u32,
}

impl Visit for ReferenceScanner<'_> {
    fn visit_call_expr(&mut self, call: &CallExpr) {
        let is_translation = callee_name(&call.callee)
            .map(|name| self.names.contains(short_call_name(&name)))
            .unwrap_or(false);
        if is_translation {
            let key = call.args.first().and_then(|arg| match arg.expr.as_ref() {
                Expr::Lit(Lit::Str(s)) => s.value.as_str().map(|s| s.to_string()),
                _ => None,
            });
            let index = key
                .as_deref()
                .and_then(|key| key.strip_prefix(self.prefix.as_str()))
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(parse_index);
            if let Some(index) = index {
                self.max = self.max.max(index);
            }
        }
        call.visit_children_with(self);
    }
}

/// Largest index already referenced through a translation call under
/// `prefix`, found on the syntax tree so comments and look-alike strings
/// do not count. Unparseable source yields a `ParseFailure`.
pub fn max_referenced_index(
    source: &str,
    syntax: ProgramSyntax,
    path: &str,
    prefix: &NamespacePrefix,
    functions: &[String],
) -> Result<u32> {
    if source.trim().is_empty() {
        return Ok(0);
    }
    let program = parse_program(source, path, syntax)?;
    let mut scanner = ReferenceScanner {
        prefix,
        names: short_names(functions),
        max: 0,
    };
    program.module.visit_with(&mut scanner);
    Ok(scanner.max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AllocatorSettings;
    use crate::detect::TextDetector;
    use pretty_assertions::assert_eq;
    use regex::Regex;

    struct Fixture {
        settings: AllocatorSettings,
        detector: TextDetector,
        prefix: NamespacePrefix,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                settings: AllocatorSettings::default(),
                detector: TextDetector::new(
                    Regex::new(r"[\u{4E00}-\u{9FA5}]").unwrap(),
                    &["window.$t".to_string(), "$t".to_string()],
                ),
                prefix: NamespacePrefix::new("Censor.index"),
            }
        }

        fn run(&self, source: &str, syntax: ProgramSyntax, start: u32, common: &mut TextTable) -> Result<ExtractOutput> {
            let ctx = ExtractContext {
                settings: &self.settings,
                detector: &self.detector,
                prefix: &self.prefix,
                function: "window.$t",
                path: "index.js",
            };
            extract_program(source, syntax, &ctx, start, common)
        }
    }

    #[test]
    fn test_replaces_literals_in_order() {
        let fx = Fixture::new();
        let mut common = TextTable::new();
        let source = "const a = '请输入用户名称';\n// 注释不变\nconst b = { label: \"确认\", tip: '请输入用户名称' };\n";
        let out = fx.run(source, ProgramSyntax::JavaScript, 4, &mut common).unwrap();
        assert_eq!(
            out.output,
            "const a = window.$t('Censor.index.004');\n// 注释不变\nconst b = { label: window.$t('CommonText.001'), tip: window.$t('Censor.index.004') };\n"
        );
        assert_eq!(out.index, 5);
        assert_eq!(out.local.get("004"), Some("请输入用户名称"));
        assert_eq!(common.get("001"), Some("确认"));
        assert_eq!(out.replaced, 3);
    }

    #[test]
    fn test_import_strings_are_exempt() {
        let fx = Fixture::new();
        let mut common = TextTable::new();
        let source = "import a from './组件/列表.vue';\nexport * from './导出';\nconst b = require('./模块');\nconst c = import('./懒加载');\n";
        let out = fx.run(source, ProgramSyntax::JavaScript, 1, &mut common).unwrap();
        assert_eq!(out.output, source);
        assert_eq!(out.replaced, 0);
        assert!(common.is_empty());
    }

    #[test]
    fn test_numeric_empty_and_foreign_strings_are_exempt() {
        let fx = Fixture::new();
        let mut common = TextTable::new();
        let source = "const a = ['', '12', '0x1F', 'hello'];";
        let out = fx.run(source, ProgramSyntax::JavaScript, 1, &mut common).unwrap();
        assert_eq!(out.output, source);
    }

    #[test]
    fn test_property_keys_and_types_stay_literal() {
        let fx = Fixture::new();
        let mut common = TextTable::new();
        let source = "type Kind = '普通用户类型';\nconst map: Record<string, Kind> = { '普通用户类型': '普通用户类型' };\n";
        let out = fx
            .run(source, ProgramSyntax::TypeScript { tsx: false }, 1, &mut common)
            .unwrap();
        assert_eq!(
            out.output,
            "type Kind = '普通用户类型';\nconst map: Record<string, Kind> = { '普通用户类型': window.$t('Censor.index.001') };\n"
        );
    }

    #[test]
    fn test_existing_translation_call_argument_is_kept() {
        let fx = Fixture::new();
        let mut common = TextTable::new();
        let source = "alert(this.$t('请输入用户名称'), '删除成功了吗');";
        let out = fx.run(source, ProgramSyntax::JavaScript, 1, &mut common).unwrap();
        assert_eq!(
            out.output,
            "alert(this.$t('请输入用户名称'), window.$t('Censor.index.001'));"
        );
    }

    #[test]
    fn test_jsx_attribute_value_gets_braces() {
        let fx = Fixture::new();
        let mut common = TextTable::new();
        let source = "const el = <input placeholder=\"请输入用户名称\" />;";
        let out = fx.run(source, ProgramSyntax::JavaScript, 1, &mut common).unwrap();
        assert_eq!(
            out.output,
            "const el = <input placeholder={window.$t('Censor.index.001')} />;"
        );
    }

    #[test]
    fn test_converted_source_is_stable() {
        let fx = Fixture::new();
        let mut common = TextTable::new();
        let first = fx
            .run("export default { title: '用户管理页面' }", ProgramSyntax::JavaScript, 1, &mut common)
            .unwrap();
        let second = fx
            .run(&first.output, ProgramSyntax::JavaScript, first.index, &mut common)
            .unwrap();
        assert_eq!(second.output, first.output);
        assert_eq!(second.replaced, 0);
    }

    #[test]
    fn test_parse_failure_leaves_common_untouched() {
        let fx = Fixture::new();
        let mut common = TextTable::new();
        let err = fx
            .run("const a = '确认'; const = ;", ProgramSyntax::JavaScript, 1, &mut common)
            .unwrap_err();
        assert!(matches!(err, AutokeyError::ParseFailure { dialect: Dialect::Program, .. }));
        assert!(common.is_empty());
    }

    #[test]
    fn test_exhausted_numbers_leave_common_untouched() {
        let fx = Fixture::new();
        let mut common = TextTable::new();
        let err = fx
            .run("const a = '确认'; const b = '这是一段说明文字';", ProgramSyntax::JavaScript, u32::MAX, &mut common)
            .unwrap_err();
        assert!(matches!(err, AutokeyError::InvalidStore { .. }));
        assert!(common.is_empty());
    }

    #[test]
    fn test_max_referenced_index_uses_syntax_tree() {
        let source = r#"
            // window.$t('Censor.index.090') in a comment does not count
            const s = "window.$t('Censor.index.080')";
            const a = window.$t('Censor.index.007');
            const b = this.$t('Censor.index.012');
            const c = window.$t('CommonText.050');
            const d = window.$t('Censor.index_old.030');
        "#;
        let functions = vec!["window.$t".to_string(), "$t".to_string()];
        let max = max_referenced_index(
            source,
            ProgramSyntax::JavaScript,
            "index.js",
            &NamespacePrefix::new("Censor.index"),
            &functions,
        )
        .unwrap();
        assert_eq!(max, 12);
    }

    #[test]
    fn test_helpers() {
        assert!(is_numeric("12"));
        assert!(is_numeric(" 3.5 "));
        assert!(is_numeric("0xff"));
        assert!(!is_numeric(""));
        assert!(!is_numeric("12px"));
        assert_eq!(ProgramSyntax::from_lang(Some("tsx")), ProgramSyntax::TypeScript { tsx: true });
        assert_eq!(ProgramSyntax::from_path(Path::new("a/b.js")), ProgramSyntax::JavaScript);
    }
}
