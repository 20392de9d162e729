//! Source patcher
//!
//! Rewrites a JavaScript source file so it can be imported as an ES module
//! from a temporary location:
//!
//! - Top-level `function`, `async function` and `class` declarations gain an
//!   `export ` prefix (unless the source already exports them).
//! - String-literal paths passed to `.readFile(..)` / `.readFileSync(..)` are
//!   rewritten to absolute paths inside the temporary file's directory.
//!
//! ## Top-level detection
//!
//! A declaration is top-level when its first keyword sits at bracket depth 0
//! in statement position. Depth is tracked over the token stream, so braces
//! and keywords inside strings, comments, template literals and regexes never
//! count. Statement position means the previous token ends a statement (`;`,
//! `}`), or a line break separates it from a previous token that cannot
//! continue an expression.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::artifact::TempArtifact;
use super::lexer::{self, Span, Token, TokenKind};

/// File name of the patched module, written next to the source file.
pub const TEMP_FILE_NAME: &str = "temp.js";

/// Call names whose first string-literal argument is treated as a file path.
const READ_METHODS: &[&str] = &["readFile", "readFileSync"];

/// Words after which a line break does not end the statement.
const CONTINUATION_WORDS: &[&str] = &[
    "export",
    "default",
    "return",
    "throw",
    "new",
    "typeof",
    "void",
    "delete",
    "await",
    "yield",
    "extends",
    "in",
    "of",
    "instanceof",
    "case",
    "else",
    "do",
    "let",
    "const",
    "var",
];

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while producing the patched module on disk.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("cannot resolve source path '{}': {source}", .path.display())]
    Resolve { path: PathBuf, source: io::Error },

    #[error("failed to read source file '{}': {source}", .path.display())]
    ReadSource { path: PathBuf, source: io::Error },

    #[error("failed to write patched module '{}': {source}", .path.display())]
    WriteArtifact { path: PathBuf, source: io::Error },

    #[error("source path '{}' has no parent directory", .path.display())]
    NoParentDir { path: PathBuf },

    #[error("source file '{}' has the reserved name '{}'; rename it", .path.display(), TEMP_FILE_NAME)]
    SourceIsArtifact { path: PathBuf },
}

// ============================================================================
// Patch results
// ============================================================================

/// Shape of a top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Function { is_async: bool },
    Class,
}

impl DeclKind {
    pub fn is_class(self) -> bool {
        matches!(self, DeclKind::Class)
    }
}

/// Who made a declaration importable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOrigin {
    /// The patcher inserted the `export` marker
    Patched,
    /// The source already exported it (`export function ..`, `export default ..`,
    /// `export const ..` or an export list)
    Source,
}

/// A top-level declaration, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Name the module exports it under
    pub name: String,
    pub kind: DeclKind,
    /// Byte offset of the first keyword in the original source
    pub offset: usize,
    pub origin: ExportOrigin,
}

/// A rewritten file-read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRewrite {
    pub original: String,
    pub rewritten: String,
}

/// Patched module text plus what was found while patching it.
#[derive(Debug, Clone)]
pub struct PatchedSource {
    pub text: String,
    pub declarations: Vec<Declaration>,
    pub rewrites: Vec<PathRewrite>,
}

impl PatchedSource {
    /// Number of `export` markers the patcher inserted.
    pub fn inserted_exports(&self) -> usize {
        self.declarations
            .iter()
            .filter(|d| d.origin == ExportOrigin::Patched)
            .count()
    }
}

/// Text splice against the original source.
struct Edit {
    span: Span,
    text: String,
}

// ============================================================================
// Patcher
// ============================================================================

/// Rewrites source text for loading from `temp_dir`.
#[derive(Debug, Clone)]
pub struct Patcher {
    temp_dir: PathBuf,
}

impl Patcher {
    /// Create a patcher whose rewritten read paths point into `temp_dir`.
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    /// Patch source text. Pure; nothing is written.
    #[tracing::instrument(skip_all, fields(source_len = source.len()))]
    pub fn patch(&self, source: &str) -> PatchedSource {
        let tokens = lexer::lex(source);
        let export_lists = collect_export_lists(&tokens);

        let mut edits = Vec::new();
        let mut declarations = Vec::new();
        let mut rewrites = Vec::new();
        let mut depth = 0usize;

        for (i, token) in tokens.iter().enumerate() {
            match &token.kind {
                TokenKind::Punct('{' | '(' | '[') => depth += 1,
                TokenKind::Punct('}' | ')' | ']') => depth = depth.saturating_sub(1),
                TokenKind::Punct('.') => {
                    if let Some((edit, rewrite)) = self.read_path_rewrite(&tokens, i) {
                        edits.push(edit);
                        rewrites.push(rewrite);
                    }
                }
                TokenKind::Word(word) if depth == 0 && at_statement_start(&tokens, i) => {
                    if word == "export" {
                        if let Some((name, kind)) = exported_declaration_at(&tokens, i + 1) {
                            declarations.push(Declaration {
                                name,
                                kind,
                                offset: tokens[i + 1].span.start,
                                origin: ExportOrigin::Source,
                            });
                        }
                    } else if let Some((name, kind)) = declaration_at(&tokens, i) {
                        let offset = token.span.start;
                        let declaration = match export_lists.get(&name) {
                            Some(exported) => Declaration {
                                name: exported.clone(),
                                kind,
                                offset,
                                origin: ExportOrigin::Source,
                            },
                            None => {
                                edits.push(Edit {
                                    span: Span::new(offset, offset),
                                    text: "export ".to_string(),
                                });
                                Declaration {
                                    name,
                                    kind,
                                    offset,
                                    origin: ExportOrigin::Patched,
                                }
                            }
                        };
                        tracing::debug!(name = %declaration.name, kind = ?declaration.kind, "top-level declaration");
                        declarations.push(declaration);
                    }
                }
                _ => {}
            }
        }

        PatchedSource {
            text: apply_edits(source, &edits),
            declarations,
            rewrites,
        }
    }

    /// Rewrite `<expr>.readFile('<dir>/<name>'` to an absolute path in the
    /// temp directory. `dot` indexes the `.` token.
    fn read_path_rewrite(&self, tokens: &[Token], dot: usize) -> Option<(Edit, PathRewrite)> {
        let method = tokens.get(dot + 1)?.word()?;
        if !READ_METHODS.contains(&method) || !tokens.get(dot + 2)?.is_punct('(') {
            return None;
        }

        let arg = tokens.get(dot + 3)?;
        match &arg.kind {
            TokenKind::Str { value, .. } => {
                let file_name = match value.rfind('/') {
                    Some(slash) => &value[slash + 1..],
                    None => value.as_str(),
                };
                if file_name.is_empty() {
                    return None;
                }
                let rewritten = self
                    .temp_dir
                    .join(file_name)
                    .to_string_lossy()
                    .replace('\\', "/");
                Some((
                    Edit {
                        span: arg.span,
                        text: single_quoted(&rewritten),
                    },
                    PathRewrite {
                        original: value.clone(),
                        rewritten,
                    },
                ))
            }
            TokenKind::Template => {
                tracing::warn!(method, "template literal path passed to {method}() is not rewritten");
                None
            }
            _ => {
                tracing::debug!(method, "non-literal path passed to {method}() is not rewritten");
                None
            }
        }
    }
}

/// Whether the token at `index` begins a statement.
fn at_statement_start(tokens: &[Token], index: usize) -> bool {
    let Some(prev) = index.checked_sub(1).map(|p| &tokens[p]) else {
        return true;
    };
    let line_start = tokens[index].line_start;
    match &prev.kind {
        TokenKind::Punct(';' | '}') => true,
        TokenKind::Punct(')' | ']') => line_start,
        TokenKind::Punct(_) => false,
        TokenKind::Word(word) => line_start && !CONTINUATION_WORDS.contains(&word.as_str()),
        TokenKind::Str { .. } | TokenKind::Template | TokenKind::Regex | TokenKind::Number => line_start,
    }
}

/// Recognize the `[async] function` or `class` keyword(s) at `index`.
///
/// Returns the kind and the index of the token after the keyword.
fn declaration_keyword_at(tokens: &[Token], index: usize) -> Option<(DeclKind, usize)> {
    match tokens.get(index)?.word()? {
        "async" => {
            let keyword = tokens.get(index + 1)?;
            if !keyword.is_word("function") || keyword.line_start {
                return None;
            }
            Some((DeclKind::Function { is_async: true }, index + 2))
        }
        "function" => Some((DeclKind::Function { is_async: false }, index + 1)),
        "class" => Some((DeclKind::Class, index + 1)),
        _ => None,
    }
}

/// Recognize `[async] function <name>` or `class <name>` starting at `index`.
fn declaration_at(tokens: &[Token], index: usize) -> Option<(String, DeclKind)> {
    let (kind, next) = declaration_keyword_at(tokens, index)?;

    // `function*` generators and anonymous `class extends ..` are not matched
    let name = tokens.get(next)?.word()?;
    if name == "extends" || name.starts_with('#') {
        return None;
    }
    Some((name.to_string(), kind))
}

/// Recognize what follows an `export` keyword at `index`:
///
/// - a named declaration (`export function a`, `export class B`)
/// - `default` followed by a function or class, named or not
/// - `const|let|var <name> = <initializer>`, shaped by the initializer's
///   first word (values that turn out not to be callable are dropped by the
///   loader)
fn exported_declaration_at(tokens: &[Token], index: usize) -> Option<(String, DeclKind)> {
    match tokens.get(index)?.word()? {
        "default" => {
            let (kind, next) = declaration_keyword_at(tokens, index + 1)?;
            if tokens.get(next)?.is_punct('*') {
                return None;
            }
            Some(("default".to_string(), kind))
        }
        "const" | "let" | "var" => {
            let name = tokens.get(index + 1)?.word()?;
            if !tokens.get(index + 2)?.is_punct('=') {
                return None;
            }
            let kind = match tokens.get(index + 3)?.word() {
                Some("class") => DeclKind::Class,
                Some("async") => DeclKind::Function { is_async: true },
                _ => DeclKind::Function { is_async: false },
            };
            Some((name.to_string(), kind))
        }
        _ => declaration_at(tokens, index),
    }
}

/// Collect `export { local as exported }` lists declared in the module itself.
///
/// Maps local binding names to their exported names. Re-exports
/// (`export { a } from './x.js'`) name bindings of another module and are
/// skipped.
fn collect_export_lists(tokens: &[Token]) -> HashMap<String, String> {
    let mut exports = HashMap::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        match &token.kind {
            TokenKind::Punct('{' | '(' | '[') => depth += 1,
            TokenKind::Punct('}' | ')' | ']') => depth = depth.saturating_sub(1),
            TokenKind::Word(word)
                if word == "export" && depth == 0 && tokens.get(i + 1).is_some_and(|t| t.is_punct('{')) =>
            {
                let (pairs, close) = parse_export_list(tokens, i + 2);
                let is_reexport = tokens.get(close + 1).is_some_and(|t| t.is_word("from"));
                if !is_reexport {
                    exports.extend(pairs);
                }
                i = close + 1;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    exports
}

/// Parse `a, b as c, d as "e"` up to the closing brace.
///
/// Returns the pairs and the index of the closing brace (or the last token
/// if the list is unterminated).
fn parse_export_list(tokens: &[Token], start: usize) -> (Vec<(String, String)>, usize) {
    let mut pairs = Vec::new();
    let mut i = start;

    while let Some(token) = tokens.get(i) {
        if token.is_punct('}') {
            return (pairs, i);
        }
        if let Some(local) = token.word() {
            let exported = if tokens.get(i + 1).is_some_and(|t| t.is_word("as")) {
                i += 2;
                match tokens.get(i).map(|t| &t.kind) {
                    Some(TokenKind::Word(alias)) => alias.clone(),
                    Some(TokenKind::Str { value, .. }) => value.clone(),
                    _ => local.to_string(),
                }
            } else {
                local.to_string()
            };
            pairs.push((local.to_string(), exported));
        }
        i += 1;
    }

    (pairs, tokens.len().saturating_sub(1))
}

fn apply_edits(source: &str, edits: &[Edit]) -> String {
    let extra: usize = edits.iter().map(|e| e.text.len()).sum();
    let mut out = String::with_capacity(source.len() + extra);
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&source[cursor..edit.span.start]);
        out.push_str(&edit.text);
        cursor = edit.span.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Render `value` as a single-quoted JavaScript string literal.
fn single_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

// ============================================================================
// File-level entry point
// ============================================================================

/// Patch the file at `source_path` and write the result to
/// `<source dir>/temp.js`.
///
/// Relative paths are resolved against the current directory. The returned
/// artifact removes the patched file when dropped.
#[tracing::instrument(skip_all, fields(path = %source_path.display()))]
pub fn patch_file(source_path: &Path) -> Result<(PatchedSource, TempArtifact), PatchError> {
    let source_path = std::path::absolute(source_path).map_err(|source| PatchError::Resolve {
        path: source_path.to_path_buf(),
        source,
    })?;

    let temp_dir = source_path.parent().ok_or_else(|| PatchError::NoParentDir {
        path: source_path.clone(),
    })?;
    let temp_path = temp_dir.join(TEMP_FILE_NAME);
    if source_path == temp_path {
        return Err(PatchError::SourceIsArtifact { path: source_path });
    }

    let source = fs::read_to_string(&source_path).map_err(|source| PatchError::ReadSource {
        path: source_path.clone(),
        source,
    })?;

    let patcher = Patcher::new(temp_dir);
    let patched = patcher.patch(&source);
    tracing::info!(
        declarations = patched.declarations.len(),
        inserted = patched.inserted_exports(),
        rewrites = patched.rewrites.len(),
        "patched source"
    );

    let artifact = TempArtifact::create(temp_path.clone(), &patched.text)
        .map_err(|source| PatchError::WriteArtifact { path: temp_path, source })?;

    Ok((patched, artifact))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(source: &str) -> PatchedSource {
        Patcher::new("/work/exercises").patch(source)
    }

    fn names(patched: &PatchedSource) -> Vec<&str> {
        patched.declarations.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_exports_top_level_functions_and_classes() {
        let patched = patch(
            "function exercise_01() {\n  return 1;\n}\n\nclass Stack {\n  push(x) {}\n}\n\nasync function load() {}\n",
        );
        insta::assert_snapshot!(patched.text, @r"
        export function exercise_01() {
          return 1;
        }

        export class Stack {
          push(x) {}
        }

        export async function load() {}
        ");
        assert_eq!(names(&patched), vec!["exercise_01", "Stack", "load"]);
        assert_eq!(patched.declarations[1].kind, DeclKind::Class);
        assert_eq!(patched.declarations[2].kind, DeclKind::Function { is_async: true });
    }

    #[test]
    fn test_nested_declarations_untouched() {
        let source = "function outer() {\nfunction inner() {}\nclass Local {}\n  return inner;\n}\n";
        let patched = patch(source);
        assert_eq!(
            patched.text,
            "export function outer() {\nfunction inner() {}\nclass Local {}\n  return inner;\n}\n"
        );
        assert_eq!(names(&patched), vec!["outer"]);
    }

    #[test]
    fn test_same_line_declarations() {
        let patched = patch("function a(){return 1} function b(){throw new Error('x')}");
        assert_eq!(
            patched.text,
            "export function a(){return 1} export function b(){throw new Error('x')}"
        );
        assert_eq!(names(&patched), vec!["a", "b"]);
    }

    #[test]
    fn test_indented_top_level_declaration_exported() {
        let patched = patch("  function spaced() {}\n");
        assert_eq!(patched.text, "  export function spaced() {}\n");
    }

    #[test]
    fn test_declarations_in_literals_and_comments_ignored() {
        let source = concat!(
            "const s = '\\nfunction fake() {}';\n",
            "// function commented() {}\n",
            "/*\nclass Hidden {}\n*/\n",
            "const t = `\nfunction templated() {}\n`;\n",
        );
        let patched = patch(source);
        assert_eq!(patched.text, source);
        assert!(patched.declarations.is_empty());
    }

    #[test]
    fn test_function_and_class_expressions_ignored() {
        let source = "const f = function named() {};\nconst C = class Named {};\nrun(\nfunction cb() {}\n);\n";
        let patched = patch(source);
        assert_eq!(patched.text, source);
    }

    #[test]
    fn test_existing_exports_not_duplicated() {
        let source = "export function a() {}\nexport async function b() {}\nexport class C {}\n";
        let patched = patch(source);
        assert_eq!(patched.text, source);
        assert_eq!(names(&patched), vec!["a", "b", "C"]);
        assert!(patched.declarations.iter().all(|d| d.origin == ExportOrigin::Source));
    }

    #[test]
    fn test_export_list_names_respected() {
        let source = "function a() {}\nfunction b() {}\nexport { a as first };\n";
        let patched = patch(source);
        assert_eq!(
            patched.text,
            "function a() {}\nexport function b() {}\nexport { a as first };\n"
        );
        assert_eq!(names(&patched), vec!["first", "b"]);
        assert_eq!(patched.inserted_exports(), 1);
    }

    #[test]
    fn test_reexport_list_does_not_suppress_local_export() {
        let patched = patch("export { a } from './other.js';\nfunction a() {}\n");
        assert_eq!(patched.text, "export { a } from './other.js';\nexport function a() {}\n");
    }

    #[test]
    fn test_generator_and_split_async_not_matched() {
        let patched = patch("function* gen() {}\nasync\nfunction later() {}\n");
        assert_eq!(patched.text, "function* gen() {}\nasync\nexport function later() {}\n");
        assert_eq!(
            patched.declarations[0].kind,
            DeclKind::Function { is_async: false }
        );
    }

    #[test]
    fn test_no_declarations_is_identity() {
        let source = "const x = 1;\nconsole.log(x);\n";
        let patched = patch(source);
        assert_eq!(patched.text, source);
        assert_eq!(patched.inserted_exports(), 0);
    }

    #[test]
    fn test_read_file_paths_rewritten() {
        let patched = patch(
            "import fs from 'fs';\nfunction read() {\n  return fs.promises.readFile('./data/input.txt', 'utf8');\n}\n",
        );
        assert!(
            patched
                .text
                .contains("fs.promises.readFile('/work/exercises/input.txt', 'utf8')")
        );
        assert_eq!(
            patched.rewrites,
            vec![PathRewrite {
                original: "./data/input.txt".to_string(),
                rewritten: "/work/exercises/input.txt".to_string(),
            }]
        );
    }

    #[test]
    fn test_read_file_sync_double_quotes_normalized() {
        let patched = patch("const d = fs.readFileSync(\"notes.md\");\n");
        assert_eq!(patched.text, "const d = fs.readFileSync('/work/exercises/notes.md');\n");
    }

    #[test]
    fn test_non_literal_read_paths_left_alone() {
        let source = "fs.readFile(`${dir}/a.txt`);\nfs.readFile(name);\nfs.readFileAsync('x.txt');\n";
        let patched = patch(source);
        assert_eq!(patched.text, source);
        assert!(patched.rewrites.is_empty());
    }

    #[test]
    fn test_rewritten_path_is_escaped() {
        let patched = Patcher::new("/tmp/it's here").patch("fs.readFile('a.txt')");
        assert_eq!(patched.text, "fs.readFile('/tmp/it\\'s here/a.txt')");
    }

    #[test]
    fn test_patch_file_writes_temp_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("exercises.js");
        fs::write(&source_path, "function a() {}\n").unwrap();

        let (patched, artifact) = patch_file(&source_path).unwrap();
        assert_eq!(artifact.path(), dir.path().join(TEMP_FILE_NAME));
        assert_eq!(fs::read_to_string(artifact.path()).unwrap(), patched.text);

        let temp_path = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_patch_file_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = patch_file(&dir.path().join("missing.js")).unwrap_err();
        assert!(matches!(err, PatchError::ReadSource { .. }));
        assert!(!dir.path().join(TEMP_FILE_NAME).exists());
    }

    #[test]
    fn test_patch_file_refuses_source_named_like_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join(TEMP_FILE_NAME);
        fs::write(&source_path, "function a() {}\n").unwrap();

        let err = patch_file(&source_path).unwrap_err();
        assert!(matches!(err, PatchError::SourceIsArtifact { .. }));
        assert_eq!(fs::read_to_string(&source_path).unwrap(), "function a() {}\n");
    }

    #[test]
    fn test_patch_file_resolves_relative_path() {
        let dir = tempfile::tempdir_in(".").unwrap();
        fs::write(dir.path().join("exercises.js"), "fs.readFileSync('data/in.txt');\n").unwrap();
        let relative = Path::new(".").join(dir.path().file_name().unwrap()).join("exercises.js");

        let (patched, artifact) = patch_file(&relative).unwrap();
        assert!(artifact.path().is_absolute());
        assert!(Path::new(&patched.rewrites[0].rewritten).is_absolute());
        assert!(patched.rewrites[0].rewritten.ends_with("/in.txt"));
    }

    #[test]
    fn test_export_default_and_const_shapes() {
        let source = concat!(
            "export default function () {}\n",
            "export const arrow = () => {};\n",
            "export const later = async () => {};\n",
            "export let Shape = class {};\n",
            "export const data = [1, 2];\n",
            "function a() {}\n",
        );
        let patched = patch(source);
        assert_eq!(names(&patched), vec!["default", "arrow", "later", "Shape", "data", "a"]);
        assert_eq!(patched.declarations[0].kind, DeclKind::Function { is_async: false });
        assert_eq!(patched.declarations[2].kind, DeclKind::Function { is_async: true });
        assert_eq!(patched.declarations[3].kind, DeclKind::Class);
        assert_eq!(patched.inserted_exports(), 1);
        assert!(patched.text.ends_with("export function a() {}\n"));
    }

    #[test]
    fn test_export_default_class_is_class() {
        let patched = patch("export default class extends Base {}\n");
        assert_eq!(names(&patched), vec!["default"]);
        assert_eq!(patched.declarations[0].kind, DeclKind::Class);
    }
}
