//! Token types for the JavaScript scanner

// ============================================================================
// SPANS
// ============================================================================

/// Byte range into the scanned source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

// ============================================================================
// TOKEN TYPES
// ============================================================================

/// Token kinds the scanner distinguishes.
///
/// Only the shapes the patcher cares about are modelled precisely. Everything
/// that can hide braces or keywords (strings, templates, regexes, comments) is
/// scanned as a single opaque unit.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword (`function`, `class`, `foo`, `$el`)
    Word(String),
    /// Quoted string literal; `value` is the raw text between the quotes
    Str { quote: char, value: String },
    /// Template literal including any `${..}` substitutions
    Template,
    /// Regular expression literal
    Regex,
    /// Numeric literal
    Number,
    /// Any other single character of punctuation
    Punct(char),
}

/// A token with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator separates this token from the previous one
    /// (always true for the first token).
    pub line_start: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, line_start: bool) -> Self {
        Self { kind, span, line_start }
    }

    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w == word)
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w.as_str()),
            _ => None,
        }
    }
}

/// Words after which a `/` starts a regex literal rather than a division.
pub const REGEX_PREFIX_WORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];
