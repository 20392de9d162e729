//! Lightweight JavaScript scanner
//!
//! This is not a full ECMAScript lexer. It produces just enough structure for
//! the patcher to find declarations and call sites reliably:
//! - Identifiers/keywords and single-character punctuation
//! - String, template and regex literals as opaque tokens
//! - Comments skipped entirely (a multi-line block comment counts as a line break)
//! - Line-break tracking between tokens (`Token::line_start`)
//!
//! Scanning never fails. Malformed input (an unterminated string, say) is
//! tokenized as far as possible and left for the engine to reject when the
//! module is parsed.
//!
//! ## Module Structure
//!
//! - `tokens` - Token types (TokenKind, Token, Span)
//! - `strings` - String/template literal scanning

mod strings;
pub mod tokens;

pub use tokens::{Span, Token, TokenKind};

use tokens::REGEX_PREFIX_WORDS;

// ============================================================================
// LEXER STATE
// ----------------------------------------------------------------------------
// [Between tokens] → skip whitespace/comments (note line breaks)
//        ↓
//   quote / backtick → [opaque literal] → until closing delimiter
//        ↓
//   '/' in operand position → [regex] → until unescaped '/' on the same line
//                                        (falls back to Punct('/') otherwise)
// ============================================================================

/// Scanner for JavaScript source text.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    /// A line terminator was skipped since the last emitted token
    saw_newline: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            saw_newline: true,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the entire source.
    pub fn tokenize(mut self) -> Vec<Token> {
        self.skip_hashbang();
        while self.skip_trivia() {
            self.scan_token();
        }
        self.tokens
    }

    // ========================================================================
    // Core character handling
    // ========================================================================

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens
            .push(Token::new(kind, Span::new(start, self.pos), self.saw_newline));
        self.saw_newline = false;
    }

    // ========================================================================
    // Trivia
    // ========================================================================

    fn skip_hashbang(&mut self) {
        if self.source.starts_with("#!") {
            self.skip_line_comment();
        }
    }

    /// Skip whitespace and comments. Returns `false` at end of input.
    fn skip_trivia(&mut self) -> bool {
        loop {
            match self.peek() {
                None => return false,
                Some(c) if is_line_terminator(c) => {
                    self.advance();
                    self.saw_newline = true;
                }
                Some(c) if c.is_whitespace() || c == '\u{feff}' => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => self.skip_line_comment(),
                Some('/') if self.peek_next() == Some('*') => self.skip_block_comment(),
                Some(_) => return true,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if is_line_terminator(c) {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        // Opening "/*"
        self.advance();
        self.advance();
        while let Some(c) = self.advance() {
            if is_line_terminator(c) {
                self.saw_newline = true;
            } else if c == '*' && self.peek() == Some('/') {
                self.advance();
                return;
            }
        }
    }

    // ========================================================================
    // Main scanning dispatch
    // ========================================================================

    fn scan_token(&mut self) {
        let start = self.pos;
        let Some(c) = self.advance() else {
            return;
        };

        match c {
            '\'' | '"' => {
                let value = self.scan_string_body(c);
                self.push(TokenKind::Str { quote: c, value }, start);
            }
            '`' => {
                // Comments inside substitutions are not line breaks between tokens
                let saw_newline = self.saw_newline;
                self.scan_template_body();
                self.saw_newline = saw_newline;
                self.push(TokenKind::Template, start);
            }
            '/' => {
                if self.regex_allowed() && self.scan_regex_body() {
                    self.push(TokenKind::Regex, start);
                } else {
                    self.pos = start + 1;
                    self.push(TokenKind::Punct('/'), start);
                }
            }
            '.' if self.peek().is_some_and(|n| n.is_ascii_digit()) => {
                self.scan_number_tail(start);
                self.push(TokenKind::Number, start);
            }
            c if c.is_ascii_digit() => {
                self.scan_number_tail(start);
                self.push(TokenKind::Number, start);
            }
            '#' if self.peek().is_some_and(is_ident_start) => {
                self.scan_word_tail();
                let word = self.source[start..self.pos].to_string();
                self.push(TokenKind::Word(word), start);
            }
            c if is_ident_start(c) => {
                self.scan_word_tail();
                let word = self.source[start..self.pos].to_string();
                self.push(TokenKind::Word(word), start);
            }
            c => self.push(TokenKind::Punct(c), start),
        }
    }

    fn scan_word_tail(&mut self) {
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_number_tail(&mut self, start: usize) {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.advance();
                // Signed exponent: 1e-5, 2.5E+3
                if matches!(c, 'e' | 'E') && matches!(self.peek(), Some('+' | '-')) {
                    let literal = &self.source[start..self.pos];
                    if !literal.starts_with("0x") && !literal.starts_with("0X") {
                        self.advance();
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Whether a `/` at the current point begins a regex literal.
    ///
    /// Decided from the previous token: after an operand (identifier, literal,
    /// closing bracket) it is a division operator.
    fn regex_allowed(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(prev) => match &prev.kind {
                TokenKind::Punct(')') | TokenKind::Punct(']') => false,
                TokenKind::Punct(_) => true,
                TokenKind::Word(w) => REGEX_PREFIX_WORDS.contains(&w.as_str()),
                TokenKind::Str { .. } | TokenKind::Template | TokenKind::Regex | TokenKind::Number => false,
            },
        }
    }

    /// Scan a regex body after the opening `/`.
    ///
    /// Returns `false` (leaving the position wherever it stopped) if no closing
    /// delimiter appears before the end of the line.
    fn scan_regex_body(&mut self) -> bool {
        let mut in_class = false;
        loop {
            let Some(c) = self.peek() else {
                return false;
            };
            if is_line_terminator(c) {
                return false;
            }
            self.advance();
            match c {
                '\\' => {
                    if self.peek().is_some_and(|n| !is_line_terminator(n)) {
                        self.advance();
                    }
                }
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => {
                    // flags
                    self.scan_word_tail();
                    return true;
                }
                _ => {}
            }
        }
    }
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '\u{200c}' || c == '\u{200d}'
}

/// Convenience function to lex a source string.
///
/// This is a shorthand for `Lexer::new(source).tokenize()`.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

// ============================================================================
// TESTS
// ============================================================================
