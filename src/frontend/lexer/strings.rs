//! String and template literal scanning
//!
//! Both scanners are entered after the opening delimiter has been consumed.

use super::tokens::REGEX_PREFIX_WORDS;
use super::{Lexer, is_ident_start, is_line_terminator};

impl<'a> Lexer<'a> {
    /// Scan a quoted string body and return its raw contents.
    ///
    /// Stops without consuming a line terminator if the string is left open;
    /// escaped line continuations (`\` + newline) are part of the string.
    pub(super) fn scan_string_body(&mut self, quote: char) -> String {
        let start = self.pos;
        let mut end = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                end = self.pos;
                self.advance();
                return self.source[start..end].to_string();
            }
            if is_line_terminator(c) {
                break;
            }
            self.advance();
            if c == '\\' {
                // `\` + CRLF is a single line continuation
                if self.peek() == Some('\r') && self.peek_next() == Some('\n') {
                    self.advance();
                }
                self.advance();
            }
            end = self.pos;
        }
        self.source[start..end].to_string()
    }

    /// Scan a template literal body up to and including the closing backtick.
    pub(super) fn scan_template_body(&mut self) {
        while let Some(c) = self.advance() {
            match c {
                '\\' => {
                    self.advance();
                }
                '`' => return,
                '$' if self.peek() == Some('{') => {
                    self.advance();
                    self.skip_substitution();
                }
                _ => {}
            }
        }
    }

    /// Skip a `${ .. }` substitution, honouring nested braces and literals.
    ///
    /// Regex literals are recognised with the same operand/operator rule as
    /// top-level scanning, tracked over the characters seen so far.
    fn skip_substitution(&mut self) {
        let mut depth = 1usize;
        // A `/` here starts a regex rather than a division
        let mut operand_expected = true;
        while let Some(c) = self.peek() {
            if c == '/' && matches!(self.peek_next(), Some('/' | '*')) {
                if self.peek_next() == Some('/') {
                    self.skip_line_comment();
                } else {
                    self.skip_block_comment();
                }
                continue;
            }
            let start = self.pos;
            self.advance();
            match c {
                '{' => {
                    depth += 1;
                    operand_expected = true;
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                    operand_expected = false;
                }
                '\'' | '"' => {
                    self.scan_string_body(c);
                    operand_expected = false;
                }
                '`' => {
                    self.scan_template_body();
                    operand_expected = false;
                }
                '/' if operand_expected => {
                    if !self.scan_regex_body() {
                        self.pos = start + 1;
                    }
                    operand_expected = false;
                }
                c if is_ident_start(c) || c.is_ascii_digit() => {
                    self.scan_word_tail();
                    operand_expected = REGEX_PREFIX_WORDS.contains(&&self.source[start..self.pos]);
                }
                ')' | ']' => operand_expected = false,
                c if c.is_whitespace() => {}
                _ => operand_expected = true,
            }
        }
    }
}
