//! Zero-copy Python tokenizer.
//!
//! Produces [`Token`]s whose text borrows `&'src str` slices directly from the
//! source buffer.
//!
//! Handles:
//! - INDENT / DEDENT via an indentation stack, including dedents that match no
//!   outer level and the indentation-depth ceiling
//! - Implicit line continuation inside `(`, `[`, `{`, abandoned when a
//!   statement keyword starts a line while brackets are still open
//! - Explicit line continuation via trailing `\`
//! - All string literal forms (prefixed, single and triple quoted)
//! - A synthetic NEWLINE when the last logical line has no line break
//!
//! The lexer never fails. Malformed input becomes a [`TokenKind::Error`] token
//! and tokenization carries on after it; only the indentation ceiling stops
//! the stream early.

use super::token::{LexError, Token, TokenKind};
use crate::grammar::Limits;
use crate::location::LineIndex;
use std::collections::VecDeque;

const OPERATORS_3: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const OPERATORS_2: &[&str] = &[
    "!=", "%=", "&=", "**", "*=", "+=", "-=", "->", "//", "/=", ":=", "<<", "<=", "==", ">=", ">>",
    "@=", "^=", "|=",
];
const OPERATORS_1: &[u8] = b"%&()*+,-./:;<=>@[]^{|}~";

/// Lower-cased prefixes that may precede a string literal.
const STRING_PREFIXES: &[&str] = &["r", "u", "b", "f", "br", "rb", "fr", "rf"];

/// Keywords that can only begin a statement. One of them inside brackets
/// means the brackets still open were never closed.
const STATEMENT_KEYWORDS: &[&str] = &[
    "assert", "break", "class", "continue", "def", "del", "except", "finally", "global",
    "import", "nonlocal", "pass", "return", "try", "while", "with",
];

/// Tokenize a whole buffer with the default indentation ceiling.
pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    Lexer::new(src).collect()
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

pub struct Lexer<'src> {
    src: &'src str,
    bytes: &'src [u8],
    index: LineIndex<'src>,
    /// Current byte position.
    pos: usize,
    /// Indentation stack; always starts with [0].
    indent_stack: Vec<usize>,
    /// Tokens produced ahead of time (DEDENT runs, the end of stream).
    pending: VecDeque<Token<'src>>,
    /// Whether the next logical line should trigger indent/dedent analysis.
    at_line_start: bool,
    /// Nesting depth of `()`, `[]`, `{}`.  When > 0 newlines are ignored.
    bracket_depth: usize,
    /// The current logical line has produced tokens and still owes a NEWLINE.
    line_open: bool,
    indent_limit: usize,
    bracket_limit: usize,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            index: LineIndex::new(src),
            pos: 0,
            indent_stack: vec![0],
            pending: VecDeque::new(),
            at_line_start: true,
            bracket_depth: 0,
            line_open: false,
            indent_limit: Limits::DEFAULT.indent_levels,
            bracket_limit: Limits::DEFAULT.bracket_levels,
            finished: false,
        }
    }

    /// Reject the line that would open indentation level `limit`.
    pub fn with_indent_limit(mut self, limit: usize) -> Self {
        self.indent_limit = limit;
        self
    }

    /// Reject the opening bracket that would nest `limit + 1` deep.
    pub fn with_bracket_limit(mut self, limit: usize) -> Self {
        self.bracket_limit = limit;
        self
    }

    /// At the end of a well-formed module this is always 0.
    pub fn bracket_depth(&self) -> usize {
        self.bracket_depth
    }

    fn token(&self, kind: TokenKind, start: usize, end: usize) -> Token<'src> {
        Token {
            kind,
            text: self.src.get(start..end).unwrap_or(""),
            start: self.index.position(start),
            end: self.index.position(end),
        }
    }

    /// A token that belongs to the current logical line.
    fn emit(&mut self, kind: TokenKind, start: usize, end: usize) -> Token<'src> {
        self.line_open = true;
        self.token(kind, start, end)
    }

    // ── internal tokenisation ────────────────────────────────────────────────

    fn lex(&mut self) -> Token<'src> {
        loop {
            if self.at_line_start && self.bracket_depth == 0 {
                self.at_line_start = false;
                self.handle_indent();
                if let Some(tok) = self.pending.pop_front() {
                    return tok;
                }
            }

            let Some(&b) = self.bytes.get(self.pos) else {
                return self.finish();
            };
            let start = self.pos;

            match b {
                b' ' | b'\t' | b'\x0c' => self.pos += 1,
                b'#' => self.skip_comment(),
                b'\n' | b'\r' => {
                    self.consume_newline();
                    if self.bracket_depth > 0 {
                        continue;
                    }
                    self.at_line_start = true;
                    if self.line_open {
                        self.line_open = false;
                        return self.token(TokenKind::Newline, start, self.pos);
                    }
                }
                b'\\' => {
                    self.pos += 1;
                    match self.bytes.get(self.pos) {
                        Some(b'\n' | b'\r') => self.consume_newline(),
                        None => {
                            return self.emit(
                                TokenKind::Error(LexError::ContinuationAtEof),
                                start,
                                self.pos,
                            );
                        }
                        Some(_) => {
                            return self.emit(
                                TokenKind::Error(LexError::StrayBackslash),
                                start,
                                self.pos,
                            );
                        }
                    }
                }
                b'"' | b'\'' => return self.lex_string(start, start),
                b'0'..=b'9' => return self.lex_number(start),
                b'.' if self.bytes.get(start + 1).is_some_and(u8::is_ascii_digit) => {
                    return self.lex_number(start);
                }
                b'_' | b'a'..=b'z' | b'A'..=b'Z' => return self.lex_name(start),
                _ if b >= 0x80 => {
                    let c = self.src.get(start..).and_then(|s| s.chars().next());
                    match c {
                        Some(c) if c.is_alphabetic() => return self.lex_name(start),
                        Some(c) => {
                            self.pos = start + c.len_utf8();
                            return self.emit(
                                TokenKind::Error(LexError::InvalidIdentifierCharacter),
                                start,
                                self.pos,
                            );
                        }
                        None => self.pos += 1,
                    }
                }
                _ => return self.lex_operator(start),
            }
        }
    }

    /// End of input: close the open line, unwind indentation, then ENDMARKER.
    fn finish(&mut self) -> Token<'src> {
        let end = self.bytes.len();
        if self.line_open && self.bracket_depth == 0 {
            self.line_open = false;
            return self.token(TokenKind::Newline, end, end);
        }
        self.terminate();
        match self.pending.pop_front() {
            Some(tok) => tok,
            None => self.token(TokenKind::EndMarker, end, end),
        }
    }

    fn terminate(&mut self) {
        let end = self.bytes.len();
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            let tok = self.token(TokenKind::Dedent, end, end);
            self.pending.push_back(tok);
        }
        let tok = self.token(TokenKind::EndMarker, end, end);
        self.pending.push_back(tok);
        self.finished = true;
    }

    fn skip_comment(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'\n' || b == b'\r' {
                break;
            }
            self.pos += 1;
        }
    }

    fn consume_newline(&mut self) {
        match self.bytes.get(self.pos) {
            Some(b'\r') => {
                self.pos += 1;
                if self.bytes.get(self.pos) == Some(&b'\n') {
                    self.pos += 1;
                }
            }
            Some(b'\n') => self.pos += 1,
            _ => {}
        }
    }

    // ── Indentation handling ──────────────────────────────────────────────────

    /// Skips blank and comment-only lines, then measures the indentation of
    /// the next logical line and queues INDENT / DEDENT / error tokens.
    fn handle_indent(&mut self) {
        let (line_start, column) = loop {
            let line_start = self.pos;
            let mut column = 0usize;
            while let Some(&b) = self.bytes.get(self.pos) {
                match b {
                    b' ' => column += 1,
                    b'\t' => column = (column / 8 + 1) * 8,
                    b'\x0c' => column = 0,
                    _ => break,
                }
                self.pos += 1;
            }
            match self.bytes.get(self.pos) {
                None => return,
                Some(b'#') => {
                    self.skip_comment();
                    self.consume_newline();
                }
                Some(b'\n' | b'\r') => self.consume_newline(),
                Some(_) => break (line_start, column),
            }
        };

        let current = self.indent_stack.last().copied().unwrap_or(0);
        if column > current {
            if self.indent_stack.len() >= self.indent_limit {
                let tok = self.token(TokenKind::Error(LexError::TooDeep), line_start, self.pos);
                self.pending.push_back(tok);
                self.terminate();
                return;
            }
            self.indent_stack.push(column);
            let tok = self.token(TokenKind::Indent, line_start, self.pos);
            self.pending.push_back(tok);
        } else {
            while column < self.indent_stack.last().copied().unwrap_or(0) {
                let depth = self.indent_stack.len();
                if depth >= 2 && column > self.indent_stack[depth - 2] {
                    let tok =
                        self.token(TokenKind::Error(LexError::BadDedent), line_start, self.pos);
                    self.pending.push_back(tok);
                    break;
                }
                self.indent_stack.pop();
                let tok = self.token(TokenKind::Dedent, self.pos, self.pos);
                self.pending.push_back(tok);
            }
        }
    }

    // ── Literals and names ────────────────────────────────────────────────────

    /// `start` is where the prefix begins, `quote_at` where the quotes do.
    fn lex_string(&mut self, start: usize, quote_at: usize) -> Token<'src> {
        let quote = self.bytes[quote_at];
        let triple = self.bytes.get(quote_at + 1) == Some(&quote)
            && self.bytes.get(quote_at + 2) == Some(&quote);
        let mut pos = quote_at + if triple { 3 } else { 1 };

        loop {
            let Some(&b) = self.bytes.get(pos) else {
                self.pos = self.bytes.len();
                let error = if triple {
                    LexError::UnterminatedTripleString
                } else {
                    LexError::UnterminatedString
                };
                return self.emit(TokenKind::Error(error), start, self.pos);
            };
            match b {
                b'\\' => {
                    pos += 1;
                    if self.bytes.get(pos) == Some(&b'\r') && self.bytes.get(pos + 1) == Some(&b'\n')
                    {
                        pos += 2;
                    } else if pos < self.bytes.len() {
                        pos += 1;
                    }
                }
                b'\n' | b'\r' if !triple => {
                    self.pos = pos;
                    return self.emit(
                        TokenKind::Error(LexError::UnterminatedString),
                        start,
                        pos,
                    );
                }
                _ if b == quote => {
                    if !triple {
                        pos += 1;
                        break;
                    }
                    if self.bytes.get(pos + 1) == Some(&quote)
                        && self.bytes.get(pos + 2) == Some(&quote)
                    {
                        pos += 3;
                        break;
                    }
                    pos += 1;
                }
                _ => pos += 1,
            }
        }

        self.pos = pos;
        self.emit(TokenKind::String, start, pos)
    }

    fn lex_number(&mut self, start: usize) -> Token<'src> {
        let bytes = self.bytes;
        let digits = |mut p: usize| {
            while bytes.get(p).is_some_and(|c| c.is_ascii_digit() || *c == b'_') {
                p += 1;
            }
            p
        };

        let mut pos = start;
        if bytes[pos] == b'0' && matches!(bytes.get(pos + 1), Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B')) {
            pos += 2;
            while bytes.get(pos).is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_') {
                pos += 1;
            }
        } else {
            pos = digits(pos);
            if bytes.get(pos) == Some(&b'.') {
                pos = digits(pos + 1);
            }
            if matches!(bytes.get(pos), Some(b'e' | b'E')) {
                let mut exp = pos + 1;
                if matches!(bytes.get(exp), Some(b'+' | b'-')) {
                    exp += 1;
                }
                if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
                    pos = digits(exp);
                }
            }
            if matches!(bytes.get(pos), Some(b'j' | b'J')) {
                pos += 1;
            }
        }

        self.pos = pos;
        self.emit(TokenKind::Number, start, pos)
    }

    fn lex_name(&mut self, start: usize) -> Token<'src> {
        let rest = self.src.get(start..).unwrap_or("");
        let mut end = start;
        for (i, c) in rest.char_indices() {
            if c == '_' || c.is_alphanumeric() {
                end = start + i + c.len_utf8();
            } else {
                break;
            }
        }

        if matches!(self.bytes.get(end), Some(b'"' | b'\'')) {
            let word = self.src.get(start..end).unwrap_or("");
            if STRING_PREFIXES.contains(&word.to_ascii_lowercase().as_str()) {
                return self.lex_string(start, end);
            }
        }

        if self.bracket_depth > 0 {
            let word = self.src.get(start..end).unwrap_or("");
            if STATEMENT_KEYWORDS.contains(&word) {
                if let Some(line_start) = self.first_on_line(start) {
                    return self.break_line(line_start);
                }
                self.bracket_depth = 0;
            }
        }

        self.pos = end;
        self.emit(TokenKind::Name, start, end)
    }

    /// Start of the physical line holding `offset`, when only whitespace
    /// precedes `offset` on it.
    fn first_on_line(&self, offset: usize) -> Option<usize> {
        let mut at = offset;
        while at > 0 {
            match self.bytes[at - 1] {
                b' ' | b'\t' | b'\x0c' => at -= 1,
                b'\n' | b'\r' => return Some(at),
                _ => return None,
            }
        }
        Some(0)
    }

    /// Drop the open brackets and end the logical line before `line_start`,
    /// so the line starting there is lexed as a fresh statement.
    fn break_line(&mut self, line_start: usize) -> Token<'src> {
        self.bracket_depth = 0;
        self.pos = line_start;
        self.at_line_start = true;
        if self.line_open {
            self.line_open = false;
            return self.token(TokenKind::Newline, line_start, line_start);
        }
        self.lex()
    }

    fn lex_operator(&mut self, start: usize) -> Token<'src> {
        let rest = &self.bytes[start..];
        let len = if OPERATORS_3.iter().any(|op| rest.starts_with(op.as_bytes())) {
            3
        } else if OPERATORS_2.iter().any(|op| rest.starts_with(op.as_bytes())) {
            2
        } else if OPERATORS_1.contains(&rest[0]) {
            1
        } else {
            self.pos = start + 1;
            return self.emit(TokenKind::Error(LexError::UnknownCharacter), start, self.pos);
        };

        if len == 1 {
            match rest[0] {
                b'(' | b'[' | b'{' => {
                    self.bracket_depth += 1;
                    if self.bracket_depth > self.bracket_limit {
                        self.pos = start + 1;
                        return self.emit(
                            TokenKind::Error(LexError::TooManyBrackets),
                            start,
                            self.pos,
                        );
                    }
                }
                b')' | b']' | b'}' => self.bracket_depth = self.bracket_depth.saturating_sub(1),
                _ => {}
            }
        }
        self.pos = start + len;
        self.emit(TokenKind::Operator, start, self.pos)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Token<'src>> {
        if let Some(tok) = self.pending.pop_front() {
            return Some(tok);
        }
        if self.finished {
            return None;
        }
        Some(self.lex())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Position;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).into_iter().map(|t| t.kind).collect()
    }

    fn texts(src: &str) -> Vec<&str> {
        tokenize(src).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_simple_assignment() {
        use TokenKind::*;
        assert_eq!(
            kinds("x = 1\n"),
            vec![Name, Operator, Number, Newline, EndMarker]
        );
    }

    #[test]
    fn test_implicit_newline_at_eof() {
        let toks = tokenize("1 +");
        assert_eq!(toks[2].kind, TokenKind::Newline);
        assert_eq!(toks[2].start, Position::new(1, 3));
        assert_eq!(toks[3].kind, TokenKind::EndMarker);
    }

    #[test]
    fn test_indent_and_dedent() {
        use TokenKind::*;
        assert_eq!(
            kinds("if x:\n    y\nz\n"),
            vec![
                Name, Name, Operator, Newline, Indent, Name, Newline, Dedent, Name, Newline,
                EndMarker
            ]
        );
    }

    #[test]
    fn test_dedents_flushed_at_eof() {
        use TokenKind::*;
        assert_eq!(
            kinds("if x:\n  if y:\n    z"),
            vec![
                Name, Name, Operator, Newline, Indent, Name, Name, Operator, Newline, Indent,
                Name, Newline, Dedent, Dedent, EndMarker
            ]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_ignored() {
        use TokenKind::*;
        assert_eq!(
            kinds("x\n\n   # comment\n\ny\n"),
            vec![Name, Newline, Name, Newline, EndMarker]
        );
    }

    #[test]
    fn test_newlines_ignored_inside_brackets() {
        use TokenKind::*;
        assert_eq!(
            kinds("f(a,\n      b)\n"),
            vec![
                Name, Operator, Name, Operator, Name, Operator, Newline, EndMarker
            ]
        );
    }

    #[test]
    fn test_unclosed_bracket_has_no_newline() {
        let toks = tokenize("[\n");
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[1].kind, TokenKind::EndMarker);
        assert_eq!(toks[1].start, Position::new(2, 0));
    }

    #[test]
    fn test_statement_keyword_closes_open_brackets() {
        use TokenKind::*;
        let toks = tokenize("x = (\ndef f():\n    pass\n");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                Name, Operator, Operator, Newline, Name, Name, Operator, Operator, Operator,
                Newline, Indent, Name, Newline, Dedent, EndMarker
            ]
        );
        assert_eq!(toks[3].start, Position::new(2, 0));
    }

    #[test]
    fn test_indented_statement_keyword_reindents() {
        use TokenKind::*;
        let toks = tokenize("if x:\n    f(\n    return 1\n");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                Name, Name, Operator, Newline, Indent, Name, Operator, Newline, Name, Number,
                Newline, Dedent, EndMarker
            ]
        );
    }

    #[test]
    fn test_statement_keyword_mid_line_closes_open_brackets() {
        use TokenKind::*;
        assert_eq!(
            kinds("f(x, return\ny\n"),
            vec![Name, Operator, Name, Operator, Name, Newline, Name, Newline, EndMarker]
        );
    }

    #[test]
    fn test_expression_keywords_keep_brackets_open() {
        use TokenKind::*;
        assert_eq!(
            kinds("y = [a\n     for a in b\n     if a]\n"),
            vec![
                Name, Operator, Operator, Name, Name, Name, Name, Name, Name, Name, Operator,
                Newline, EndMarker
            ]
        );
    }

    #[test]
    fn test_bracket_ceiling() {
        let src = format!("{}1{}", "(".repeat(4), ")".repeat(4));
        let toks: Vec<_> = Lexer::new(&src).with_bracket_limit(3).collect();
        let errors: Vec<_> = toks.iter().filter(|t| t.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, TokenKind::Error(LexError::TooManyBrackets));
        assert_eq!(errors[0].start, Position::new(1, 3));
        // Brackets stay balanced, so the line still ends.
        assert_eq!(toks[toks.len() - 2].kind, TokenKind::Newline);

        let fits: Vec<_> = Lexer::new(&src).with_bracket_limit(4).collect();
        assert!(fits.iter().all(|t| !t.is_error()));
    }

    #[test]
    fn test_line_continuation() {
        use TokenKind::*;
        assert_eq!(
            kinds("x = 1 + \\\n    2\n"),
            vec![Name, Operator, Number, Operator, Number, Newline, EndMarker]
        );
    }

    #[test]
    fn test_stray_backslash() {
        let toks = tokenize("\\blub");
        assert_eq!(toks[0].kind, TokenKind::Error(LexError::StrayBackslash));
        assert_eq!(toks[1].text, "blub");
    }

    #[test]
    fn test_string_prefixes() {
        assert_eq!(texts("rb'x' f\"{y}\" u'z'")[..3], ["rb'x'", "f\"{y}\"", "u'z'"]);
        // Not a prefix: a name followed by a string.
        assert_eq!(texts("ub'x'")[..2], ["ub", "'x'"]);
    }

    #[test]
    fn test_triple_quoted_spans_lines() {
        let toks = tokenize("'''a\nb''' + 1");
        assert_eq!(toks[0].kind, TokenKind::String);
        assert_eq!(toks[0].end, Position::new(2, 4));
    }

    #[test]
    fn test_escaped_quote_does_not_close() {
        let toks = tokenize(r#"u"\""#);
        assert_eq!(toks[0].kind, TokenKind::Error(LexError::UnterminatedString));
    }

    #[test]
    fn test_unterminated_strings() {
        assert_eq!(
            tokenize("'abc\nx")[0].kind,
            TokenKind::Error(LexError::UnterminatedString)
        );
        assert_eq!(
            tokenize("\"\"\"abc\n")[0].kind,
            TokenKind::Error(LexError::UnterminatedTripleString)
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(texts("0x_ff 1_000 1.5e-3j .5 1if")[..6], ["0x_ff", "1_000", "1.5e-3j", ".5", "1", "if"]);
    }

    #[test]
    fn test_longest_operator_match() {
        assert_eq!(texts("a **= b // c ... :=")[..7], ["a", "**=", "b", "//", "c", "...", ":="]);
    }

    #[test]
    fn test_unknown_character() {
        let toks = tokenize("1+?");
        assert_eq!(toks[2].kind, TokenKind::Error(LexError::UnknownCharacter));
        assert_eq!(toks[2].start, Position::new(1, 2));
    }

    #[test]
    fn test_unicode_identifier() {
        let toks = tokenize("größe = 1");
        assert_eq!(toks[0].text, "größe");
        assert_eq!(toks[1].start, Position::new(1, 6));
        assert_eq!(
            tokenize("€")[0].kind,
            TokenKind::Error(LexError::InvalidIdentifierCharacter)
        );
    }

    #[test]
    fn test_bad_dedent_keeps_level() {
        use TokenKind::*;
        assert_eq!(
            kinds("def x():\n    1\n 2\n"),
            vec![
                Name, Name, Operator, Operator, Operator, Newline, Indent, Number, Newline,
                Error(LexError::BadDedent), Number, Newline, Dedent, EndMarker
            ]
        );
    }

    #[test]
    fn test_indent_ceiling_is_terminal() {
        let mut src = String::new();
        for level in 0..3 {
            src.push_str(&" ".repeat(level));
            src.push_str("if x:\n");
        }
        src.push_str("   pass\n");
        let toks: Vec<_> = Lexer::new(&src).with_indent_limit(3).collect();
        let error = toks
            .iter()
            .position(|t| t.kind == TokenKind::Error(LexError::TooDeep))
            .unwrap();
        // Levels one and two fit; the third is rejected.
        assert_eq!(toks[error].start, Position::new(4, 0));
        assert!(
            toks[error + 1..]
                .iter()
                .all(|t| matches!(t.kind, TokenKind::Dedent | TokenKind::EndMarker))
        );
    }

    #[test]
    fn test_tokens_cover_source_in_order() {
        let src = "def f(a, b=2):\n    return a + b  # sum\n";
        let toks = tokenize(src);
        for pair in toks.windows(2) {
            assert!(pair[0].end <= pair[1].start || pair[1].text.is_empty());
        }
    }
}
