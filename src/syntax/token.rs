use crate::location::Position;
use crate::types::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Identifiers and keywords alike; the grammar decides which is which.
    Name,
    Number,
    /// Any string or bytes literal, prefix and quotes included.
    String,
    Operator,
    Newline,
    Indent,
    Dedent,
    EndMarker,
    Error(LexError),
}

/// What went wrong when the lexer produced an error token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexError {
    UnterminatedString,
    UnterminatedTripleString,
    /// A `\` followed by something other than a newline.
    StrayBackslash,
    /// A `\` as the very last character of the input.
    ContinuationAtEof,
    UnknownCharacter,
    /// A non-ASCII character that cannot start an identifier.
    InvalidIdentifierCharacter,
    /// A dedent to a column that matches no enclosing level.
    BadDedent,
    TooDeep,
    /// An opening bracket past the nesting ceiling.
    TooManyBrackets,
}

impl LexError {
    pub fn diagnostic(self, start: Position) -> Diagnostic {
        match self {
            LexError::UnterminatedString => {
                Diagnostic::syntax(start, "EOL while scanning string literal")
            }
            LexError::UnterminatedTripleString => {
                Diagnostic::syntax(start, "EOF while scanning triple-quoted string literal")
            }
            LexError::StrayBackslash => Diagnostic::syntax(
                start,
                "unexpected character after line continuation character",
            ),
            LexError::ContinuationAtEof => Diagnostic::syntax(start, "unexpected EOF while parsing"),
            LexError::UnknownCharacter => Diagnostic::syntax(start, "invalid syntax"),
            LexError::InvalidIdentifierCharacter => {
                Diagnostic::syntax(start, "invalid character in identifier")
            }
            LexError::BadDedent => Diagnostic::indentation(
                Position::line_start(start.line),
                "unindent does not match any outer indentation level",
            ),
            LexError::TooDeep => Diagnostic::indentation(
                Position::line_start(start.line),
                "too many levels of indentation",
            ),
            LexError::TooManyBrackets => Diagnostic::syntax(start, "too many nested parentheses"),
        }
    }
}

/// One lexical token. `text` borrows straight from the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub start: Position,
    pub end: Position,
}

impl<'src> Token<'src> {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    pub fn is_name(&self) -> bool {
        self.kind == TokenKind::Name
    }

    /// `true` for a name token spelled `word`, keyword or not.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Name && self.text == word
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, TokenKind::Error(_))
    }
}
