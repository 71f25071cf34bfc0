use crate::location::Position;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    Syntax,
    Indentation,
}

impl ErrorCode {
    pub const fn number(self) -> u16 {
        match self {
            ErrorCode::Syntax => 901,
            ErrorCode::Indentation => 903,
        }
    }

    /// Exception class the reference compiler raises for this code.
    pub const fn category(self) -> &'static str {
        match self {
            ErrorCode::Syntax => "SyntaxError",
            ErrorCode::Indentation => "IndentationError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.number())
    }
}

/// A syntax or static-scoping fault. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    code: ErrorCode,
    message: String,
    start: Position,
    end: Option<Position>,
}

impl Diagnostic {
    /// `message` is the bare compiler text; the category prefix is added here.
    pub fn new(code: ErrorCode, start: Position, message: impl fmt::Display) -> Self {
        Self {
            code,
            message: format!("{}: {message}", code.category()),
            start,
            end: None,
        }
    }

    pub fn syntax(start: Position, message: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Syntax, start, message)
    }

    pub fn indentation(start: Position, message: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Indentation, start, message)
    }

    pub fn with_end(mut self, end: Position) -> Self {
        self.end = Some(end);
        self
    }

    pub fn code(&self) -> u16 {
        self.code.number()
    }

    pub fn error_code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn start_pos(&self) -> (usize, usize) {
        self.start.as_tuple()
    }

    pub fn end_pos(&self) -> Option<(usize, usize)> {
        self.end.map(Position::as_tuple)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.start, self.code, self.message)
    }
}

/// Keep the first diagnostic reported for each line, then order by position.
///
/// The sort is stable, so discovery order breaks ties.
pub fn merge_diagnostics(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut seen_lines = std::collections::HashSet::new();
    let mut merged: Vec<Diagnostic> = diagnostics
        .into_iter()
        .filter(|d| seen_lines.insert(d.start.line))
        .collect();
    merged.sort_by_key(|d| d.start);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::syntax(Position::new(12, 5), "invalid syntax");
        assert_eq!(d.to_string(), "12:5: E901 SyntaxError: invalid syntax");
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::Syntax.to_string(), "E901");
        assert_eq!(ErrorCode::Indentation.to_string(), "E903");
    }

    #[test]
    fn test_indentation_prefix() {
        let d = Diagnostic::indentation(Position::new(1, 0), "unexpected indent");
        assert_eq!(d.code(), 903);
        assert_eq!(d.message(), "IndentationError: unexpected indent");
        assert_eq!(d.start_pos(), (1, 0));
        assert_eq!(d.end_pos(), None);
    }

    #[test]
    fn test_serialize() {
        let d = Diagnostic::syntax(Position::new(3, 1), "invalid syntax")
            .with_end(Position::new(3, 2));
        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(value["code"], "Syntax");
        assert_eq!(value["message"], "SyntaxError: invalid syntax");
        assert_eq!(value["start"]["line"], 3);
        assert_eq!(value["end"]["column"], 2);
    }

    #[test]
    fn test_merge_keeps_first_per_line() {
        let merged = merge_diagnostics(vec![
            Diagnostic::syntax(Position::new(2, 4), "second line"),
            Diagnostic::syntax(Position::new(1, 9), "first"),
            Diagnostic::syntax(Position::new(1, 0), "shadowed"),
        ]);
        let messages: Vec<_> = merged.iter().map(|d| d.message()).collect();
        assert_eq!(
            messages,
            ["SyntaxError: first", "SyntaxError: second line"]
        );
    }
}
