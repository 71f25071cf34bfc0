use serde::Serialize;
use std::cell::Cell;
use std::fmt;

/// A point in the source: 1-based line, 0-based column counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Start of `line`.
    pub const fn line_start(line: usize) -> Self {
        Self { line, column: 0 }
    }

    pub const fn as_tuple(self) -> (usize, usize) {
        (self.line, self.column)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Maps byte offsets into a source buffer to [`Position`]s.
///
/// `\n`, `\r\n` and a lone `\r` all terminate a line.
///
/// Lookups are cheapest in ascending order: columns are counted on from the
/// previous lookup when it was on the same line.
pub struct LineIndex<'src> {
    src: &'src str,
    line_starts: Vec<usize>,
    /// Line, byte offset and column of the last lookup.
    last: Cell<(usize, usize, usize)>,
}

impl<'src> LineIndex<'src> {
    pub fn new(src: &'src str) -> Self {
        let bytes = src.as_bytes();
        let mut line_starts = vec![0];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => line_starts.push(i + 1),
                b'\r' if bytes.get(i + 1) != Some(&b'\n') => line_starts.push(i + 1),
                _ => {}
            }
            i += 1;
        }
        Self {
            src,
            line_starts,
            last: Cell::new((1, 0, 0)),
        }
    }

    /// Position of the byte at `offset`. Offsets past the end clamp to the
    /// end of the buffer.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.src.len());
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let (from, counted) = match self.last.get() {
            (last_line, at, column) if last_line == line && at <= offset => (at, column),
            _ => (self.line_starts[line - 1], 0),
        };
        let column = counted
            + self
                .src
                .get(from..offset)
                .map_or(offset - from, |s| s.chars().count());
        self.last.set((line, offset, column));
        Position::new(line, column)
    }

    pub fn end(&self) -> Position {
        self.position(self.src.len())
    }
}
