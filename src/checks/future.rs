//! Placement and feature checks for `from __future__ import ...`.

use crate::grammar::Grammar;
use crate::location::Position;
use crate::types::Diagnostic;

/// How a module-level simple statement bears on future imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureStatement<'a, 'src> {
    /// A statement consisting of string literals only.
    Docstring,
    /// `from __future__ import ...` with the imported feature names.
    Import(&'a [&'src str]),
    Other,
}

/// Tracks whether future imports are still allowed at module level.
#[derive(Debug, Clone)]
pub struct FutureImports {
    open: bool,
    docstring_allowed: bool,
}

impl Default for FutureImports {
    fn default() -> Self {
        Self {
            open: true,
            docstring_allowed: true,
        }
    }
}

impl FutureImports {
    /// Feed module-level simple statements in source order.
    pub fn observe(
        &mut self,
        statement: FutureStatement<'_, '_>,
        start: Position,
        grammar: &Grammar,
    ) -> Option<Diagnostic> {
        let docstring_allowed = std::mem::replace(&mut self.docstring_allowed, false);
        match statement {
            FutureStatement::Docstring if docstring_allowed => None,
            FutureStatement::Import(_) if !self.open => Some(misplaced(start)),
            FutureStatement::Import(names) => check_features(names, start, grammar),
            FutureStatement::Docstring | FutureStatement::Other => {
                self.open = false;
                None
            }
        }
    }

    /// Anything other than a simple statement ends the future-import prologue.
    pub fn close(&mut self) {
        self.open = false;
        self.docstring_allowed = false;
    }
}

pub fn misplaced(start: Position) -> Diagnostic {
    Diagnostic::syntax(
        start,
        "from __future__ imports must occur at the beginning of the file",
    )
}

fn check_features(names: &[&str], start: Position, grammar: &Grammar) -> Option<Diagnostic> {
    names.iter().find_map(|&name| {
        if name == "braces" {
            Some(Diagnostic::syntax(start, "not a chance"))
        } else if !grammar.future_features.contains(&name) {
            Some(Diagnostic::syntax(
                start,
                format!("future feature {name} is not defined"),
            ))
        } else {
            None
        }
    })
}
