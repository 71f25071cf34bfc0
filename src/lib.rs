//! Error-tolerant Python parser for grammar versions 3.3 through 3.8.
//!
//! Parsing never fails on bad source: every module yields a concrete syntax
//! tree, with unparseable stretches wrapped in error nodes, plus the syntax
//! and indentation errors CPython would report for it, with CPython's
//! wording and positions.
//!
//! ```
//! let module = parsnip::parse("def f(:\n    pass\n", "3.8").unwrap();
//! let errors = module.diagnostics();
//! assert_eq!(errors[0].code(), 901);
//! assert_eq!(errors[0].start_pos(), (1, 6));
//! ```

pub mod analyze;
pub mod checks;
pub mod discovery;
pub mod error;
pub mod grammar;
pub mod literal;
pub mod location;
pub mod scope;
pub mod syntax;
pub mod targets;
pub mod tree;
pub mod types;

pub use error::{Error, Result};
pub use grammar::{Grammar, PythonVersion, load_grammar, supported_versions};
pub use literal::decode;
pub use location::Position;
pub use syntax::{Token, TokenKind, tokenize};
pub use tree::{Module, NodeKind, SyntaxNode};
pub use types::{Diagnostic, ErrorCode};

/// Parse `text` with the grammar for `version` (`"3.6"`, `"3.8.2"`, ...).
pub fn parse<'src>(text: &'src str, version: &str) -> Result<Module<'src>> {
    load_grammar(version)?.parse(text)
}
