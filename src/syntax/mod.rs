//! Tokenizer and error-recovering parser.

pub mod lexer;
mod parser;
pub mod token;

pub use lexer::{Lexer, tokenize};
pub use token::{LexError, Token, TokenKind};

use crate::error::Result;
use crate::grammar::Grammar;
use crate::tree::Module;

/// Parse a whole module under `grammar`, then run the scope analysis over
/// what parsed.
pub fn parse_module<'src>(text: &'src str, grammar: &Grammar) -> Result<Module<'src>> {
    let tokens: Vec<Token<'src>> = Lexer::new(text)
        .with_indent_limit(grammar.limits.indent_levels)
        .with_bracket_limit(grammar.limits.bracket_levels)
        .collect();
    let (root, mut diagnostics, log) = parser::Parser::new(tokens, grammar)?.parse_file()?;
    diagnostics.extend(crate::scope::analyze(&log, grammar)?);
    Ok(Module::new(root, diagnostics))
}
