//! Recursive-descent parser over the token stream.
//!
//! The parser builds a concrete tree for everything it understands and wraps
//! whatever it cannot parse in error nodes. A statement that fails to parse
//! reports exactly one diagnostic (the first offending token), is skipped up
//! to the end of its logical line, and parsing resumes with the next
//! statement. Rules that need only local context (targets, signatures, call
//! arguments, flow keywords) are checked as their productions complete; name
//! binding is recorded into a [`ScopeLog`] and analysed afterwards.

mod expr;
mod stmt;

use crate::checks::{FlowBlock, Frame, FrameKind, FutureImports};
use crate::error::{Error, Result};
use crate::grammar::{AsyncKeywords, Grammar};
use crate::location::Position;
use crate::scope::{EventKind, LogMark, MODULE_SCOPE, Role, ScopeId, ScopeKind, ScopeLog};
use crate::syntax::token::{LexError, Token, TokenKind};
use crate::targets::{BindContext, Shape, check_target};
use crate::tree::{NodeKind, SyntaxNode};
use crate::types::Diagnostic;

// ── Failures ────────────────────────────────────────────────────────────────

/// Where parsing continues after a failed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    /// Skip the rest of the logical line, and any block hanging off it.
    SkipLine,
    /// Continue at the offending token.
    Here,
}

#[derive(Debug)]
struct Failure {
    diagnostic: Diagnostic,
    resume: Resume,
}

impl Failure {
    fn skip_line(diagnostic: Diagnostic) -> Box<Self> {
        Box::new(Self {
            diagnostic,
            resume: Resume::SkipLine,
        })
    }
}

/// Failures are boxed to keep the frames of deeply nested productions small.
type PResult<T> = std::result::Result<T, Box<Failure>>;

/// Parser state captured before each statement.
struct Checkpoint {
    pos: usize,
    depth: usize,
    diagnostics: usize,
    frame: Frame,
    outer_frames: usize,
    scope: ScopeId,
    outer_scopes: usize,
    log: LogMark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Module,
    Nested,
}

// ── Parser ──────────────────────────────────────────────────────────────────

pub(super) struct Parser<'src, 'g> {
    tokens: Vec<Token<'src>>,
    pos: usize,
    grammar: &'g Grammar,
    /// Nesting of the expression being parsed, bounded by
    /// `Limits::expression_nesting`.
    depth: usize,
    diagnostics: Vec<Diagnostic>,
    /// Diagnostics from statements that already completed; recovery never
    /// discards these.
    committed: usize,
    frame: Frame,
    outer_frames: Vec<Frame>,
    scope: ScopeId,
    outer_scopes: Vec<ScopeId>,
    log: ScopeLog<'src>,
    future: FutureImports,
    /// Starred elements of displays seen in the current statement that have
    /// not been claimed as assignment targets. Only tracked before the
    /// unpacking generalizations, where such elements are otherwise illegal.
    loose_starred: Vec<Position>,
}

impl<'src, 'g> Parser<'src, 'g> {
    pub(super) fn new(tokens: Vec<Token<'src>>, grammar: &'g Grammar) -> Result<Self> {
        match tokens.last() {
            Some(last) if last.kind == TokenKind::EndMarker => {}
            _ => return Err(Error::Internal("token stream has no end marker".into())),
        }
        Ok(Self {
            tokens,
            pos: 0,
            grammar,
            depth: 0,
            diagnostics: Vec::new(),
            committed: 0,
            frame: Frame::module(),
            outer_frames: Vec::new(),
            scope: MODULE_SCOPE,
            outer_scopes: Vec::new(),
            log: ScopeLog::default(),
            future: FutureImports::default(),
            loose_starred: Vec::new(),
        })
    }

    /// `file_input: (NEWLINE | stmt)* ENDMARKER`
    pub(super) fn parse_file(
        mut self,
    ) -> Result<(SyntaxNode<'src>, Vec<Diagnostic>, ScopeLog<'src>)> {
        let mut children = Vec::new();
        self.statements(Block::Module, &mut children);
        if self.peek().kind != TokenKind::EndMarker {
            return Err(Error::Internal(format!(
                "parser stopped before the end marker, at {}",
                self.peek().start
            )));
        }
        children.push(self.bump());
        if self.pos != self.tokens.len() {
            return Err(Error::Internal("tokens left after the end marker".into()));
        }
        if !self.outer_frames.is_empty() || !self.outer_scopes.is_empty() {
            return Err(Error::Internal("unbalanced scopes after parsing".into()));
        }
        Ok((
            SyntaxNode::internal(NodeKind::FileInput, children),
            self.diagnostics,
            self.log,
        ))
    }

    // ── Token helpers ───────────────────────────────────────────────────────

    fn peek(&self) -> Token<'src> {
        self.peek_at(0)
    }

    /// The stream always ends with an end marker, which repeats forever.
    fn peek_at(&self, ahead: usize) -> Token<'src> {
        let last = self.tokens.len() - 1;
        self.tokens[(self.pos + ahead).min(last)]
    }

    fn bump(&mut self) -> SyntaxNode<'src> {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        SyntaxNode::Leaf(tok)
    }

    fn is_keyword(&self, tok: &Token<'_>) -> bool {
        if !tok.is_name() {
            return false;
        }
        if self.grammar.is_reserved(tok.text) {
            return true;
        }
        matches!(tok.text, "async" | "await")
            && self.grammar.features.async_keywords == AsyncKeywords::Contextual
            && self.frame.async_region
    }

    fn is_identifier(&self, tok: &Token<'_>) -> bool {
        tok.is_name() && !self.is_keyword(tok)
    }

    fn at_keyword(&self, word: &str) -> bool {
        let tok = self.peek();
        tok.is_word(word) && self.is_keyword(&tok)
    }

    fn eat_op(&mut self, op: &str) -> Option<SyntaxNode<'src>> {
        self.peek().is_op(op).then(|| self.bump())
    }

    fn eat_keyword(&mut self, word: &str) -> Option<SyntaxNode<'src>> {
        self.at_keyword(word).then(|| self.bump())
    }

    fn expect_op(&mut self, op: &str) -> PResult<SyntaxNode<'src>> {
        self.eat_op(op).ok_or_else(|| self.unexpected())
    }

    fn expect_keyword(&mut self, word: &str) -> PResult<SyntaxNode<'src>> {
        self.eat_keyword(word).ok_or_else(|| self.unexpected())
    }

    fn expect_name(&mut self) -> PResult<(SyntaxNode<'src>, Token<'src>)> {
        let tok = self.peek();
        if self.is_identifier(&tok) {
            Ok((self.bump(), tok))
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_newline(&mut self) -> PResult<SyntaxNode<'src>> {
        if self.peek().kind == TokenKind::Newline {
            Ok(self.bump())
        } else {
            Err(self.unexpected())
        }
    }

    /// Only dedents and the end marker remain.
    fn at_end_of_input(&self) -> bool {
        self.tokens[self.pos.min(self.tokens.len() - 1)..]
            .iter()
            .all(|t| matches!(t.kind, TokenKind::Dedent | TokenKind::EndMarker))
    }

    /// The failure for the current token.
    fn unexpected(&self) -> Box<Failure> {
        let tok = self.peek();
        let diagnostic = match tok.kind {
            TokenKind::Error(error) => error.diagnostic(tok.start),
            _ if self.at_end_of_input() => {
                Diagnostic::syntax(tok.start, "unexpected EOF while parsing")
            }
            _ => Diagnostic::syntax(tok.start, "invalid syntax"),
        };
        Failure::skip_line(diagnostic)
    }

    /// Enter one more level of expression nesting. Failures unwind to the
    /// statement checkpoint, which restores the depth, so only successful
    /// productions call [`Parser::ascend`].
    fn descend(&mut self) -> PResult<()> {
        if self.depth >= self.grammar.limits.expression_nesting {
            let at = self.peek().start;
            return Err(Failure::skip_line(Diagnostic::syntax(
                at,
                "too many nested expressions",
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn report_opt(&mut self, diagnostic: Option<Diagnostic>) {
        self.diagnostics.extend(diagnostic);
    }

    // ── Recovery ────────────────────────────────────────────────────────────

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            depth: self.depth,
            diagnostics: self.diagnostics.len(),
            frame: self.frame.clone(),
            outer_frames: self.outer_frames.len(),
            scope: self.scope,
            outer_scopes: self.outer_scopes.len(),
            log: self.log.mark(),
        }
    }

    /// Undo a failed statement: keep only its failure diagnostic, drop what
    /// it recorded, and skip past it. Returns the skipped tokens as an error
    /// node.
    fn recover(&mut self, cp: Checkpoint, failure: Box<Failure>) -> Option<SyntaxNode<'src>> {
        let Failure { diagnostic, resume } = *failure;
        self.diagnostics.truncate(cp.diagnostics.max(self.committed));
        self.report(diagnostic);
        self.depth = cp.depth;
        self.frame = cp.frame;
        self.outer_frames.truncate(cp.outer_frames);
        self.scope = cp.scope;
        self.outer_scopes.truncate(cp.outer_scopes);
        self.log.rollback(cp.log);
        self.loose_starred.clear();
        self.future.close();

        if resume == Resume::SkipLine {
            self.skip_line();
        }
        if self.pos == cp.pos
            && !matches!(self.peek().kind, TokenKind::Dedent | TokenKind::EndMarker)
        {
            self.pos += 1;
        }
        let skipped: Vec<_> = self.tokens[cp.pos..self.pos]
            .iter()
            .map(|tok| SyntaxNode::Leaf(*tok))
            .collect();
        (!skipped.is_empty()).then(|| SyntaxNode::internal(NodeKind::ErrorNode, skipped))
    }

    /// Skip through the next NEWLINE, then over an indented block that
    /// directly follows it.
    fn skip_line(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::Dedent | TokenKind::EndMarker => return,
                TokenKind::Newline => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        if self.peek().kind != TokenKind::Indent {
            return;
        }
        let mut depth = 0usize;
        loop {
            match self.peek().kind {
                TokenKind::EndMarker => return,
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    // ── Blocks ──────────────────────────────────────────────────────────────

    /// Parse statements until the end of the current block. A nested block
    /// stops at its DEDENT and leaves it for the caller.
    fn statements(&mut self, block: Block, out: &mut Vec<SyntaxNode<'src>>) {
        // Indents without a block to open; each is closed by a later dedent.
        let mut strays = 0usize;
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::EndMarker => break,
                TokenKind::Dedent if strays > 0 => {
                    strays -= 1;
                    out.push(self.bump());
                }
                TokenKind::Dedent if block == Block::Nested => break,
                TokenKind::Dedent => out.push(self.bump()),
                TokenKind::Indent => {
                    self.report(Diagnostic::indentation(
                        Position::line_start(tok.start.line),
                        "unexpected indent",
                    ));
                    let leaf = self.bump();
                    out.push(SyntaxNode::internal(NodeKind::ErrorNode, vec![leaf]));
                    strays += 1;
                }
                TokenKind::Error(error @ (LexError::BadDedent | LexError::TooDeep)) => {
                    self.report(error.diagnostic(tok.start));
                    out.push(self.bump());
                }
                _ => {
                    let cp = self.checkpoint();
                    match self.statement() {
                        Ok(node) => out.push(node),
                        Err(failure) => out.extend(self.recover(cp, failure)),
                    }
                }
            }
            self.committed = self.diagnostics.len();
        }
    }

    /// `suite: simple_stmt | NEWLINE INDENT stmt+ DEDENT`
    fn suite(&mut self) -> PResult<SyntaxNode<'src>> {
        if self.peek().kind != TokenKind::Newline {
            return self.simple_stmt();
        }
        let mut children = vec![self.bump()];
        let tok = self.peek();
        if tok.kind != TokenKind::Indent {
            if tok.is_error() || self.at_end_of_input() {
                return Err(self.unexpected());
            }
            return Err(Box::new(Failure {
                diagnostic: Diagnostic::indentation(
                    Position::line_start(tok.start.line),
                    "expected an indented block",
                ),
                resume: Resume::Here,
            }));
        }
        children.push(self.bump());
        self.statements(Block::Nested, &mut children);
        if self.peek().kind == TokenKind::Dedent {
            children.push(self.bump());
        }
        Ok(SyntaxNode::internal(NodeKind::Suite, children))
    }

    /// A loop body, where `break` and `continue` are legal.
    fn loop_body(&mut self) -> PResult<SyntaxNode<'src>> {
        self.frame.enter_block(FlowBlock::Loop);
        let body = self.suite();
        self.frame.exit_block();
        body
    }

    // ── Frames and scopes ───────────────────────────────────────────────────

    fn enter_frame(&mut self, kind: FrameKind, is_async: bool) {
        let inner = self.frame.nested(kind, is_async);
        self.outer_frames.push(std::mem::replace(&mut self.frame, inner));
    }

    fn exit_frame(&mut self) {
        let outer = self.outer_frames.pop().unwrap_or_else(Frame::module);
        let inner = std::mem::replace(&mut self.frame, outer);
        let problem = inner.finish(self.grammar);
        self.report_opt(problem);
    }

    fn enter_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let id = self.log.open(kind, self.scope);
        self.outer_scopes.push(std::mem::replace(&mut self.scope, id));
        id
    }

    fn exit_scope(&mut self) {
        self.scope = self.outer_scopes.pop().unwrap_or(MODULE_SCOPE);
    }

    /// Run `parse` in the scope enclosing the current one.
    fn in_enclosing_scope<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let inner = self.scope;
        self.scope = self.outer_scopes.last().copied().unwrap_or(MODULE_SCOPE);
        let result = parse(self);
        self.scope = inner;
        result
    }

    /// The scope an assignment expression binds in: the innermost one that
    /// is not a comprehension.
    fn binding_scope(&self) -> ScopeId {
        let scopes = self.log.scopes();
        std::iter::once(self.scope)
            .chain(self.outer_scopes.iter().rev().copied())
            .find(|&id| scopes[id].kind != ScopeKind::Comprehension)
            .unwrap_or(MODULE_SCOPE)
    }

    fn record(&mut self, kind: EventKind<'src>, at: Position) -> usize {
        self.log.record(self.scope, kind, at)
    }

    fn bind_name(&mut self, name: &'src str, at: Position) {
        self.record(EventKind::Name(name, Role::Assign), at);
    }

    /// Validate `shape` as a binding target and turn its names into bindings.
    fn bind_target(&mut self, shape: &Shape<'src>, ctx: BindContext) {
        let problem = check_target(shape, ctx, self.grammar);
        self.report_opt(problem);
        for (_, event, _) in shape.bound_names() {
            if let Some(event) = event {
                self.log.rebind(event, Role::Assign);
            }
        }
        let claimed = shape.starred_positions();
        self.loose_starred.retain(|at| !claimed.contains(at));
    }

    // ── Starred elements before 3.5 ─────────────────────────────────────────

    fn note_loose_starred(&mut self, elements: &[Shape<'src>]) {
        if self.grammar.features.unpacking_generalizations {
            return;
        }
        let starred = elements.iter().filter(|e| e.is_starred()).map(|e| e.start);
        self.loose_starred.extend(starred);
    }

    /// Report a starred display element that did not end up as a target.
    fn flush_loose_starred(&mut self) {
        if let Some(&first) = self.loose_starred.first() {
            self.report(Diagnostic::syntax(first, self.grammar.phrasing.starred_misuse));
        }
        self.loose_starred.clear();
    }

    fn check_bare_starred(&mut self, shape: &Shape<'_>) {
        if shape.is_starred() {
            self.report(Diagnostic::syntax(shape.start, self.grammar.phrasing.starred_misuse));
        }
    }
}
