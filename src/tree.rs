//! Concrete syntax tree.
//!
//! Every token the lexer produced ends up as exactly one [`SyntaxNode::Leaf`],
//! so walking the leaves of a [`Module`] reproduces the token stream. Internal
//! nodes own their children outright; there are no parent links.

use crate::location::Position;
use crate::syntax::token::{Token, TokenKind};
use crate::types::{Diagnostic, merge_diagnostics};

// ── Node kinds ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // Leaves.
    Name,
    Number,
    String,
    Operator,
    Newline,
    Indent,
    Dedent,
    EndMarker,
    ErrorLeaf,

    // Statements.
    FileInput,
    SimpleStmt,
    ExprStmt,
    AnnAssign,
    DelStmt,
    ReturnStmt,
    RaiseStmt,
    GlobalStmt,
    NonlocalStmt,
    AssertStmt,
    ImportName,
    ImportFrom,
    DottedName,
    DottedAsName,
    DottedAsNames,
    ImportAsName,
    ImportAsNames,
    IfStmt,
    WhileStmt,
    ForStmt,
    TryStmt,
    ExceptClause,
    WithStmt,
    WithItem,
    Funcdef,
    Classdef,
    AsyncStmt,
    AsyncFuncdef,
    Decorated,
    Decorator,
    Decorators,
    Suite,
    Parameters,
    Param,

    // Expressions.
    Lambdef,
    Test,
    NamedexprTest,
    OrTest,
    AndTest,
    NotTest,
    Comparison,
    CompOp,
    StarExpr,
    Expr,
    XorExpr,
    AndExpr,
    ShiftExpr,
    ArithExpr,
    Term,
    Factor,
    Power,
    AtomExpr,
    Atom,
    Strings,
    Trailer,
    TestlistComp,
    Dictorsetmaker,
    CompFor,
    SyncCompFor,
    CompIf,
    Arglist,
    Argument,
    Subscriptlist,
    Subscript,
    Sliceop,
    TestlistStarExpr,
    Exprlist,
    Testlist,
    YieldExpr,
    YieldArg,

    /// Tokens the parser could not fit into any production.
    ErrorNode,
}

impl NodeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeKind::Name => "name",
            NodeKind::Number => "number",
            NodeKind::String => "string",
            NodeKind::Operator => "operator",
            NodeKind::Newline => "newline",
            NodeKind::Indent => "indent",
            NodeKind::Dedent => "dedent",
            NodeKind::EndMarker => "endmarker",
            NodeKind::ErrorLeaf => "error_leaf",
            NodeKind::FileInput => "file_input",
            NodeKind::SimpleStmt => "simple_stmt",
            NodeKind::ExprStmt => "expr_stmt",
            NodeKind::AnnAssign => "annassign",
            NodeKind::DelStmt => "del_stmt",
            NodeKind::ReturnStmt => "return_stmt",
            NodeKind::RaiseStmt => "raise_stmt",
            NodeKind::GlobalStmt => "global_stmt",
            NodeKind::NonlocalStmt => "nonlocal_stmt",
            NodeKind::AssertStmt => "assert_stmt",
            NodeKind::ImportName => "import_name",
            NodeKind::ImportFrom => "import_from",
            NodeKind::DottedName => "dotted_name",
            NodeKind::DottedAsName => "dotted_as_name",
            NodeKind::DottedAsNames => "dotted_as_names",
            NodeKind::ImportAsName => "import_as_name",
            NodeKind::ImportAsNames => "import_as_names",
            NodeKind::IfStmt => "if_stmt",
            NodeKind::WhileStmt => "while_stmt",
            NodeKind::ForStmt => "for_stmt",
            NodeKind::TryStmt => "try_stmt",
            NodeKind::ExceptClause => "except_clause",
            NodeKind::WithStmt => "with_stmt",
            NodeKind::WithItem => "with_item",
            NodeKind::Funcdef => "funcdef",
            NodeKind::Classdef => "classdef",
            NodeKind::AsyncStmt => "async_stmt",
            NodeKind::AsyncFuncdef => "async_funcdef",
            NodeKind::Decorated => "decorated",
            NodeKind::Decorator => "decorator",
            NodeKind::Decorators => "decorators",
            NodeKind::Suite => "suite",
            NodeKind::Parameters => "parameters",
            NodeKind::Param => "param",
            NodeKind::Lambdef => "lambdef",
            NodeKind::Test => "test",
            NodeKind::NamedexprTest => "namedexpr_test",
            NodeKind::OrTest => "or_test",
            NodeKind::AndTest => "and_test",
            NodeKind::NotTest => "not_test",
            NodeKind::Comparison => "comparison",
            NodeKind::CompOp => "comp_op",
            NodeKind::StarExpr => "star_expr",
            NodeKind::Expr => "expr",
            NodeKind::XorExpr => "xor_expr",
            NodeKind::AndExpr => "and_expr",
            NodeKind::ShiftExpr => "shift_expr",
            NodeKind::ArithExpr => "arith_expr",
            NodeKind::Term => "term",
            NodeKind::Factor => "factor",
            NodeKind::Power => "power",
            NodeKind::AtomExpr => "atom_expr",
            NodeKind::Atom => "atom",
            NodeKind::Strings => "strings",
            NodeKind::Trailer => "trailer",
            NodeKind::TestlistComp => "testlist_comp",
            NodeKind::Dictorsetmaker => "dictorsetmaker",
            NodeKind::CompFor => "comp_for",
            NodeKind::SyncCompFor => "sync_comp_for",
            NodeKind::CompIf => "comp_if",
            NodeKind::Arglist => "arglist",
            NodeKind::Argument => "argument",
            NodeKind::Subscriptlist => "subscriptlist",
            NodeKind::Subscript => "subscript",
            NodeKind::Sliceop => "sliceop",
            NodeKind::TestlistStarExpr => "testlist_star_expr",
            NodeKind::Exprlist => "exprlist",
            NodeKind::Testlist => "testlist",
            NodeKind::YieldExpr => "yield_expr",
            NodeKind::YieldArg => "yield_arg",
            NodeKind::ErrorNode => "error_node",
        }
    }

    fn of_token(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Name => NodeKind::Name,
            TokenKind::Number => NodeKind::Number,
            TokenKind::String => NodeKind::String,
            TokenKind::Operator => NodeKind::Operator,
            TokenKind::Newline => NodeKind::Newline,
            TokenKind::Indent => NodeKind::Indent,
            TokenKind::Dedent => NodeKind::Dedent,
            TokenKind::EndMarker => NodeKind::EndMarker,
            TokenKind::Error(_) => NodeKind::ErrorLeaf,
        }
    }
}

// ── Nodes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxNode<'src> {
    Leaf(Token<'src>),
    /// `children` is never empty.
    Internal {
        kind: NodeKind,
        children: Vec<SyntaxNode<'src>>,
    },
}

impl<'src> SyntaxNode<'src> {
    pub(crate) fn internal(kind: NodeKind, children: Vec<SyntaxNode<'src>>) -> Self {
        debug_assert!(!children.is_empty(), "{} node without children", kind.as_str());
        SyntaxNode::Internal { kind, children }
    }

    /// `kind` around `children`, or the only child itself when there is
    /// just one.
    pub(crate) fn collapse(kind: NodeKind, mut children: Vec<SyntaxNode<'src>>) -> Self {
        if children.len() == 1 {
            if let Some(only) = children.pop() {
                return only;
            }
        }
        Self::internal(kind, children)
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            SyntaxNode::Leaf(tok) => NodeKind::of_token(tok.kind),
            SyntaxNode::Internal { kind, .. } => *kind,
        }
    }

    pub fn children(&self) -> &[SyntaxNode<'src>] {
        match self {
            SyntaxNode::Leaf(_) => &[],
            SyntaxNode::Internal { children, .. } => children,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind(), NodeKind::ErrorNode | NodeKind::ErrorLeaf)
    }

    pub fn as_token(&self) -> Option<&Token<'src>> {
        match self {
            SyntaxNode::Leaf(tok) => Some(tok),
            SyntaxNode::Internal { .. } => None,
        }
    }

    pub fn first_token(&self) -> Option<&Token<'src>> {
        self.leaves().next()
    }

    pub fn last_token(&self) -> Option<&Token<'src>> {
        let mut node = self;
        loop {
            match node {
                SyntaxNode::Leaf(tok) => return Some(tok),
                SyntaxNode::Internal { children, .. } => node = children.last()?,
            }
        }
    }

    pub fn start(&self) -> Position {
        self.first_token().map(|t| t.start).unwrap_or_default()
    }

    pub fn end(&self) -> Position {
        self.last_token().map(|t| t.end).unwrap_or_default()
    }

    /// The tokens under this node, in source order.
    pub fn leaves(&self) -> Leaves<'_, 'src> {
        Leaves { stack: vec![self] }
    }

    /// Depth-first walk over every node, this one included.
    pub fn descendants(&self) -> impl Iterator<Item = &SyntaxNode<'src>> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children().iter().rev());
            Some(node)
        })
    }
}

pub struct Leaves<'a, 'src> {
    stack: Vec<&'a SyntaxNode<'src>>,
}

impl<'a, 'src> Iterator for Leaves<'a, 'src> {
    type Item = &'a Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                SyntaxNode::Leaf(tok) => return Some(tok),
                SyntaxNode::Internal { children, .. } => self.stack.extend(children.iter().rev()),
            }
        }
        None
    }
}

// ── Module ───────────────────────────────────────────────────────────────────

/// The result of one parse: the `file_input` tree and everything wrong with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module<'src> {
    root: SyntaxNode<'src>,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Module<'src> {
    pub(crate) fn new(root: SyntaxNode<'src>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            root,
            diagnostics: merge_diagnostics(diagnostics),
        }
    }

    pub fn tree(&self) -> &SyntaxNode<'src> {
        &self.root
    }

    pub fn leaves(&self) -> Leaves<'_, 'src> {
        self.root.leaves()
    }

    /// Sorted by position; at most one per line.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
