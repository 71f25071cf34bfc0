//! Expressions, from `test` down to atoms, plus displays, comprehensions and
//! call arguments.
//!
//! Every production returns an [`Expr`]: the concrete node together with the
//! [`Shape`] that target and argument checks look at.

use super::{Failure, PResult, Parser};
use crate::checks::{ArgumentKind, CallArgument, FrameKind, check_call_arguments, check_parameters};
use crate::literal::{Literal, decode};
use crate::location::Position;
use crate::scope::{EventKind, LogMark, Role, ScopeKind};
use crate::syntax::token::TokenKind;
use crate::targets::{BindContext, Comprehension, Constant, Shape, ShapeKind, check_named};
use crate::tree::{NodeKind, SyntaxNode};
use crate::types::Diagnostic;

pub(super) struct Expr<'src> {
    pub(super) node: SyntaxNode<'src>,
    pub(super) shape: Shape<'src>,
}

impl<'src> Expr<'src> {
    fn new(node: SyntaxNode<'src>, kind: ShapeKind<'src>, start: Position) -> Self {
        Self {
            node,
            shape: Shape::new(kind, start),
        }
    }

    pub(super) fn start(&self) -> Position {
        self.shape.start
    }

    /// A bare identifier, not wrapped in parentheses.
    pub(super) fn is_simple_name(&self) -> bool {
        matches!(&self.node, SyntaxNode::Leaf(tok) if tok.kind == TokenKind::Name)
    }
}

/// What sits between the brackets of a tuple or list display.
enum Contents<'src> {
    /// One element and no comma.
    Single(Expr<'src>),
    Elements(SyntaxNode<'src>, Vec<Shape<'src>>),
    Comprehension(SyntaxNode<'src>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BraceItem {
    Entry,
    DictUnpack,
    Element,
    SetUnpack,
}

type Operand<'src, 'g> = fn(&mut Parser<'src, 'g>) -> PResult<Expr<'src>>;

const COMPARISON_OPS: &[&str] = &["<", ">", "==", ">=", "<=", "!="];

/// Operator precedence, loosest first. `Not` and `Factor` have no binary
/// operators of their own; they mark where `not` and unary operands begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Level {
    Or,
    And,
    Not,
    Comparison,
    BitOr,
    BitXor,
    BitAnd,
    Shift,
    Arith,
    Term,
    Factor,
}

impl Level {
    /// Level of the operands on either side of this level's operators.
    fn tighter(self) -> Level {
        match self {
            Level::Or => Level::And,
            Level::And => Level::Not,
            Level::Not => Level::Comparison,
            Level::Comparison => Level::BitOr,
            Level::BitOr => Level::BitXor,
            Level::BitXor => Level::BitAnd,
            Level::BitAnd => Level::Shift,
            Level::Shift => Level::Arith,
            Level::Arith => Level::Term,
            Level::Term | Level::Factor => Level::Factor,
        }
    }

    fn node_kind(self) -> NodeKind {
        match self {
            Level::Or => NodeKind::OrTest,
            Level::And => NodeKind::AndTest,
            Level::Not => NodeKind::NotTest,
            Level::Comparison => NodeKind::Comparison,
            Level::BitOr => NodeKind::Expr,
            Level::BitXor => NodeKind::XorExpr,
            Level::BitAnd => NodeKind::AndExpr,
            Level::Shift => NodeKind::ShiftExpr,
            Level::Arith => NodeKind::ArithExpr,
            Level::Term => NodeKind::Term,
            Level::Factor => NodeKind::Factor,
        }
    }
}

impl<'src, 'g> Parser<'src, 'g> {
    /// Whether the current token can begin an expression; decides where
    /// optional trailing elements stop.
    pub(super) fn starts_expression(&self, allow_star: bool) -> bool {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Number | TokenKind::String => true,
            TokenKind::Name => {
                !self.is_keyword(&tok)
                    || matches!(tok.text, "lambda" | "not" | "None" | "True" | "False" | "await")
            }
            TokenKind::Operator => {
                matches!(tok.text, "(" | "[" | "{" | "-" | "+" | "~" | "...")
                    || (allow_star && tok.text == "*")
            }
            _ => false,
        }
    }

    // ── Lists of expressions ────────────────────────────────────────────────

    /// `item (',' item)* [',']`; a tuple as soon as there is a comma.
    fn expression_list(
        &mut self,
        kind: NodeKind,
        allow_star: bool,
        item: Operand<'src, 'g>,
    ) -> PResult<Expr<'src>> {
        let first = self.list_item(allow_star, item)?;
        if !self.peek().is_op(",") {
            return Ok(first);
        }
        let start = first.start();
        let mut children = vec![first.node];
        let mut elements = vec![first.shape];
        while self.peek().is_op(",") {
            children.push(self.bump());
            if !self.starts_expression(allow_star) {
                break;
            }
            let next = self.list_item(allow_star, item)?;
            children.push(next.node);
            elements.push(next.shape);
        }
        self.note_loose_starred(&elements);
        Ok(Expr::new(
            SyntaxNode::internal(kind, children),
            ShapeKind::Tuple(elements),
            start,
        ))
    }

    fn list_item(&mut self, allow_star: bool, item: Operand<'src, 'g>) -> PResult<Expr<'src>> {
        if allow_star && self.peek().is_op("*") {
            self.star_expr()
        } else {
            item(self)
        }
    }

    pub(super) fn testlist_star_expr(&mut self) -> PResult<Expr<'src>> {
        self.expression_list(NodeKind::TestlistStarExpr, true, Self::test)
    }

    pub(super) fn testlist(&mut self) -> PResult<Expr<'src>> {
        self.expression_list(NodeKind::Testlist, false, Self::test)
    }

    pub(super) fn exprlist(&mut self) -> PResult<Expr<'src>> {
        self.expression_list(NodeKind::Exprlist, true, Self::expr)
    }

    /// The value of a `return`, `yield` or annotated assignment.
    pub(super) fn returned_value(&mut self) -> PResult<Expr<'src>> {
        let value = if self.grammar.features.unparenthesized_unpacking {
            self.testlist_star_expr()?
        } else {
            self.testlist()?
        };
        self.check_bare_starred(&value.shape);
        Ok(value)
    }

    fn star_expr(&mut self) -> PResult<Expr<'src>> {
        let start = self.peek().start;
        let star = self.expect_op("*")?;
        let inner = self.expr()?;
        Ok(Expr::new(
            SyntaxNode::internal(NodeKind::StarExpr, vec![star, inner.node]),
            ShapeKind::Starred(Box::new(inner.shape)),
            start,
        ))
    }

    // ── Tests ───────────────────────────────────────────────────────────────

    /// `test: or_test ['if' or_test 'else' test] | lambdef`
    pub(super) fn test(&mut self) -> PResult<Expr<'src>> {
        self.descend()?;
        if self.at_keyword("lambda") {
            let lambda = self.lambdef(false)?;
            self.ascend();
            return Ok(lambda);
        }
        let body = self.or_test()?;
        if !self.at_keyword("if") {
            self.ascend();
            return Ok(body);
        }
        let start = body.start();
        let if_kw = self.bump();
        let condition = self.or_test()?;
        let else_kw = self.expect_keyword("else")?;
        let orelse = self.test()?;
        self.ascend();
        Ok(Expr::new(
            SyntaxNode::internal(
                NodeKind::Test,
                vec![body.node, if_kw, condition.node, else_kw, orelse.node],
            ),
            ShapeKind::Conditional,
            start,
        ))
    }

    fn test_nocond(&mut self) -> PResult<Expr<'src>> {
        self.descend()?;
        let expr = if self.at_keyword("lambda") {
            self.lambdef(true)?
        } else {
            self.or_test()?
        };
        self.ascend();
        Ok(expr)
    }

    /// `test [':=' test]` where assignment expressions exist.
    pub(super) fn namedexpr_test(&mut self) -> PResult<Expr<'src>> {
        let target = self.test()?;
        if self.grammar.features.assignment_expressions && self.peek().is_op(":=") {
            return self.named_tail(target);
        }
        Ok(target)
    }

    fn named_tail(&mut self, target: Expr<'src>) -> PResult<Expr<'src>> {
        let op = self.bump();
        let value = self.test()?;
        let problem = check_named(&target.shape, self.grammar);
        self.report_opt(problem);
        if let ShapeKind::Name {
            event: Some(event), ..
        } = target.shape.kind
        {
            let scope = self.binding_scope();
            self.log.bind_named(event, scope);
        }
        let start = target.start();
        Ok(Expr::new(
            SyntaxNode::internal(NodeKind::NamedexprTest, vec![target.node, op, value.node]),
            ShapeKind::NamedExpr,
            start,
        ))
    }

    fn lambdef(&mut self, nocond: bool) -> PResult<Expr<'src>> {
        let start = self.peek().start;
        let mut children = vec![self.bump()]; // consume 'lambda'
        let (params, signature) = self.parameter_list(":", false)?;
        children.extend(params);
        children.push(self.expect_op(":")?);
        let problem = check_parameters(&signature, self.grammar);
        self.report_opt(problem);

        self.enter_scope(ScopeKind::Lambda);
        self.record_parameters(&signature);
        self.enter_frame(FrameKind::Lambda, false);
        let body = if nocond { self.test_nocond() } else { self.test() };
        self.exit_frame();
        self.exit_scope();

        children.push(body?.node);
        Ok(Expr::new(
            SyntaxNode::internal(NodeKind::Lambdef, children),
            ShapeKind::Lambda,
            start,
        ))
    }

    // ── Operators ───────────────────────────────────────────────────────────
    //
    // `or_test` down to `term`, by precedence climbing: one loop per operator
    // level instead of one call per grammar rule.

    pub(super) fn or_test(&mut self) -> PResult<Expr<'src>> {
        self.operation(Level::Or)
    }

    /// `expr: xor_expr ('|' xor_expr)*`
    pub(super) fn expr(&mut self) -> PResult<Expr<'src>> {
        self.operation(Level::BitOr)
    }

    /// An expression whose operators all bind at least as tightly as `min`.
    fn operation(&mut self, min: Level) -> PResult<Expr<'src>> {
        let first = if min <= Level::Not && self.at_keyword("not") {
            self.negation()?
        } else {
            self.factor()?
        };
        self.climb(first, min)
    }

    /// Extend `left` with the operators that follow it, as long as they bind
    /// at least as tightly as `min`. Each level becomes one node holding all
    /// of its operands.
    fn climb(&mut self, mut left: Expr<'src>, min: Level) -> PResult<Expr<'src>> {
        while let Some(level) = self.operator_level().filter(|&level| level >= min) {
            let start = left.start();
            let mut children = vec![left.node];
            while self.operator_level() == Some(level) {
                children.push(self.operator(level));
                children.push(self.operation(level.tighter())?.node);
            }
            let shape = if level == Level::Comparison {
                ShapeKind::Comparison
            } else {
                ShapeKind::Operator
            };
            left = Expr::new(SyntaxNode::internal(level.node_kind(), children), shape, start);
        }
        Ok(left)
    }

    /// `not_test: 'not' not_test | comparison`, with the `not`s unrolled.
    fn negation(&mut self) -> PResult<Expr<'src>> {
        let mut nots = Vec::new();
        while self.at_keyword("not") {
            self.descend()?;
            nots.push(self.bump());
        }
        let mut operand = self.operation(Level::Comparison)?;
        for not_kw in nots.into_iter().rev() {
            self.ascend();
            let start = not_kw.start();
            operand = Expr::new(
                SyntaxNode::internal(NodeKind::NotTest, vec![not_kw, operand.node]),
                ShapeKind::Operator,
                start,
            );
        }
        Ok(operand)
    }

    /// Level of the binary operator at the cursor.
    fn operator_level(&self) -> Option<Level> {
        let tok = self.peek();
        if tok.kind == TokenKind::Operator {
            return match tok.text {
                "|" => Some(Level::BitOr),
                "^" => Some(Level::BitXor),
                "&" => Some(Level::BitAnd),
                "<<" | ">>" => Some(Level::Shift),
                "+" | "-" => Some(Level::Arith),
                "*" | "/" | "%" | "//" => Some(Level::Term),
                "@" if self.grammar.features.matrix_multiply => Some(Level::Term),
                op if COMPARISON_OPS.contains(&op) => Some(Level::Comparison),
                _ => None,
            };
        }
        if self.at_keyword("or") {
            Some(Level::Or)
        } else if self.at_keyword("and") {
            Some(Level::And)
        } else {
            (self.comparison_operator() > 0).then_some(Level::Comparison)
        }
    }

    /// Consume the operator at the cursor. Two-word comparisons become one
    /// `comp_op` node.
    fn operator(&mut self, level: Level) -> SyntaxNode<'src> {
        if level == Level::Comparison && self.comparison_operator() == 2 {
            let pair = vec![self.bump(), self.bump()];
            return SyntaxNode::internal(NodeKind::CompOp, pair);
        }
        self.bump()
    }

    /// Number of tokens in the comparison operator at the cursor, or zero.
    fn comparison_operator(&self) -> usize {
        let tok = self.peek();
        if tok.kind == TokenKind::Operator && COMPARISON_OPS.contains(&tok.text) {
            return 1;
        }
        if self.at_keyword("in") {
            return 1;
        }
        if self.at_keyword("is") {
            return if self.peek_at(1).is_word("not") { 2 } else { 1 };
        }
        if self.at_keyword("not") && self.peek_at(1).is_word("in") {
            return 2;
        }
        0
    }

    /// `factor: ('+'|'-'|'~') factor | power` with `power: atom_expr ['**'
    /// factor]`, unrolled: prefixes and `**` operands are read left to right,
    /// then nested from the right.
    fn factor(&mut self) -> PResult<Expr<'src>> {
        let mut segments = Vec::new();
        loop {
            let mut prefixes = Vec::new();
            while self.at_unary_operator() {
                self.descend()?;
                prefixes.push(self.bump());
            }
            let base = self.atom_expr()?;
            let power = if self.peek().is_op("**") {
                self.descend()?;
                Some(self.bump())
            } else {
                None
            };
            let last = power.is_none();
            segments.push((prefixes, base, power));
            if last {
                break;
            }
        }

        let mut value: Option<Expr<'src>> = None;
        for (prefixes, base, power) in segments.into_iter().rev() {
            let mut expr = match (power, value.take()) {
                (Some(op), Some(exponent)) => {
                    self.ascend();
                    let start = base.start();
                    Expr::new(
                        SyntaxNode::internal(NodeKind::Power, vec![base.node, op, exponent.node]),
                        ShapeKind::Operator,
                        start,
                    )
                }
                _ => base,
            };
            for prefix in prefixes.into_iter().rev() {
                self.ascend();
                let start = prefix.start();
                expr = Expr::new(
                    SyntaxNode::internal(NodeKind::Factor, vec![prefix, expr.node]),
                    ShapeKind::Operator,
                    start,
                );
            }
            value = Some(expr);
        }
        value.ok_or_else(|| self.unexpected())
    }

    fn at_unary_operator(&self) -> bool {
        let tok = self.peek();
        tok.kind == TokenKind::Operator && matches!(tok.text, "+" | "-" | "~")
    }

    // ── Trailers ────────────────────────────────────────────────────────────

    /// `atom_expr: [AWAIT] atom trailer*`
    fn atom_expr(&mut self) -> PResult<Expr<'src>> {
        let tok = self.peek();
        let await_kw = if tok.is_word("await") && self.is_keyword(&tok) {
            let problem = self.frame.check_await(tok.start);
            self.report_opt(problem);
            Some(self.bump())
        } else {
            None
        };

        let atom = self.atom()?;
        let start = atom.start();
        let mut shape = atom.shape;
        let mut trailers = Vec::new();
        loop {
            let next = self.peek();
            let (trailer, kind) = if next.is_op("(") {
                (self.call_parentheses()?, ShapeKind::Call)
            } else if next.is_op("[") {
                let open = self.bump();
                let index = self.subscriptlist()?;
                let close = self.expect_op("]")?;
                (vec![open, index, close], ShapeKind::Subscript)
            } else if next.is_op(".") {
                let dot = self.bump();
                let (name, _) = self.expect_name()?;
                (vec![dot, name], ShapeKind::Attribute)
            } else {
                break;
            };
            trailers.push(SyntaxNode::internal(NodeKind::Trailer, trailer));
            shape = Shape::new(kind, start);
        }

        if await_kw.is_none() && trailers.is_empty() {
            return Ok(Expr {
                node: atom.node,
                shape,
            });
        }
        if await_kw.is_some() {
            shape = Shape::new(ShapeKind::Await, tok.start);
        }
        let children = await_kw
            .into_iter()
            .chain(std::iter::once(atom.node))
            .chain(trailers)
            .collect();
        Ok(Expr {
            node: SyntaxNode::internal(NodeKind::AtomExpr, children),
            shape,
        })
    }

    /// `'(' [arglist] ')'` of a call, class bases or a decorator.
    pub(super) fn call_parentheses(&mut self) -> PResult<Vec<SyntaxNode<'src>>> {
        let mut children = vec![self.expect_op("(")?];
        if !self.peek().is_op(")") {
            children.push(self.arglist()?);
        }
        children.push(self.expect_op(")")?);
        Ok(children)
    }

    fn subscriptlist(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![self.subscript()?];
        while self.peek().is_op(",") {
            children.push(self.bump());
            if self.peek().is_op("]") {
                break;
            }
            children.push(self.subscript()?);
        }
        Ok(SyntaxNode::collapse(NodeKind::Subscriptlist, children))
    }

    /// `subscript: test | [test] ':' [test] [sliceop]`
    fn subscript(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = Vec::new();
        if !self.peek().is_op(":") {
            let index = self.test()?;
            if !self.peek().is_op(":") {
                return Ok(index.node);
            }
            children.push(index.node);
        }
        children.push(self.bump()); // consume ':'
        if self.starts_expression(false) {
            children.push(self.test()?.node);
        }
        if self.peek().is_op(":") {
            let mut sliceop = vec![self.bump()];
            if self.starts_expression(false) {
                sliceop.push(self.test()?.node);
            }
            children.push(SyntaxNode::collapse(NodeKind::Sliceop, sliceop));
        }
        Ok(SyntaxNode::internal(NodeKind::Subscript, children))
    }

    // ── Call arguments ──────────────────────────────────────────────────────

    fn arglist(&mut self) -> PResult<SyntaxNode<'src>> {
        let generalized = self.grammar.features.unpacking_generalizations;
        let mut children = Vec::new();
        let mut args = Vec::new();
        let mut trailing_comma = false;
        let mut seen_star = false;
        loop {
            // Before 3.5 a single `*` may appear, and `**` must come last.
            if !generalized && seen_star && self.peek().is_op("*") {
                return Err(self.unexpected());
            }
            let (node, arg) = self.argument()?;
            let double_star = arg.kind == ArgumentKind::UnpackMapping;
            seen_star |= arg.kind == ArgumentKind::Unpack;
            children.push(node);
            args.push(arg);
            if !self.peek().is_op(",") {
                break;
            }
            if !generalized && double_star {
                return Err(self.unexpected());
            }
            children.push(self.bump());
            if self.peek().is_op(")") {
                if !generalized && seen_star {
                    return Err(self.unexpected());
                }
                trailing_comma = true;
                break;
            }
        }
        let problem = check_call_arguments(&args, trailing_comma, self.grammar);
        self.report_opt(problem);
        Ok(SyntaxNode::collapse(NodeKind::Arglist, children))
    }

    fn argument(&mut self) -> PResult<(SyntaxNode<'src>, CallArgument<'src>)> {
        let tok = self.peek();
        let start = tok.start;
        if tok.is_op("*") || tok.is_op("**") {
            let star = self.bump();
            let value = self.test()?;
            let kind = if tok.text == "*" {
                ArgumentKind::Unpack
            } else {
                ArgumentKind::UnpackMapping
            };
            let node = SyntaxNode::internal(NodeKind::Argument, vec![star, value.node]);
            return Ok((node, CallArgument { kind, start }));
        }
        if self.is_identifier(&tok) && self.peek_at(1).is_op("=") {
            let name = self.bump();
            let eq = self.bump();
            let value = self.test()?;
            let target = Shape::new(
                ShapeKind::Name {
                    id: tok.text,
                    event: None,
                },
                start,
            );
            let node = SyntaxNode::internal(NodeKind::Argument, vec![name, eq, value.node]);
            let kind = ArgumentKind::Keyword(target);
            return Ok((node, CallArgument { kind, start }));
        }

        let mark = self.log.mark();
        let first = self.test()?;
        if self.peek().is_op("=") {
            let eq = self.bump();
            let value = self.test()?;
            let node = SyntaxNode::internal(NodeKind::Argument, vec![first.node, eq, value.node]);
            let kind = ArgumentKind::Keyword(first.shape);
            return Ok((node, CallArgument { kind, start }));
        }
        if self.grammar.features.assignment_expressions && self.peek().is_op(":=") {
            let named = self.named_tail(first)?;
            let kind = ArgumentKind::Positional;
            return Ok((named.node, CallArgument { kind, start }));
        }
        if self.at_comp_for() {
            let comp = self.comp_for(mark, Comprehension::Generator)?;
            let node = SyntaxNode::internal(NodeKind::Argument, vec![first.node, comp]);
            let kind = ArgumentKind::Generator;
            return Ok((node, CallArgument { kind, start }));
        }
        let kind = ArgumentKind::Positional;
        Ok((first.node, CallArgument { kind, start }))
    }

    // ── Comprehensions ──────────────────────────────────────────────────────

    fn at_comp_for(&self) -> bool {
        if self.at_keyword("for") {
            return true;
        }
        self.grammar.features.async_comprehensions
            && self.at_keyword("async")
            && self.peek_at(1).is_word("for")
    }

    /// The `for` clauses after a comprehension element. Everything the
    /// element recorded since `element` moves into the new comprehension
    /// scope.
    fn comp_for(&mut self, element: LogMark, kind: Comprehension) -> PResult<SyntaxNode<'src>> {
        let outer = self.scope;
        let comp = self.enter_scope(ScopeKind::Comprehension);
        self.log.adopt(element, outer, comp);
        let clauses = self.comp_clause(kind, true);
        self.exit_scope();
        clauses
    }

    fn comp_clause(&mut self, kind: Comprehension, first: bool) -> PResult<SyntaxNode<'src>> {
        let tok = self.peek();
        let async_kw = if tok.is_word("async") {
            let generator = kind == Comprehension::Generator;
            let problem = self.frame.check_async_comprehension(tok.start, generator, self.grammar);
            self.report_opt(problem);
            Some(self.bump())
        } else {
            None
        };

        let for_kw = self.expect_keyword("for")?;
        let target = self.exprlist()?;
        self.bind_target(&target.shape, BindContext::Store);
        let in_kw = self.expect_keyword("in")?;
        // The outermost iterable is evaluated in the enclosing scope.
        let iterable = if first {
            self.in_enclosing_scope(Self::or_test)?
        } else {
            self.or_test()?
        };
        let mut children = vec![for_kw, target.node, in_kw, iterable.node];
        children.extend(self.comp_iter(kind)?);
        let sync = SyntaxNode::internal(NodeKind::SyncCompFor, children);
        Ok(match async_kw {
            Some(async_kw) => SyntaxNode::internal(NodeKind::CompFor, vec![async_kw, sync]),
            None => sync,
        })
    }

    fn comp_iter(&mut self, kind: Comprehension) -> PResult<Option<SyntaxNode<'src>>> {
        if self.at_comp_for() {
            self.descend()?;
            let clause = self.comp_clause(kind, false)?;
            self.ascend();
            return Ok(Some(clause));
        }
        if !self.at_keyword("if") {
            return Ok(None);
        }
        self.descend()?;
        let mut children = vec![self.bump()];
        children.push(self.test_nocond()?.node);
        children.extend(self.comp_iter(kind)?);
        self.ascend();
        Ok(Some(SyntaxNode::internal(NodeKind::CompIf, children)))
    }

    // ── Atoms ───────────────────────────────────────────────────────────────

    fn atom(&mut self) -> PResult<Expr<'src>> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Name if self.is_identifier(&tok) => {
                let node = self.bump();
                let event = self.record(EventKind::Name(tok.text, Role::Use), tok.start);
                let kind = ShapeKind::Name {
                    id: tok.text,
                    event: Some(event),
                };
                Ok(Expr::new(node, kind, tok.start))
            }
            TokenKind::Name => match Constant::from_keyword(tok.text) {
                Some(constant) => {
                    Ok(Expr::new(self.bump(), ShapeKind::Constant(constant), tok.start))
                }
                None => Err(self.unexpected()),
            },
            TokenKind::Number => {
                if !self.grammar.features.underscores_in_numbers {
                    if let Some(offset) = tok.text.find('_') {
                        let at = Position::new(tok.start.line, tok.start.column + offset);
                        return Err(Failure::skip_line(Diagnostic::syntax(at, "invalid syntax")));
                    }
                }
                Ok(Expr::new(self.bump(), ShapeKind::Number, tok.start))
            }
            TokenKind::String => self.strings(),
            TokenKind::Operator => match tok.text {
                "(" => self.parenthesized(),
                "[" => self.bracketed(),
                "{" => self.braced(),
                "..." => Ok(Expr::new(
                    self.bump(),
                    ShapeKind::Constant(Constant::Ellipsis),
                    tok.start,
                )),
                _ => Err(self.unexpected()),
            },
            _ => Err(self.unexpected()),
        }
    }

    /// Adjacent string literals, concatenated.
    fn strings(&mut self) -> PResult<Expr<'src>> {
        let start = self.peek().start;
        let mut children = Vec::new();
        let mut bytes: Option<bool> = None;
        let mut formatted = false;
        let mut problem = None;
        while self.peek().kind == TokenKind::String {
            let tok = self.peek();
            let Some(literal) = Literal::split(tok.text) else {
                return Err(self.unexpected());
            };
            if literal.prefix.formatted && !self.grammar.features.fstrings {
                // Without f-strings the prefix lexes as a name and the quote
                // is what the grammar trips over.
                let prefix_len = tok.text.find(['"', '\'']).unwrap_or(0);
                let at = Position::new(tok.start.line, tok.start.column + prefix_len);
                return Err(Failure::skip_line(Diagnostic::syntax(at, "invalid syntax")));
            }
            children.push(self.bump());
            formatted |= literal.prefix.formatted;
            if problem.is_none() {
                problem = match decode(&literal, self.grammar) {
                    Err(error) => Some(Diagnostic::syntax(tok.start, error)),
                    Ok(_) if bytes.is_some_and(|b| b != literal.prefix.bytes) => Some(
                        Diagnostic::syntax(start, "cannot mix bytes and nonbytes literals"),
                    ),
                    Ok(_) => None,
                };
            }
            bytes.get_or_insert(literal.prefix.bytes);
        }
        self.report_opt(problem);
        let kind = if bytes == Some(true) {
            ShapeKind::Bytes
        } else if formatted {
            ShapeKind::FString
        } else {
            ShapeKind::Str
        };
        Ok(Expr::new(
            SyntaxNode::collapse(NodeKind::Strings, children),
            kind,
            start,
        ))
    }

    /// `'(' [yield_expr | testlist_comp] ')'`
    fn parenthesized(&mut self) -> PResult<Expr<'src>> {
        let start = self.peek().start;
        let open = self.bump();
        if self.peek().is_op(")") {
            let close = self.bump();
            return Ok(Expr::new(
                SyntaxNode::internal(NodeKind::Atom, vec![open, close]),
                ShapeKind::Tuple(Vec::new()),
                start,
            ));
        }
        if self.at_keyword("yield") {
            let inner = self.yield_expr()?;
            let close = self.expect_op(")")?;
            return Ok(Expr::new(
                SyntaxNode::internal(NodeKind::Atom, vec![open, inner.node, close]),
                ShapeKind::Yield,
                start,
            ));
        }
        let (inner, shape) = match self.testlist_comp(Comprehension::Generator)? {
            Contents::Single(element) => {
                self.check_bare_starred(&element.shape);
                (element.node, element.shape)
            }
            Contents::Elements(node, elements) => {
                (node, Shape::new(ShapeKind::Tuple(elements), start))
            }
            Contents::Comprehension(node) => (
                node,
                Shape::new(ShapeKind::Comprehension(Comprehension::Generator), start),
            ),
        };
        let close = self.expect_op(")")?;
        Ok(Expr {
            node: SyntaxNode::internal(NodeKind::Atom, vec![open, inner, close]),
            shape,
        })
    }

    /// `'[' [testlist_comp] ']'`
    fn bracketed(&mut self) -> PResult<Expr<'src>> {
        let start = self.peek().start;
        let open = self.bump();
        if self.peek().is_op("]") {
            let close = self.bump();
            return Ok(Expr::new(
                SyntaxNode::internal(NodeKind::Atom, vec![open, close]),
                ShapeKind::List(Vec::new()),
                start,
            ));
        }
        let (inner, kind) = match self.testlist_comp(Comprehension::List)? {
            Contents::Single(element) => {
                self.note_loose_starred(std::slice::from_ref(&element.shape));
                (element.node, ShapeKind::List(vec![element.shape]))
            }
            Contents::Elements(node, elements) => (node, ShapeKind::List(elements)),
            Contents::Comprehension(node) => {
                (node, ShapeKind::Comprehension(Comprehension::List))
            }
        };
        let close = self.expect_op("]")?;
        Ok(Expr::new(
            SyntaxNode::internal(NodeKind::Atom, vec![open, inner, close]),
            kind,
            start,
        ))
    }

    fn testlist_comp(&mut self, kind: Comprehension) -> PResult<Contents<'src>> {
        let mark = self.log.mark();
        let first = self.display_element()?;
        if self.at_comp_for() {
            if first.shape.is_starred() {
                self.report(Diagnostic::syntax(
                    first.start(),
                    "iterable unpacking cannot be used in comprehension",
                ));
            }
            let comp = self.comp_for(mark, kind)?;
            return Ok(Contents::Comprehension(SyntaxNode::internal(
                NodeKind::TestlistComp,
                vec![first.node, comp],
            )));
        }
        if !self.peek().is_op(",") {
            return Ok(Contents::Single(first));
        }
        let mut children = vec![first.node];
        let mut elements = vec![first.shape];
        while self.peek().is_op(",") {
            children.push(self.bump());
            if !self.starts_expression(true) {
                break;
            }
            let element = self.display_element()?;
            children.push(element.node);
            elements.push(element.shape);
        }
        self.note_loose_starred(&elements);
        Ok(Contents::Elements(
            SyntaxNode::internal(NodeKind::TestlistComp, children),
            elements,
        ))
    }

    fn display_element(&mut self) -> PResult<Expr<'src>> {
        if self.peek().is_op("*") {
            self.star_expr()
        } else {
            self.namedexpr_test()
        }
    }

    /// `'{' [dictorsetmaker] '}'`
    fn braced(&mut self) -> PResult<Expr<'src>> {
        let start = self.peek().start;
        let open = self.bump();
        if self.peek().is_op("}") {
            let close = self.bump();
            return Ok(Expr::new(
                SyntaxNode::internal(NodeKind::Atom, vec![open, close]),
                ShapeKind::Dict,
                start,
            ));
        }

        let mark = self.log.mark();
        let first_start = self.peek().start;
        let (mut children, first) = self.brace_item(None)?;
        let is_dict = matches!(first, BraceItem::Entry | BraceItem::DictUnpack);
        let kind = if self.at_comp_for() {
            match first {
                BraceItem::DictUnpack => self.report(Diagnostic::syntax(
                    first_start,
                    "dict unpacking cannot be used in dict comprehension",
                )),
                BraceItem::SetUnpack => self.report(Diagnostic::syntax(
                    first_start,
                    "iterable unpacking cannot be used in comprehension",
                )),
                BraceItem::Entry | BraceItem::Element => {}
            }
            let comprehension = if is_dict {
                Comprehension::Dict
            } else {
                Comprehension::Set
            };
            children.push(self.comp_for(mark, comprehension)?);
            ShapeKind::Comprehension(comprehension)
        } else {
            while self.peek().is_op(",") {
                children.push(self.bump());
                if self.peek().is_op("}") {
                    break;
                }
                let (item, _) = self.brace_item(Some(is_dict))?;
                children.extend(item);
            }
            if is_dict { ShapeKind::Dict } else { ShapeKind::Set }
        };
        let close = self.expect_op("}")?;
        let maker = SyntaxNode::collapse(NodeKind::Dictorsetmaker, children);
        Ok(Expr::new(
            SyntaxNode::internal(NodeKind::Atom, vec![open, maker, close]),
            kind,
            start,
        ))
    }

    /// One `key: value`, `**mapping`, element or `*iterable` inside braces.
    /// `dict` is known after the first item.
    fn brace_item(&mut self, dict: Option<bool>) -> PResult<(Vec<SyntaxNode<'src>>, BraceItem)> {
        let tok = self.peek();
        let generalized = self.grammar.features.unpacking_generalizations;
        if generalized && tok.is_op("**") && dict != Some(false) {
            let op = self.bump();
            let value = self.expr()?;
            return Ok((vec![op, value.node], BraceItem::DictUnpack));
        }
        if generalized && tok.is_op("*") && dict != Some(true) {
            let value = self.star_expr()?;
            return Ok((vec![value.node], BraceItem::SetUnpack));
        }
        let key = self.test()?;
        if dict == Some(false) || (dict.is_none() && !self.peek().is_op(":")) {
            return Ok((vec![key.node], BraceItem::Element));
        }
        let colon = self.expect_op(":")?;
        let value = self.test()?;
        Ok((vec![key.node, colon, value.node], BraceItem::Entry))
    }

    // ── Yield ───────────────────────────────────────────────────────────────

    /// `yield_expr: 'yield' [yield_arg]`
    pub(super) fn yield_expr(&mut self) -> PResult<Expr<'src>> {
        let start = self.peek().start;
        let yield_kw = self.expect_keyword("yield")?;
        let is_from = self.at_keyword("from");
        let problem = self.frame.check_yield(start, is_from, self.grammar);
        self.report_opt(problem);

        let mut children = vec![yield_kw];
        if is_from {
            let from_kw = self.bump();
            let value = self.test()?;
            children.push(SyntaxNode::internal(
                NodeKind::YieldArg,
                vec![from_kw, value.node],
            ));
        } else if self.starts_expression(true) {
            children.push(self.returned_value()?.node);
        }
        Ok(Expr::new(
            SyntaxNode::collapse(NodeKind::YieldExpr, children),
            ShapeKind::Yield,
            start,
        ))
    }
}
