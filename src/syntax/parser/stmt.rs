//! Statements: simple statements, compound statements and signatures.

use super::expr::Expr;
use super::{PResult, Parser};
use crate::checks::{
    FlowBlock, FrameKind, FutureStatement, Parameter, ParameterKind, check_parameters,
};
use crate::grammar::AsyncKeywords;
use crate::location::Position;
use crate::scope::{Declaration, EventKind, Role, ScopeKind};
use crate::syntax::token::{Token, TokenKind};
use crate::targets::{BindContext, ShapeKind, check_annotated, check_augmented};
use crate::tree::{NodeKind, SyntaxNode};
use crate::types::Diagnostic;

/// How a small statement bears on the future-import prologue.
enum Prologue<'src> {
    Docstring,
    FutureImport(Vec<&'src str>),
    Other,
}

const AUGMENTED_OPS: &[&str] = &[
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", "**=", "//=",
];

impl<'src, 'g> Parser<'src, 'g> {
    // ── Dispatch ────────────────────────────────────────────────────────────

    pub(super) fn statement(&mut self) -> PResult<SyntaxNode<'src>> {
        let tok = self.peek();
        if tok.is_op("@") {
            self.future.close();
            return self.decorated();
        }
        if self.starts_async_statement() {
            self.future.close();
            return self.async_statement();
        }
        let compound = matches!(
            tok.text,
            "if" | "while" | "for" | "try" | "with" | "def" | "class"
        );
        if compound && self.is_keyword(&tok) {
            self.future.close();
            return match tok.text {
                "if" => self.if_stmt(),
                "while" => self.while_stmt(),
                "for" => self.for_stmt_at(tok.start),
                "try" => self.try_stmt(),
                "with" => self.with_stmt_at(tok.start),
                "def" => self.funcdef(false),
                _ => self.classdef(),
            };
        }
        self.simple_stmt()
    }

    /// `async` opening a statement. Where `async` is contextual it is only
    /// a keyword in front of `def`, or inside an `async def`.
    fn starts_async_statement(&self) -> bool {
        let tok = self.peek();
        tok.is_word("async")
            && (self.is_keyword(&tok)
                || (self.grammar.features.async_keywords == AsyncKeywords::Contextual
                    && self.peek_at(1).is_word("def")))
    }

    // ── Simple statements ───────────────────────────────────────────────────

    /// `simple_stmt: small_stmt (';' small_stmt)* [';'] NEWLINE`
    pub(super) fn simple_stmt(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = Vec::new();
        loop {
            let start = self.peek().start;
            let (node, prologue) = self.small_stmt()?;
            self.flush_loose_starred();
            let statement = match &prologue {
                Prologue::Docstring => FutureStatement::Docstring,
                Prologue::FutureImport(names) => FutureStatement::Import(names),
                Prologue::Other => FutureStatement::Other,
            };
            let problem = self.future.observe(statement, start, self.grammar);
            self.report_opt(problem);
            children.push(node);
            if !self.peek().is_op(";") {
                break;
            }
            children.push(self.bump());
            if self.peek().kind == TokenKind::Newline {
                break;
            }
        }
        children.push(self.expect_newline()?);
        Ok(SyntaxNode::internal(NodeKind::SimpleStmt, children))
    }

    fn small_stmt(&mut self) -> PResult<(SyntaxNode<'src>, Prologue<'src>)> {
        let tok = self.peek();
        if !self.is_keyword(&tok) {
            return self.expr_stmt();
        }
        let node = match tok.text {
            "pass" => self.bump(),
            "break" => {
                let problem = self.frame.check_break(tok.start);
                self.report_opt(problem);
                self.bump()
            }
            "continue" => {
                let problem = self.frame.check_continue(tok.start, self.grammar);
                self.report_opt(problem);
                self.bump()
            }
            "return" => self.return_stmt()?,
            "raise" => self.raise_stmt()?,
            "yield" => self.yield_expr()?.node,
            "global" => self.declaration(NodeKind::GlobalStmt, Declaration::Global)?,
            "nonlocal" => self.declaration(NodeKind::NonlocalStmt, Declaration::Nonlocal)?,
            "del" => self.del_stmt()?,
            "assert" => self.assert_stmt()?,
            "import" => self.import_name()?,
            "from" => return self.import_from(),
            _ => return self.expr_stmt(),
        };
        Ok((node, Prologue::Other))
    }

    fn expr_stmt(&mut self) -> PResult<(SyntaxNode<'src>, Prologue<'src>)> {
        let first = self.testlist_star_expr()?;
        let tok = self.peek();
        if tok.is_op(":") && self.grammar.features.variable_annotations {
            return Ok((self.annotated_assignment(first)?, Prologue::Other));
        }
        if self.is_augmented_operator(&tok) {
            return Ok((self.augmented_assignment(first)?, Prologue::Other));
        }
        if !tok.is_op("=") {
            self.check_bare_starred(&first.shape);
            let prologue = if matches!(first.shape.kind, ShapeKind::Str) {
                Prologue::Docstring
            } else {
                Prologue::Other
            };
            return Ok((first.node, prologue));
        }

        let mut children = vec![first.node];
        let mut targets = vec![first.shape];
        let mut value = None;
        while self.peek().is_op("=") {
            children.push(self.bump());
            let next = if self.at_keyword("yield") {
                self.yield_expr()?
            } else {
                self.testlist_star_expr()?
            };
            children.push(next.node);
            if let Some(previous) = value.replace(next.shape) {
                targets.push(previous);
            }
        }
        for target in &targets {
            self.bind_target(target, BindContext::Store);
        }
        if let Some(value) = &value {
            self.check_bare_starred(value);
        }
        Ok((
            SyntaxNode::internal(NodeKind::ExprStmt, children),
            Prologue::Other,
        ))
    }

    fn is_augmented_operator(&self, tok: &Token<'_>) -> bool {
        tok.kind == TokenKind::Operator
            && (AUGMENTED_OPS.contains(&tok.text)
                || (tok.text == "@=" && self.grammar.features.matrix_multiply))
    }

    fn augmented_assignment(&mut self, target: Expr<'src>) -> PResult<SyntaxNode<'src>> {
        let op = self.bump();
        let value = if self.at_keyword("yield") {
            self.yield_expr()?
        } else {
            self.testlist()?
        };
        let problem = check_augmented(&target.shape, self.grammar);
        self.report_opt(problem);
        if let ShapeKind::Name {
            event: Some(event), ..
        } = target.shape.kind
        {
            self.log.rebind(event, Role::Assign);
        }
        Ok(SyntaxNode::internal(
            NodeKind::ExprStmt,
            vec![target.node, op, value.node],
        ))
    }

    /// `target: annotation [= value]`
    fn annotated_assignment(&mut self, target: Expr<'src>) -> PResult<SyntaxNode<'src>> {
        let mut annassign = vec![self.bump()]; // consume ':'
        annassign.push(self.test()?.node);
        if let Some(eq) = self.eat_op("=") {
            annassign.push(eq);
            let value = if !self.grammar.features.unparenthesized_unpacking {
                self.test()?
            } else if self.at_keyword("yield") {
                self.yield_expr()?
            } else {
                self.returned_value()?
            };
            annassign.push(value.node);
        }

        let problem = check_annotated(&target.shape, self.grammar);
        self.report_opt(problem);
        // Only a bare name is an annotated variable; `(x): int` just binds.
        if let ShapeKind::Name {
            event: Some(event), ..
        } = target.shape.kind
        {
            let role = if target.is_simple_name() {
                Role::Annotation
            } else {
                Role::Assign
            };
            self.log.rebind(event, role);
        }
        Ok(SyntaxNode::internal(
            NodeKind::ExprStmt,
            vec![
                target.node,
                SyntaxNode::internal(NodeKind::AnnAssign, annassign),
            ],
        ))
    }

    fn return_stmt(&mut self) -> PResult<SyntaxNode<'src>> {
        let start = self.peek().start;
        let mut children = vec![self.bump()]; // consume 'return'
        let has_value = self.starts_expression(true);
        if has_value {
            children.push(self.returned_value()?.node);
        }
        let problem = self.frame.check_return(start, has_value);
        self.report_opt(problem);
        Ok(SyntaxNode::collapse(NodeKind::ReturnStmt, children))
    }

    /// `raise_stmt: 'raise' [test ['from' test]]`
    fn raise_stmt(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![self.bump()];
        if self.starts_expression(false) {
            children.push(self.test()?.node);
            if let Some(from_kw) = self.eat_keyword("from") {
                children.push(from_kw);
                children.push(self.test()?.node);
            }
        }
        Ok(SyntaxNode::collapse(NodeKind::RaiseStmt, children))
    }

    fn declaration(&mut self, kind: NodeKind, declaration: Declaration) -> PResult<SyntaxNode<'src>> {
        let start = self.peek().start;
        let mut children = vec![self.bump()];
        loop {
            let (name, tok) = self.expect_name()?;
            self.record(EventKind::Declare(tok.text, declaration), start);
            children.push(name);
            match self.eat_op(",") {
                Some(comma) => children.push(comma),
                None => break,
            }
        }
        Ok(SyntaxNode::internal(kind, children))
    }

    fn del_stmt(&mut self) -> PResult<SyntaxNode<'src>> {
        let del_kw = self.bump();
        let targets = self.exprlist()?;
        self.bind_target(&targets.shape, BindContext::Delete);
        Ok(SyntaxNode::internal(
            NodeKind::DelStmt,
            vec![del_kw, targets.node],
        ))
    }

    fn assert_stmt(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![self.bump()];
        children.push(self.test()?.node);
        if let Some(comma) = self.eat_op(",") {
            children.push(comma);
            children.push(self.test()?.node);
        }
        Ok(SyntaxNode::internal(NodeKind::AssertStmt, children))
    }

    // ── Imports ─────────────────────────────────────────────────────────────

    /// Bind a name introduced by an import, `def` or `class`.
    fn bind_new_name(&mut self, tok: Token<'src>) {
        if tok.text == "__debug__" {
            self.report(Diagnostic::syntax(
                tok.start,
                self.grammar.phrasing.debug_assignment,
            ));
        }
        self.bind_name(tok.text, tok.start);
    }

    /// Returns the node and the first name of the path.
    fn dotted_name(&mut self) -> PResult<(SyntaxNode<'src>, Token<'src>)> {
        let (first_node, first) = self.expect_name()?;
        if !self.peek().is_op(".") {
            return Ok((first_node, first));
        }
        let mut children = vec![first_node];
        while let Some(dot) = self.eat_op(".") {
            children.push(dot);
            children.push(self.expect_name()?.0);
        }
        Ok((SyntaxNode::internal(NodeKind::DottedName, children), first))
    }

    fn import_name(&mut self) -> PResult<SyntaxNode<'src>> {
        let import_kw = self.bump();
        let mut names = Vec::new();
        loop {
            let (dotted, first) = self.dotted_name()?;
            let single = matches!(dotted, SyntaxNode::Leaf(_));
            match self.eat_keyword("as") {
                Some(as_kw) => {
                    let (alias, alias_tok) = self.expect_name()?;
                    self.bind_new_name(alias_tok);
                    names.push(SyntaxNode::internal(
                        NodeKind::DottedAsName,
                        vec![dotted, as_kw, alias],
                    ));
                }
                None if single => {
                    self.bind_new_name(first);
                    names.push(dotted);
                }
                None => {
                    self.bind_name(first.text, first.start);
                    names.push(dotted);
                }
            }
            match self.eat_op(",") {
                Some(comma) => names.push(comma),
                None => break,
            }
        }
        Ok(SyntaxNode::internal(
            NodeKind::ImportName,
            vec![import_kw, SyntaxNode::collapse(NodeKind::DottedAsNames, names)],
        ))
    }

    /// `import_from: 'from' ('.'* dotted_name | '.'+) 'import' ('*' | '(' import_as_names ')' | import_as_names)`
    fn import_from(&mut self) -> PResult<(SyntaxNode<'src>, Prologue<'src>)> {
        let start = self.peek().start;
        let mut children = vec![self.bump()]; // consume 'from'
        let mut dots = 0;
        while self.peek().is_op(".") || self.peek().is_op("...") {
            dots += 1;
            children.push(self.bump());
        }
        let mut is_future = false;
        if dots == 0 || !self.at_keyword("import") {
            let (module, first) = self.dotted_name()?;
            is_future = matches!(module, SyntaxNode::Leaf(_)) && first.text == "__future__";
            children.push(module);
        }
        children.push(self.expect_keyword("import")?);

        let mut imported = Vec::new();
        let tok = self.peek();
        if tok.is_op("*") {
            children.push(self.bump());
            self.record(EventKind::ImportStar, start);
            imported.push("*");
        } else if let Some(open) = self.eat_op("(") {
            children.push(open);
            children.push(self.import_as_names(true, &mut imported)?);
            children.push(self.expect_op(")")?);
        } else {
            children.push(self.import_as_names(false, &mut imported)?);
        }

        let prologue = if is_future {
            Prologue::FutureImport(imported)
        } else {
            Prologue::Other
        };
        Ok((SyntaxNode::internal(NodeKind::ImportFrom, children), prologue))
    }

    fn import_as_names(
        &mut self,
        parenthesized: bool,
        imported: &mut Vec<&'src str>,
    ) -> PResult<SyntaxNode<'src>> {
        let mut children = Vec::new();
        loop {
            let (name, tok) = self.expect_name()?;
            imported.push(tok.text);
            match self.eat_keyword("as") {
                Some(as_kw) => {
                    let (alias, alias_tok) = self.expect_name()?;
                    self.bind_new_name(alias_tok);
                    children.push(SyntaxNode::internal(
                        NodeKind::ImportAsName,
                        vec![name, as_kw, alias],
                    ));
                }
                None => {
                    self.bind_new_name(tok);
                    children.push(name);
                }
            }
            let comma_at = self.peek().start;
            let Some(comma) = self.eat_op(",") else {
                break;
            };
            children.push(comma);
            if parenthesized {
                if self.peek().is_op(")") {
                    break;
                }
            } else if !self.is_identifier(&self.peek()) {
                self.report(Diagnostic::syntax(
                    comma_at,
                    "trailing comma not allowed without surrounding parentheses",
                ));
                break;
            }
        }
        Ok(SyntaxNode::collapse(NodeKind::ImportAsNames, children))
    }

    // ── Compound statements ─────────────────────────────────────────────────

    /// Condition of `if`, `elif` and `while`.
    fn condition(&mut self) -> PResult<SyntaxNode<'src>> {
        Ok(self.namedexpr_test()?.node)
    }

    /// `':' suite` after a compound statement header.
    fn header_suite(&mut self, children: &mut Vec<SyntaxNode<'src>>) -> PResult<()> {
        children.push(self.expect_op(":")?);
        self.flush_loose_starred();
        children.push(self.suite()?);
        Ok(())
    }

    fn else_clause(&mut self, children: &mut Vec<SyntaxNode<'src>>) -> PResult<()> {
        if let Some(else_kw) = self.eat_keyword("else") {
            children.push(else_kw);
            self.header_suite(children)?;
        }
        Ok(())
    }

    fn if_stmt(&mut self) -> PResult<SyntaxNode<'src>> {
        let start = self.peek().start;
        self.record(EventKind::BlockOpen, start);
        let mut children = vec![self.bump()];
        children.push(self.condition()?);
        self.header_suite(&mut children)?;
        while let Some(elif_kw) = self.eat_keyword("elif") {
            children.push(elif_kw);
            children.push(self.condition()?);
            self.header_suite(&mut children)?;
        }
        self.else_clause(&mut children)?;
        self.record(EventKind::BlockClose, start);
        Ok(SyntaxNode::internal(NodeKind::IfStmt, children))
    }

    fn while_stmt(&mut self) -> PResult<SyntaxNode<'src>> {
        let start = self.peek().start;
        self.record(EventKind::BlockOpen, start);
        let mut children = vec![self.bump()];
        children.push(self.condition()?);
        children.push(self.expect_op(":")?);
        self.flush_loose_starred();
        children.push(self.loop_body()?);
        self.else_clause(&mut children)?;
        self.record(EventKind::BlockClose, start);
        Ok(SyntaxNode::internal(NodeKind::WhileStmt, children))
    }

    /// `for` whose block starts at `start`, which is the `async` of
    /// `async for`.
    fn for_stmt_at(&mut self, start: Position) -> PResult<SyntaxNode<'src>> {
        self.record(EventKind::BlockOpen, start);
        let mut children = vec![self.expect_keyword("for")?];
        let target = self.exprlist()?;
        self.bind_target(&target.shape, BindContext::Store);
        children.push(target.node);
        children.push(self.expect_keyword("in")?);
        children.push(self.testlist()?.node);
        children.push(self.expect_op(":")?);
        self.flush_loose_starred();
        children.push(self.loop_body()?);
        self.else_clause(&mut children)?;
        self.record(EventKind::BlockClose, start);
        Ok(SyntaxNode::internal(NodeKind::ForStmt, children))
    }

    fn try_stmt(&mut self) -> PResult<SyntaxNode<'src>> {
        let start = self.peek().start;
        self.record(EventKind::BlockOpen, start);
        let mut children = vec![self.bump()];
        self.header_suite(&mut children)?;

        let mut handlers = 0;
        let mut default_except: Option<Position> = None;
        while self.at_keyword("except") {
            let except_tok = self.peek();
            if let Some(at) = default_except.take() {
                self.report(Diagnostic::syntax(at, "default 'except:' must be last"));
            }
            let mut clause = vec![self.bump()];
            if self.starts_expression(false) {
                clause.push(self.test()?.node);
                if let Some(as_kw) = self.eat_keyword("as") {
                    let (name, tok) = self.expect_name()?;
                    self.bind_name(tok.text, tok.start);
                    clause.push(as_kw);
                    clause.push(name);
                }
            } else {
                default_except = Some(except_tok.start);
            }
            children.push(SyntaxNode::collapse(NodeKind::ExceptClause, clause));
            self.header_suite(&mut children)?;
            handlers += 1;
        }
        if handlers > 0 {
            self.else_clause(&mut children)?;
        }
        if let Some(finally_kw) = self.eat_keyword("finally") {
            children.push(finally_kw);
            children.push(self.expect_op(":")?);
            self.frame.enter_block(FlowBlock::Finally);
            let body = self.suite();
            self.frame.exit_block();
            children.push(body?);
        } else if handlers == 0 {
            return Err(self.unexpected());
        }
        self.record(EventKind::BlockClose, start);
        Ok(SyntaxNode::internal(NodeKind::TryStmt, children))
    }

    fn with_stmt_at(&mut self, start: Position) -> PResult<SyntaxNode<'src>> {
        self.record(EventKind::BlockOpen, start);
        let mut children = vec![self.expect_keyword("with")?];
        loop {
            children.push(self.with_item()?);
            match self.eat_op(",") {
                Some(comma) => children.push(comma),
                None => break,
            }
        }
        self.header_suite(&mut children)?;
        self.record(EventKind::BlockClose, start);
        Ok(SyntaxNode::internal(NodeKind::WithStmt, children))
    }

    /// `with_item: test ['as' expr]`
    fn with_item(&mut self) -> PResult<SyntaxNode<'src>> {
        let context = self.test()?;
        let Some(as_kw) = self.eat_keyword("as") else {
            return Ok(context.node);
        };
        let target = self.expr()?;
        self.bind_target(&target.shape, BindContext::Store);
        Ok(SyntaxNode::internal(
            NodeKind::WithItem,
            vec![context.node, as_kw, target.node],
        ))
    }

    /// `async_stmt: ASYNC (funcdef | with_stmt | for_stmt)`
    fn async_statement(&mut self) -> PResult<SyntaxNode<'src>> {
        let async_tok = self.peek();
        let async_kw = self.bump();
        let next = self.peek();
        if next.is_word("def") {
            let def = self.funcdef(true)?;
            return Ok(SyntaxNode::internal(
                NodeKind::AsyncFuncdef,
                vec![async_kw, def],
            ));
        }
        let keyword = if next.is_word("for") {
            "for"
        } else if next.is_word("with") {
            "with"
        } else {
            return Err(self.unexpected());
        };
        let problem = self.frame.check_async_statement(async_tok.start, keyword);
        self.report_opt(problem);
        let inner = if keyword == "for" {
            self.for_stmt_at(async_tok.start)?
        } else {
            self.with_stmt_at(async_tok.start)?
        };
        Ok(SyntaxNode::internal(
            NodeKind::AsyncStmt,
            vec![async_kw, inner],
        ))
    }

    fn decorated(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut decorators = Vec::new();
        while self.peek().is_op("@") {
            let mut children = vec![self.bump()];
            let (dotted, first) = self.dotted_name()?;
            self.record(EventKind::Name(first.text, Role::Use), first.start);
            children.push(dotted);
            if self.peek().is_op("(") {
                children.extend(self.call_parentheses()?);
            }
            children.push(self.expect_newline()?);
            decorators.push(SyntaxNode::internal(NodeKind::Decorator, children));
        }
        let decorators = SyntaxNode::collapse(NodeKind::Decorators, decorators);
        let target = if self.at_keyword("def") {
            self.funcdef(false)?
        } else if self.at_keyword("class") {
            self.classdef()?
        } else if self.starts_async_statement() && self.peek_at(1).is_word("def") {
            self.async_statement()?
        } else {
            return Err(self.unexpected());
        };
        Ok(SyntaxNode::internal(
            NodeKind::Decorated,
            vec![decorators, target],
        ))
    }

    /// `funcdef: 'def' NAME parameters ['->' test] ':' suite`
    fn funcdef(&mut self, is_async: bool) -> PResult<SyntaxNode<'src>> {
        let def_kw = self.expect_keyword("def")?;
        let (name, name_tok) = self.expect_name()?;
        self.bind_new_name(name_tok);

        let open = self.expect_op("(")?;
        let (params, signature) = self.parameter_list(")", true)?;
        let close = self.expect_op(")")?;
        let mut parameters = vec![open];
        parameters.extend(params);
        parameters.push(close);

        let mut children = vec![
            def_kw,
            name,
            SyntaxNode::internal(NodeKind::Parameters, parameters),
        ];
        if let Some(arrow) = self.eat_op("->") {
            children.push(arrow);
            children.push(self.test()?.node);
        }
        children.push(self.expect_op(":")?);
        self.flush_loose_starred();
        let problem = check_parameters(&signature, self.grammar);
        self.report_opt(problem);

        self.enter_scope(ScopeKind::Function);
        self.record_parameters(&signature);
        self.enter_frame(FrameKind::Function, is_async);
        let body = self.suite();
        self.exit_frame();
        self.exit_scope();

        children.push(body?);
        Ok(SyntaxNode::internal(NodeKind::Funcdef, children))
    }

    /// `classdef: 'class' NAME ['(' [arglist] ')'] ':' suite`
    fn classdef(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![self.bump()];
        let (name, name_tok) = self.expect_name()?;
        self.bind_new_name(name_tok);
        children.push(name);
        if self.peek().is_op("(") {
            children.extend(self.call_parentheses()?);
        }
        children.push(self.expect_op(":")?);
        self.flush_loose_starred();

        self.enter_scope(ScopeKind::Class);
        self.enter_frame(FrameKind::Class, false);
        let body = self.suite();
        self.exit_frame();
        self.exit_scope();

        children.push(body?);
        Ok(SyntaxNode::internal(NodeKind::Classdef, children))
    }

    // ── Signatures ──────────────────────────────────────────────────────────

    /// Parameters of a `def` (up to `)`) or a `lambda` (up to `:`). Defaults
    /// and annotations are parsed in the enclosing scope; the caller records
    /// the names once the function scope is open.
    pub(super) fn parameter_list(
        &mut self,
        closing: &str,
        annotated: bool,
    ) -> PResult<(Vec<SyntaxNode<'src>>, Vec<Parameter<'src>>)> {
        let features = self.grammar.features;
        let mut nodes = Vec::new();
        let mut signature: Vec<Parameter<'src>> = Vec::new();
        let mut seen_star = false;
        let mut seen_slash = false;
        while !self.peek().is_op(closing) {
            let tok = self.peek();
            let mut param = Vec::new();
            let parameter = if tok.is_op("/")
                && features.positional_only_parameters
                && !seen_slash
                && !seen_star
                && !signature.is_empty()
            {
                seen_slash = true;
                param.push(self.bump());
                Parameter {
                    kind: ParameterKind::PositionalOnlyMarker,
                    name: None,
                    has_default: false,
                    start: tok.start,
                }
            } else if tok.is_op("*") && !seen_star {
                seen_star = true;
                param.push(self.bump());
                if self.is_identifier(&self.peek()) {
                    let name = self.parameter_name(annotated, &mut param)?;
                    Parameter {
                        kind: ParameterKind::VarArgs,
                        name: Some(name.text),
                        has_default: false,
                        start: name.start,
                    }
                } else {
                    Parameter {
                        kind: ParameterKind::BareStar,
                        name: None,
                        has_default: false,
                        start: tok.start,
                    }
                }
            } else if tok.is_op("**") {
                param.push(self.bump());
                let name = self.parameter_name(annotated, &mut param)?;
                Parameter {
                    kind: ParameterKind::KwArgs,
                    name: Some(name.text),
                    has_default: false,
                    start: name.start,
                }
            } else {
                let name = self.parameter_name(annotated, &mut param)?;
                let has_default = match self.eat_op("=") {
                    Some(eq) => {
                        param.push(eq);
                        param.push(self.test()?.node);
                        true
                    }
                    None => false,
                };
                Parameter {
                    kind: ParameterKind::Named,
                    name: Some(name.text),
                    has_default,
                    start: name.start,
                }
            };

            let kind = parameter.kind;
            signature.push(parameter);
            let comma = self.eat_op(",");
            let has_comma = comma.is_some();
            param.extend(comma);
            nodes.push(SyntaxNode::internal(NodeKind::Param, param));
            if !has_comma {
                break;
            }
            let at_closing = self.peek().is_op(closing);
            if kind == ParameterKind::KwArgs && !at_closing {
                return Err(self.unexpected());
            }
            let star_like = matches!(
                kind,
                ParameterKind::VarArgs | ParameterKind::KwArgs | ParameterKind::BareStar
            );
            if at_closing && star_like && !features.trailing_comma_after_varargs {
                return Err(self.unexpected());
            }
        }
        Ok((nodes, signature))
    }

    fn parameter_name(
        &mut self,
        annotated: bool,
        param: &mut Vec<SyntaxNode<'src>>,
    ) -> PResult<Token<'src>> {
        let (name, tok) = self.expect_name()?;
        param.push(name);
        if annotated {
            if let Some(colon) = self.eat_op(":") {
                param.push(colon);
                param.push(self.test()?.node);
            }
        }
        Ok(tok)
    }

    pub(super) fn record_parameters(&mut self, signature: &[Parameter<'src>]) {
        for param in signature {
            if let Some(name) = param.name {
                self.record(EventKind::Name(name, Role::Param), param.start);
            }
        }
    }
}
