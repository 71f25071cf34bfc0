//! Static scope analysis.
//!
//! While parsing, the parser appends [`Event`]s to a [`ScopeLog`]: every name
//! read, bound, annotated or declared, tagged with the scope it belongs to,
//! plus block boundaries for the nesting limit. A failed statement rolls its
//! events back with the rest of its state, so the log only ever describes
//! statements that made it into the tree.
//!
//! [`analyze`] replays the finished log. Each scope's symbol table moves from
//! collecting events to finalized, where the cross-scope rules (`nonlocal`
//! bindings, `global`/`nonlocal` conflicts) are decided.

use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::location::Position;
use crate::types::Diagnostic;
use std::collections::HashMap;

pub type ScopeId = usize;

pub const MODULE_SCOPE: ScopeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Lambda,
    Class,
    Comprehension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeInfo {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Param,
    Use,
    /// A plain-name annotation target; also a local binding.
    Annotation,
    Assign,
    /// The target of `:=`, recorded in the nearest non-comprehension scope.
    NamedAssign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declaration {
    Global,
    Nonlocal,
}

impl Declaration {
    fn keyword(self) -> &'static str {
        match self {
            Declaration::Global => "global",
            Declaration::Nonlocal => "nonlocal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind<'src> {
    Name(&'src str, Role),
    Declare(&'src str, Declaration),
    ImportStar,
    /// A compound statement counted against the static nesting limit.
    BlockOpen,
    BlockClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event<'src> {
    pub scope: ScopeId,
    pub kind: EventKind<'src>,
    pub at: Position,
}

/// Scopes and events, in the order the parser discovered them.
#[derive(Debug, Clone)]
pub struct ScopeLog<'src> {
    scopes: Vec<ScopeInfo>,
    events: Vec<Event<'src>>,
}

/// Lengths to roll a [`ScopeLog`] back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogMark {
    scopes: usize,
    events: usize,
}

impl Default for ScopeLog<'_> {
    fn default() -> Self {
        Self {
            scopes: vec![ScopeInfo {
                kind: ScopeKind::Module,
                parent: None,
            }],
            events: Vec::new(),
        }
    }
}

impl<'src> ScopeLog<'src> {
    pub fn open(&mut self, kind: ScopeKind, parent: ScopeId) -> ScopeId {
        self.scopes.push(ScopeInfo {
            kind,
            parent: Some(parent),
        });
        self.scopes.len() - 1
    }

    /// Returns the event's index.
    pub fn record(&mut self, scope: ScopeId, kind: EventKind<'src>, at: Position) -> usize {
        self.events.push(Event { scope, kind, at });
        self.events.len() - 1
    }

    /// Turn a recorded read into a binding.
    pub fn rebind(&mut self, event: usize, role: Role) {
        if let Some(Event {
            kind: EventKind::Name(_, current),
            ..
        }) = self.events.get_mut(event)
        {
            *current = role;
        }
    }

    pub fn mark(&self) -> LogMark {
        LogMark {
            scopes: self.scopes.len(),
            events: self.events.len(),
        }
    }

    pub fn rollback(&mut self, mark: LogMark) {
        self.scopes.truncate(mark.scopes);
        self.events.truncate(mark.events);
    }

    /// Turn a recorded read into an assignment-expression binding of `scope`.
    pub fn bind_named(&mut self, event: usize, scope: ScopeId) {
        self.rebind(event, Role::NamedAssign);
        if let Some(found) = self.events.get_mut(event) {
            found.scope = scope;
        }
    }

    /// Move everything recorded for `from` since `mark` into `to`, including
    /// scopes opened there. Used when an expression turns out to be the
    /// element of a comprehension. Assignment-expression bindings stay put.
    pub fn adopt(&mut self, mark: LogMark, from: ScopeId, to: ScopeId) {
        for event in self.events.iter_mut().skip(mark.events) {
            let named = matches!(event.kind, EventKind::Name(_, Role::NamedAssign));
            if event.scope == from && !named {
                event.scope = to;
            }
        }
        for (id, scope) in self.scopes.iter_mut().enumerate().skip(mark.scopes) {
            if id != to && scope.parent == Some(from) {
                scope.parent = Some(to);
            }
        }
    }

    pub fn scopes(&self) -> &[ScopeInfo] {
        &self.scopes
    }

    pub fn events(&self) -> &[Event<'src>] {
        &self.events
    }
}

// ── Symbol tables ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct Symbol {
    param: bool,
    used: bool,
    annotated: bool,
    assigned: bool,
    global_at: Option<Position>,
    nonlocal_at: Option<Position>,
}

impl Symbol {
    fn declared(&self) -> Option<Declaration> {
        if self.global_at.is_some() {
            Some(Declaration::Global)
        } else if self.nonlocal_at.is_some() {
            Some(Declaration::Nonlocal)
        } else {
            None
        }
    }

    fn binds_locally(&self) -> bool {
        (self.param || self.assigned || self.annotated) && self.declared().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableState {
    New,
    Collecting,
    Finalized,
}

struct SymbolTable<'src> {
    info: ScopeInfo,
    state: TableState,
    symbols: HashMap<&'src str, Symbol>,
    /// Symbol names in first-seen order, so reports come out deterministic.
    order: Vec<&'src str>,
    block_depth: usize,
}

impl<'src> SymbolTable<'src> {
    fn new(info: ScopeInfo) -> Self {
        Self {
            info,
            state: TableState::New,
            symbols: HashMap::new(),
            order: Vec::new(),
            block_depth: 0,
        }
    }

    fn symbol(&mut self, name: &'src str) -> &mut Symbol {
        if !self.symbols.contains_key(name) {
            self.order.push(name);
        }
        self.symbols.entry(name).or_default()
    }

    fn observe(
        &mut self,
        event: &Event<'src>,
        grammar: &Grammar,
        out: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        match self.state {
            TableState::New => self.state = TableState::Collecting,
            TableState::Collecting => {}
            TableState::Finalized => {
                return Err(Error::Internal(format!(
                    "event at {} for a finalized scope",
                    event.at
                )));
            }
        }

        let at = event.at;
        let is_module = self.info.kind == ScopeKind::Module;
        match event.kind {
            EventKind::Name(name, role) => {
                let symbol = self.symbol(name);
                match role {
                    Role::Param => symbol.param = true,
                    Role::Use => symbol.used = true,
                    Role::Assign | Role::NamedAssign => symbol.assigned = true,
                    Role::Annotation => {
                        if let Some(declaration) = symbol.declared().filter(|_| !is_module) {
                            out.push(Diagnostic::syntax(
                                at,
                                format!(
                                    "annotated name '{name}' can't be {}",
                                    declaration.keyword()
                                ),
                            ));
                        }
                        symbol.annotated = true;
                    }
                }
            }
            EventKind::Declare(name, declaration) => {
                let keyword = declaration.keyword();
                let symbol = self.symbol(name);
                let problem = if symbol.param {
                    Some(format!("name '{name}' is parameter and {keyword}"))
                } else if !grammar.features.strict_declaration_order {
                    None
                } else if symbol.used {
                    Some(format!("name '{name}' is used prior to {keyword} declaration"))
                } else if symbol.annotated {
                    Some(format!("annotated name '{name}' can't be {keyword}"))
                } else if symbol.assigned {
                    Some(format!("name '{name}' is assigned to before {keyword} declaration"))
                } else {
                    None
                };
                match declaration {
                    Declaration::Global => {
                        symbol.global_at.get_or_insert(at);
                    }
                    Declaration::Nonlocal => {
                        symbol.nonlocal_at.get_or_insert(at);
                    }
                }
                if let Some(message) = problem {
                    out.push(Diagnostic::syntax(at, message));
                }
                if declaration == Declaration::Nonlocal && is_module {
                    out.push(Diagnostic::syntax(
                        at,
                        "nonlocal declaration not allowed at module level",
                    ));
                }
            }
            EventKind::ImportStar => {
                if !is_module {
                    out.push(Diagnostic::syntax(at, "import * only allowed at module level"));
                }
            }
            EventKind::BlockOpen => {
                self.block_depth += 1;
                if self.block_depth == grammar.limits.static_blocks {
                    out.push(Diagnostic::syntax(at, "too many statically nested blocks"));
                }
            }
            EventKind::BlockClose => {
                self.block_depth = self.block_depth.checked_sub(1).ok_or_else(|| {
                    Error::Internal(format!("unbalanced block close at {at}"))
                })?;
            }
        }
        Ok(())
    }
}

// ── Analysis ─────────────────────────────────────────────────────────────────

/// Replay `log` and report every scoping violation.
pub fn analyze(log: &ScopeLog<'_>, grammar: &Grammar) -> Result<Vec<Diagnostic>> {
    let mut tables: Vec<SymbolTable<'_>> =
        log.scopes.iter().map(|info| SymbolTable::new(*info)).collect();
    let mut diagnostics = Vec::new();

    for event in &log.events {
        let table = tables
            .get_mut(event.scope)
            .ok_or_else(|| Error::Internal(format!("event for unknown scope {}", event.scope)))?;
        table.observe(event, grammar, &mut diagnostics)?;
    }

    for id in 0..tables.len() {
        if tables[id].block_depth != 0 {
            return Err(Error::Internal(format!("scope {id} has unclosed blocks")));
        }
        tables[id].state = TableState::Finalized;
        finalize(&tables, id, &mut diagnostics);
    }
    Ok(diagnostics)
}

fn finalize(tables: &[SymbolTable<'_>], id: ScopeId, out: &mut Vec<Diagnostic>) {
    let table = &tables[id];
    for name in &table.order {
        let Some(symbol) = table.symbols.get(name) else { continue };
        match (symbol.global_at, symbol.nonlocal_at) {
            (Some(global), Some(nonlocal)) => {
                out.push(Diagnostic::syntax(
                    global.min(nonlocal),
                    format!("name '{name}' is nonlocal and global"),
                ));
            }
            (None, Some(at)) if table.info.kind != ScopeKind::Module => {
                if !has_enclosing_binding(tables, table.info.parent, name) {
                    out.push(Diagnostic::syntax(
                        at,
                        format!("no binding for nonlocal '{name}' found"),
                    ));
                }
            }
            _ => {}
        }
    }
}

/// Whether some enclosing function-like scope binds `name` such that a
/// `nonlocal` declaration can refer to it.
fn has_enclosing_binding(tables: &[SymbolTable<'_>], mut scope: Option<ScopeId>, name: &str) -> bool {
    while let Some(table) = scope.and_then(|id| tables.get(id)) {
        match table.info.kind {
            ScopeKind::Module => return false,
            ScopeKind::Class => {}
            ScopeKind::Function | ScopeKind::Lambda | ScopeKind::Comprehension => {
                if let Some(symbol) = table.symbols.get(name) {
                    if symbol.global_at.is_some() {
                        return false;
                    }
                    if symbol.binds_locally() {
                        return true;
                    }
                }
            }
        }
        scope = table.info.parent;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::load_grammar;

    fn at(line: usize) -> Position {
        Position::new(line, 4)
    }

    fn messages(log: &ScopeLog<'_>, version: &str) -> Vec<String> {
        analyze(log, load_grammar(version).unwrap())
            .unwrap()
            .iter()
            .map(|d| d.message().to_string())
            .collect()
    }

    #[test]
    fn test_assigned_before_global() {
        let mut log = ScopeLog::default();
        let f = log.open(ScopeKind::Function, MODULE_SCOPE);
        log.record(f, EventKind::Name("x", Role::Assign), at(3));
        log.record(f, EventKind::Declare("x", Declaration::Global), at(4));
        assert_eq!(
            messages(&log, "3.6"),
            ["SyntaxError: name 'x' is assigned to before global declaration"]
        );
        // Only a warning before 3.6.
        assert!(messages(&log, "3.5").is_empty());
    }

    #[test]
    fn test_use_outranks_assignment() {
        let mut log = ScopeLog::default();
        let f = log.open(ScopeKind::Function, MODULE_SCOPE);
        log.record(f, EventKind::Name("x", Role::Assign), at(3));
        log.record(f, EventKind::Name("x", Role::Use), at(4));
        log.record(f, EventKind::Declare("x", Declaration::Nonlocal), at(5));
        assert_eq!(
            messages(&log, "3.6")[0],
            "SyntaxError: name 'x' is used prior to nonlocal declaration"
        );
    }

    #[test]
    fn test_parameter_and_global() {
        let mut log = ScopeLog::default();
        let f = log.open(ScopeKind::Function, MODULE_SCOPE);
        log.record(f, EventKind::Name("x", Role::Param), at(2));
        log.record(f, EventKind::Declare("x", Declaration::Global), at(3));
        assert_eq!(messages(&log, "3.4"), ["SyntaxError: name 'x' is parameter and global"]);
    }

    #[test]
    fn test_annotation_after_global() {
        let mut log = ScopeLog::default();
        let f = log.open(ScopeKind::Function, MODULE_SCOPE);
        log.record(f, EventKind::Declare("x", Declaration::Global), at(3));
        log.record(f, EventKind::Name("x", Role::Annotation), at(4));
        assert_eq!(messages(&log, "3.6"), ["SyntaxError: annotated name 'x' can't be global"]);
    }

    #[test]
    fn test_nonlocal_binding_lookup() {
        let mut log = ScopeLog::default();
        let outer = log.open(ScopeKind::Function, MODULE_SCOPE);
        log.record(outer, EventKind::Name("a", Role::Assign), at(2));
        let class = log.open(ScopeKind::Class, outer);
        log.record(class, EventKind::Name("b", Role::Assign), at(3));
        let inner = log.open(ScopeKind::Function, class);
        log.record(inner, EventKind::Declare("a", Declaration::Nonlocal), at(4));
        log.record(inner, EventKind::Declare("b", Declaration::Nonlocal), at(5));
        assert_eq!(messages(&log, "3.6"), ["SyntaxError: no binding for nonlocal 'b' found"]);
    }

    #[test]
    fn test_intermediate_global_hides_binding() {
        let mut log = ScopeLog::default();
        let x = log.open(ScopeKind::Function, MODULE_SCOPE);
        log.record(x, EventKind::Name("a", Role::Assign), at(2));
        let y = log.open(ScopeKind::Function, x);
        log.record(y, EventKind::Declare("a", Declaration::Global), at(3));
        let z = log.open(ScopeKind::Function, y);
        log.record(z, EventKind::Declare("a", Declaration::Nonlocal), at(5));
        assert_eq!(messages(&log, "3.6"), ["SyntaxError: no binding for nonlocal 'a' found"]);
    }

    #[test]
    fn test_nonlocal_and_global() {
        let mut log = ScopeLog::default();
        let x = log.open(ScopeKind::Function, MODULE_SCOPE);
        log.record(x, EventKind::Name("a", Role::Assign), at(2));
        let y = log.open(ScopeKind::Function, x);
        log.record(y, EventKind::Declare("a", Declaration::Global), at(4));
        log.record(y, EventKind::Declare("a", Declaration::Nonlocal), at(5));
        let found = analyze(&log, load_grammar("3.6").unwrap()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message(), "SyntaxError: name 'a' is nonlocal and global");
        assert_eq!(found[0].start(), at(4));
    }

    #[test]
    fn test_module_level_rules() {
        let mut log = ScopeLog::default();
        log.record(MODULE_SCOPE, EventKind::Declare("a", Declaration::Nonlocal), at(1));
        let f = log.open(ScopeKind::Function, MODULE_SCOPE);
        log.record(f, EventKind::ImportStar, at(2));
        assert_eq!(
            messages(&log, "3.6"),
            [
                "SyntaxError: nonlocal declaration not allowed at module level",
                "SyntaxError: import * only allowed at module level",
            ]
        );
    }

    #[test]
    fn test_static_block_limit_per_scope() {
        let mut log = ScopeLog::default();
        for line in 1..=19 {
            log.record(MODULE_SCOPE, EventKind::BlockOpen, at(line));
        }
        let f = log.open(ScopeKind::Function, MODULE_SCOPE);
        log.record(f, EventKind::BlockOpen, at(20));
        log.record(f, EventKind::BlockClose, at(20));
        for line in 1..=19 {
            log.record(MODULE_SCOPE, EventKind::BlockClose, at(line));
        }
        assert!(messages(&log, "3.6").is_empty());

        let mut log = ScopeLog::default();
        for line in 1..=20 {
            log.record(MODULE_SCOPE, EventKind::BlockOpen, at(line));
        }
        for line in 1..=20 {
            log.record(MODULE_SCOPE, EventKind::BlockClose, at(line));
        }
        let found = analyze(&log, load_grammar("3.6").unwrap()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start(), at(20));
    }

    #[test]
    fn test_unbalanced_blocks_are_internal_errors() {
        let mut log = ScopeLog::default();
        log.record(MODULE_SCOPE, EventKind::BlockClose, at(1));
        assert!(matches!(
            analyze(&log, load_grammar("3.6").unwrap()),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn test_rollback_and_rebind() {
        let mut log = ScopeLog::default();
        let mark = log.mark();
        let f = log.open(ScopeKind::Function, MODULE_SCOPE);
        log.record(f, EventKind::Declare("x", Declaration::Nonlocal), at(1));
        log.rollback(mark);
        assert_eq!(log.scopes().len(), 1);
        assert!(log.events().is_empty());

        let read = log.record(MODULE_SCOPE, EventKind::Name("x", Role::Use), at(1));
        log.rebind(read, Role::Assign);
        assert_eq!(log.events()[0].kind, EventKind::Name("x", Role::Assign));
    }

    #[test]
    fn test_adopt_moves_events_into_comprehension() {
        let mut log = ScopeLog::default();
        let f = log.open(ScopeKind::Function, MODULE_SCOPE);
        let mark = log.mark();
        log.record(f, EventKind::Name("x", Role::Use), at(2));
        let lambda = log.open(ScopeKind::Lambda, f);
        let comp = log.open(ScopeKind::Comprehension, f);
        log.adopt(mark, f, comp);
        assert_eq!(log.events()[0].scope, comp);
        assert_eq!(log.scopes()[lambda].parent, Some(comp));
        assert_eq!(log.scopes()[comp].parent, Some(f));
    }

    #[test]
    fn test_named_binding_survives_adoption() {
        let mut log = ScopeLog::default();
        let mark = log.mark();
        let read = log.record(MODULE_SCOPE, EventKind::Name("y", Role::Use), at(1));
        log.bind_named(read, MODULE_SCOPE);
        let comp = log.open(ScopeKind::Comprehension, MODULE_SCOPE);
        log.adopt(mark, MODULE_SCOPE, comp);
        assert_eq!(log.events()[0].scope, MODULE_SCOPE);
        assert_eq!(log.events()[0].kind, EventKind::Name("y", Role::NamedAssign));
    }
}
