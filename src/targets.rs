//! Assignment-target validation.
//!
//! The parser reduces every expression to a [`Shape`]: just enough structure
//! to decide whether it may be bound to. Tuples, lists and starred
//! expressions keep their elements, since validity is recursive through
//! them; everything else is a leaf classification.

use crate::grammar::{ConstantTargets, Grammar};
use crate::location::Position;
use crate::types::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    None,
    True,
    False,
    Ellipsis,
}

impl Constant {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "None" => Some(Constant::None),
            "True" => Some(Constant::True),
            "False" => Some(Constant::False),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Constant::None => "None",
            Constant::True => "True",
            Constant::False => "False",
            Constant::Ellipsis => "Ellipsis",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comprehension {
    List,
    Set,
    Dict,
    Generator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeKind<'src> {
    /// `event` indexes the scope event recorded when the name was read, so
    /// the parser can turn it into a binding once the name proves to be a
    /// target.
    Name {
        id: &'src str,
        event: Option<usize>,
    },
    Attribute,
    Subscript,
    Call,
    Starred(Box<Shape<'src>>),
    Tuple(Vec<Shape<'src>>),
    List(Vec<Shape<'src>>),
    Set,
    Dict,
    Number,
    Str,
    Bytes,
    FString,
    Constant(Constant),
    /// Unary, binary and boolean operations.
    Operator,
    Comparison,
    Conditional,
    Lambda,
    Yield,
    Await,
    Comprehension(Comprehension),
    NamedExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape<'src> {
    pub kind: ShapeKind<'src>,
    pub start: Position,
}

impl<'src> Shape<'src> {
    pub fn new(kind: ShapeKind<'src>, start: Position) -> Self {
        Self { kind, start }
    }

    pub fn is_starred(&self) -> bool {
        matches!(self.kind, ShapeKind::Starred(_))
    }

    /// Names this shape binds when used as a target, in source order.
    pub fn bound_names(&self) -> Vec<(&'src str, Option<usize>, Position)> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, out: &mut Vec<(&'src str, Option<usize>, Position)>) {
        match &self.kind {
            ShapeKind::Name { id, event } => out.push((id, *event, self.start)),
            ShapeKind::Starred(inner) => inner.collect_names(out),
            ShapeKind::Tuple(elts) | ShapeKind::List(elts) => {
                for elt in elts {
                    elt.collect_names(out);
                }
            }
            _ => {}
        }
    }

    /// Positions of starred elements reachable through tuples and lists.
    pub fn starred_positions(&self) -> Vec<Position> {
        let mut out = Vec::new();
        self.collect_starred(&mut out);
        out
    }

    fn collect_starred(&self, out: &mut Vec<Position>) {
        match &self.kind {
            ShapeKind::Starred(inner) => {
                out.push(self.start);
                inner.collect_starred(out);
            }
            ShapeKind::Tuple(elts) | ShapeKind::List(elts) => {
                for elt in elts {
                    elt.collect_starred(out);
                }
            }
            _ => {}
        }
    }
}

/// How a target is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindContext {
    /// `=`, `for`, `with ... as` and comprehension targets.
    Store,
    Delete,
}

impl BindContext {
    fn verb(self) -> &'static str {
        match self {
            BindContext::Store => "assign to",
            BindContext::Delete => "delete",
        }
    }
}

/// What the reference compiler calls an expression in its messages.
pub fn describe(kind: &ShapeKind<'_>, grammar: &Grammar) -> &'static str {
    let displays = grammar.phrasing.display_names;
    match kind {
        ShapeKind::Name { .. } => "name",
        ShapeKind::Attribute => "attribute",
        ShapeKind::Subscript => "subscript",
        ShapeKind::Starred(_) => "starred",
        ShapeKind::Tuple(_) => "tuple",
        ShapeKind::List(_) => "list",
        ShapeKind::Call => "function call",
        ShapeKind::Dict if displays => "dict display",
        ShapeKind::Set if displays => "set display",
        ShapeKind::FString if displays => "f-string expression",
        ShapeKind::Dict | ShapeKind::Set | ShapeKind::FString => "literal",
        ShapeKind::Number | ShapeKind::Str | ShapeKind::Bytes => "literal",
        ShapeKind::Constant(c) => c.as_str(),
        ShapeKind::Operator => "operator",
        ShapeKind::Comparison => "comparison",
        ShapeKind::Conditional => "conditional expression",
        ShapeKind::Lambda => "lambda",
        ShapeKind::Yield => "yield expression",
        ShapeKind::Await => "await expression",
        ShapeKind::Comprehension(Comprehension::List) => "list comprehension",
        ShapeKind::Comprehension(Comprehension::Set) => "set comprehension",
        ShapeKind::Comprehension(Comprehension::Dict) => "dict comprehension",
        ShapeKind::Comprehension(Comprehension::Generator) => "generator expression",
        ShapeKind::NamedExpr => "named expression",
    }
}

// ── Binding sites ────────────────────────────────────────────────────────────

/// Validate `shape` as the target of an assignment, loop, `with`, or `del`.
///
/// Structural faults are found first, over the whole target; starred-element
/// faults only once the structure is sound.
pub fn check_target(shape: &Shape<'_>, ctx: BindContext, grammar: &Grammar) -> Option<Diagnostic> {
    invalid_target(shape, ctx, grammar).or_else(|| starred_problem(shape, ctx, grammar))
}

fn invalid_target(shape: &Shape<'_>, ctx: BindContext, grammar: &Grammar) -> Option<Diagnostic> {
    let phrasing = &grammar.phrasing;
    let cannot = |what: &str| {
        Diagnostic::syntax(shape.start, format!("{} {} {what}", phrasing.cannot, ctx.verb()))
    };
    match &shape.kind {
        ShapeKind::Name { id, .. } => (ctx == BindContext::Store && *id == "__debug__")
            .then(|| Diagnostic::syntax(shape.start, phrasing.debug_assignment)),
        ShapeKind::Attribute | ShapeKind::Subscript => None,
        ShapeKind::Starred(inner) => invalid_target(inner, ctx, grammar),
        ShapeKind::Tuple(elts) if elts.is_empty() && !grammar.features.empty_tuple_target => {
            Some(cannot("()"))
        }
        ShapeKind::Tuple(elts) | ShapeKind::List(elts) => {
            elts.iter().find_map(|elt| invalid_target(elt, ctx, grammar))
        }
        ShapeKind::Constant(Constant::Ellipsis) => Some(cannot("Ellipsis")),
        ShapeKind::Constant(constant) => match phrasing.constant_targets {
            ConstantTargets::ProtectedNames => (ctx == BindContext::Store)
                .then(|| Diagnostic::syntax(shape.start, "assignment to keyword")),
            ConstantTargets::Keyword => Some(cannot("keyword")),
            ConstantTargets::Named => Some(cannot(constant.as_str())),
        },
        other => Some(cannot(describe(other, grammar))),
    }
}

fn starred_problem(shape: &Shape<'_>, ctx: BindContext, grammar: &Grammar) -> Option<Diagnostic> {
    match ctx {
        BindContext::Delete => shape
            .starred_positions()
            .first()
            .map(|&pos| Diagnostic::syntax(pos, grammar.phrasing.starred_misuse)),
        BindContext::Store => nested_unpacking(shape, grammar),
    }
}

fn nested_unpacking(shape: &Shape<'_>, grammar: &Grammar) -> Option<Diagnostic> {
    match &shape.kind {
        ShapeKind::Starred(_) => Some(Diagnostic::syntax(
            shape.start,
            "starred assignment target must be in a list or tuple",
        )),
        ShapeKind::Tuple(elts) | ShapeKind::List(elts) => unpacking_problem(elts, grammar),
        _ => None,
    }
}

fn unpacking_problem(elts: &[Shape<'_>], grammar: &Grammar) -> Option<Diagnostic> {
    let mut seen_star = false;
    for (index, elt) in elts.iter().enumerate() {
        let ShapeKind::Starred(inner) = &elt.kind else {
            if let Some(problem) = nested_unpacking(elt, grammar) {
                return Some(problem);
            }
            continue;
        };
        if seen_star {
            return Some(Diagnostic::syntax(elt.start, "two starred expressions in assignment"));
        }
        if index > grammar.limits.star_targets {
            return Some(Diagnostic::syntax(
                elt.start,
                "too many expressions in star-unpacking assignment",
            ));
        }
        seen_star = true;
        if let Some(problem) = nested_unpacking(inner, grammar) {
            return Some(problem);
        }
    }
    None
}

/// Validate the target of `x op= value`. Parentheses have already been
/// looked through. The ordinary assignment rules run first.
pub fn check_augmented(shape: &Shape<'_>, grammar: &Grammar) -> Option<Diagnostic> {
    if let Some(problem) = invalid_target(shape, BindContext::Store, grammar) {
        return Some(problem);
    }
    match &shape.kind {
        ShapeKind::Name { .. } | ShapeKind::Attribute | ShapeKind::Subscript => None,
        _ => Some(Diagnostic::syntax(
            shape.start,
            "illegal expression for augmented assignment",
        )),
    }
}

/// Validate the target of `x: annotation [= value]`.
pub fn check_annotated(shape: &Shape<'_>, grammar: &Grammar) -> Option<Diagnostic> {
    match &shape.kind {
        ShapeKind::Name { .. } => invalid_target(shape, BindContext::Store, grammar),
        ShapeKind::Attribute | ShapeKind::Subscript => None,
        ShapeKind::List(_) => Some(Diagnostic::syntax(
            shape.start,
            "only single target (not list) can be annotated",
        )),
        ShapeKind::Tuple(_) => Some(Diagnostic::syntax(
            shape.start,
            "only single target (not tuple) can be annotated",
        )),
        _ => Some(Diagnostic::syntax(shape.start, "illegal target for annotation")),
    }
}

/// Validate the left side of `:=`.
pub fn check_named(shape: &Shape<'_>, grammar: &Grammar) -> Option<Diagnostic> {
    match &shape.kind {
        ShapeKind::Name { .. } => invalid_target(shape, BindContext::Store, grammar),
        other => Some(Diagnostic::syntax(
            shape.start,
            format!("cannot use named assignment with {}", describe(other, grammar)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::load_grammar;

    fn at(col: usize, kind: ShapeKind<'static>) -> Shape<'static> {
        Shape::new(kind, Position::new(1, col))
    }

    fn name(col: usize, id: &'static str) -> Shape<'static> {
        at(col, ShapeKind::Name { id, event: None })
    }

    fn starred(col: usize, inner: Shape<'static>) -> Shape<'static> {
        at(col, ShapeKind::Starred(Box::new(inner)))
    }

    fn message(shape: &Shape<'_>, ctx: BindContext, version: &str) -> Option<String> {
        check_target(shape, ctx, load_grammar(version).unwrap()).map(|d| d.message().to_string())
    }

    #[test]
    fn test_plain_names_are_fine() {
        let target = at(0, ShapeKind::Tuple(vec![name(0, "a"), starred(3, name(4, "b"))]));
        assert_eq!(message(&target, BindContext::Store, "3.6"), None);
    }

    #[test]
    fn test_literal_phrasing_drift() {
        let target = at(0, ShapeKind::Number);
        assert_eq!(
            message(&target, BindContext::Store, "3.7").as_deref(),
            Some("SyntaxError: can't assign to literal")
        );
        assert_eq!(
            message(&target, BindContext::Delete, "3.8").as_deref(),
            Some("SyntaxError: cannot delete literal")
        );
    }

    #[test]
    fn test_display_names_in_3_8() {
        let set = at(0, ShapeKind::Set);
        assert_eq!(
            message(&set, BindContext::Store, "3.6").as_deref(),
            Some("SyntaxError: can't assign to literal")
        );
        assert_eq!(
            message(&set, BindContext::Store, "3.8").as_deref(),
            Some("SyntaxError: cannot assign to set display")
        );
    }

    #[test]
    fn test_invalid_element_reported_at_element() {
        let target = at(0, ShapeKind::Tuple(vec![name(0, "a"), at(3, ShapeKind::Number)]));
        let diagnostic = check_target(&target, BindContext::Store, load_grammar("3.6").unwrap());
        assert_eq!(diagnostic.unwrap().start(), Position::new(1, 3));
    }

    #[test]
    fn test_constants_by_version() {
        let target = at(1, ShapeKind::Tuple(vec![at(1, ShapeKind::Constant(Constant::True))]));
        assert_eq!(
            message(&target, BindContext::Store, "3.3").as_deref(),
            Some("SyntaxError: assignment to keyword")
        );
        assert_eq!(
            message(&target, BindContext::Store, "3.5").as_deref(),
            Some("SyntaxError: can't assign to keyword")
        );
        assert_eq!(
            message(&target, BindContext::Store, "3.8").as_deref(),
            Some("SyntaxError: cannot assign to True")
        );
        let none = at(4, ShapeKind::Constant(Constant::None));
        assert_eq!(message(&none, BindContext::Delete, "3.3"), None);
        assert_eq!(
            message(&none, BindContext::Delete, "3.4").as_deref(),
            Some("SyntaxError: can't delete keyword")
        );
    }

    #[test]
    fn test_debug_assignment() {
        assert_eq!(
            message(&name(0, "__debug__"), BindContext::Store, "3.6").as_deref(),
            Some("SyntaxError: assignment to keyword")
        );
        assert_eq!(
            message(&name(0, "__debug__"), BindContext::Store, "3.8").as_deref(),
            Some("SyntaxError: cannot assign to __debug__")
        );
    }

    #[test]
    fn test_empty_tuple() {
        let empty = at(0, ShapeKind::Tuple(vec![]));
        assert_eq!(
            message(&empty, BindContext::Store, "3.7").as_deref(),
            Some("SyntaxError: can't assign to ()")
        );
        assert_eq!(message(&empty, BindContext::Store, "3.8"), None);
        assert_eq!(message(&at(0, ShapeKind::List(vec![])), BindContext::Store, "3.7"), None);
    }

    #[test]
    fn test_starred_rules() {
        let bare = starred(0, name(1, "a"));
        assert_eq!(
            message(&bare, BindContext::Store, "3.5").as_deref(),
            Some("SyntaxError: starred assignment target must be in a list or tuple")
        );
        let two = at(
            0,
            ShapeKind::Tuple(vec![starred(0, name(1, "a")), starred(4, name(5, "b"))]),
        );
        assert_eq!(
            message(&two, BindContext::Store, "3.3").as_deref(),
            Some("SyntaxError: two starred expressions in assignment")
        );
        let del = at(0, ShapeKind::Tuple(vec![starred(4, name(5, "a")), name(8, "b")]));
        assert_eq!(
            message(&del, BindContext::Delete, "3.5").as_deref(),
            Some("SyntaxError: can't use starred expression here")
        );
    }

    #[test]
    fn test_too_many_before_star() {
        let mut elts: Vec<_> = (0..256).map(|i| name(i * 2, "a")).collect();
        elts.push(starred(600, name(601, "d")));
        let target = at(0, ShapeKind::Tuple(elts));
        assert_eq!(
            message(&target, BindContext::Store, "3.6").as_deref(),
            Some("SyntaxError: too many expressions in star-unpacking assignment")
        );
    }

    #[test]
    fn test_structural_errors_win_over_starred() {
        let target = at(
            0,
            ShapeKind::Tuple(vec![starred(0, name(1, "a")), starred(4, name(5, "b")), at(8, ShapeKind::Call)]),
        );
        assert_eq!(
            message(&target, BindContext::Store, "3.6").as_deref(),
            Some("SyntaxError: can't assign to function call")
        );
    }

    #[test]
    fn test_augmented_targets() {
        let g = load_grammar("3.6").unwrap();
        assert!(check_augmented(&at(0, ShapeKind::Subscript), g).is_none());
        let tuple = at(0, ShapeKind::Tuple(vec![name(0, "a"), name(3, "b")]));
        assert_eq!(
            check_augmented(&tuple, g).unwrap().message(),
            "SyntaxError: illegal expression for augmented assignment"
        );
        assert_eq!(
            check_augmented(&at(0, ShapeKind::Call), g).unwrap().message(),
            "SyntaxError: can't assign to function call"
        );
    }

    #[test]
    fn test_annotation_targets() {
        let g = load_grammar("3.6").unwrap();
        assert_eq!(
            check_annotated(&at(0, ShapeKind::List(vec![])), g).unwrap().message(),
            "SyntaxError: only single target (not list) can be annotated"
        );
        assert_eq!(
            check_annotated(&at(0, ShapeKind::Tuple(vec![])), g).unwrap().message(),
            "SyntaxError: only single target (not tuple) can be annotated"
        );
        assert_eq!(
            check_annotated(&at(0, ShapeKind::Dict), g).unwrap().message(),
            "SyntaxError: illegal target for annotation"
        );
        assert!(check_annotated(&name(0, "x"), g).is_none());
    }

    #[test]
    fn test_named_expression_target() {
        let g = load_grammar("3.8").unwrap();
        assert_eq!(
            check_named(&at(1, ShapeKind::Attribute), g).unwrap().message(),
            "SyntaxError: cannot use named assignment with attribute"
        );
        assert!(check_named(&name(1, "x"), g).is_none());
    }

    #[test]
    fn test_bound_names() {
        let target = at(
            0,
            ShapeKind::Tuple(vec![name(0, "a"), at(3, ShapeKind::Attribute), starred(6, name(7, "b"))]),
        );
        let names: Vec<_> = target.bound_names().into_iter().map(|(id, ..)| id).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(target.starred_positions(), [Position::new(1, 6)]);
    }
}
