use crate::grammar::{ConstantTargets, Grammar};
use crate::location::Position;
use crate::targets::{Constant, Shape, ShapeKind};
use crate::types::Diagnostic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentKind<'src> {
    Positional,
    /// `*iterable`
    Unpack,
    /// `**mapping`
    UnpackMapping,
    /// `target=value`; `target` is whatever stood left of the `=`.
    Keyword(Shape<'src>),
    /// An unparenthesized generator expression.
    Generator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallArgument<'src> {
    pub kind: ArgumentKind<'src>,
    pub start: Position,
}

/// Check one call's argument list, in the order the reference compiler
/// does: generator placement, then arity, then each argument left to right.
pub fn check_call_arguments(
    args: &[CallArgument<'_>],
    trailing_comma: bool,
    grammar: &Grammar,
) -> Option<Diagnostic> {
    let generators: Vec<_> = args
        .iter()
        .filter(|a| a.kind == ArgumentKind::Generator)
        .collect();
    if let Some(first) = generators.first() {
        let crowded = generators.len() > 1 || args.len() > generators.len();
        let trailing = trailing_comma && grammar.features.genexp_trailing_comma_rejected;
        if crowded || trailing {
            return Some(Diagnostic::syntax(first.start, grammar.phrasing.genexp_argument));
        }
    }

    if let Some(limit) = grammar.limits.arguments {
        if args.len() > limit {
            let start = args.first().map(|a| a.start).unwrap_or_default();
            return Some(Diagnostic::syntax(start, format!("more than {limit} arguments")));
        }
    }

    let phrasing = &grammar.phrasing;
    let generalized = grammar.features.unpacking_generalizations;
    let mut keywords: Vec<&str> = Vec::new();
    let mut seen_keyword = false;
    let mut seen_mapping = false;
    let mut seen_unpack = false;

    for arg in args {
        match &arg.kind {
            ArgumentKind::Positional => {
                if seen_mapping && generalized {
                    return Some(Diagnostic::syntax(
                        arg.start,
                        "positional argument follows keyword argument unpacking",
                    ));
                }
                if seen_keyword || seen_mapping {
                    return Some(Diagnostic::syntax(arg.start, phrasing.positional_after_keyword));
                }
                if seen_unpack && !generalized {
                    return Some(Diagnostic::syntax(
                        arg.start,
                        "only named arguments may follow *expression",
                    ));
                }
            }
            ArgumentKind::Unpack => {
                if seen_mapping {
                    return Some(Diagnostic::syntax(
                        arg.start,
                        "iterable argument unpacking follows keyword argument unpacking",
                    ));
                }
                seen_unpack = true;
            }
            ArgumentKind::UnpackMapping => seen_mapping = true,
            ArgumentKind::Generator => {}
            ArgumentKind::Keyword(target) => {
                if let Some(problem) = keyword_target(target, grammar) {
                    return Some(problem);
                }
                if let ShapeKind::Name { id, .. } = target.kind {
                    if keywords.contains(&id) {
                        return Some(Diagnostic::syntax(arg.start, "keyword argument repeated"));
                    }
                    keywords.push(id);
                }
                seen_keyword = true;
            }
        }
    }
    None
}

fn keyword_target(target: &Shape<'_>, grammar: &Grammar) -> Option<Diagnostic> {
    let phrasing = &grammar.phrasing;
    match &target.kind {
        ShapeKind::Name { id: "__debug__", .. } => {
            Some(Diagnostic::syntax(target.start, phrasing.debug_assignment))
        }
        ShapeKind::Name { .. } => None,
        ShapeKind::Lambda => Some(Diagnostic::syntax(target.start, phrasing.lambda_keyword)),
        ShapeKind::Constant(c) if *c != Constant::Ellipsis => match phrasing.constant_targets {
            ConstantTargets::ProtectedNames => {
                Some(Diagnostic::syntax(target.start, "assignment to keyword"))
            }
            ConstantTargets::Named => Some(Diagnostic::syntax(
                target.start,
                format!("cannot assign to {}", c.as_str()),
            )),
            ConstantTargets::Keyword => {
                Some(Diagnostic::syntax(target.start, phrasing.keyword_expression))
            }
        },
        _ => Some(Diagnostic::syntax(target.start, phrasing.keyword_expression)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::load_grammar;

    fn arg(col: usize, kind: ArgumentKind<'static>) -> CallArgument<'static> {
        CallArgument {
            kind,
            start: Position::new(1, col),
        }
    }

    fn keyword(col: usize, id: &'static str) -> CallArgument<'static> {
        arg(
            col,
            ArgumentKind::Keyword(Shape::new(ShapeKind::Name { id, event: None }, Position::new(1, col))),
        )
    }

    fn check(args: &[CallArgument<'_>], version: &str) -> Option<String> {
        check_call_arguments(args, false, load_grammar(version).unwrap())
            .map(|d| d.message().to_string())
    }

    #[test]
    fn test_repeated_keyword_at_second() {
        let args = [keyword(2, "x"), keyword(7, "x")];
        let d = check_call_arguments(&args, false, load_grammar("3.6").unwrap()).unwrap();
        assert_eq!(d.message(), "SyntaxError: keyword argument repeated");
        assert_eq!(d.start(), Position::new(1, 7));
    }

    #[test]
    fn test_positional_after_keyword_by_version() {
        let args = [keyword(2, "x"), arg(7, ArgumentKind::Positional)];
        assert_eq!(
            check(&args, "3.6").as_deref(),
            Some("SyntaxError: positional argument follows keyword argument")
        );
        assert_eq!(
            check(&args, "3.4").as_deref(),
            Some("SyntaxError: non-keyword arg after keyword arg")
        );
    }

    #[test]
    fn test_unpacking_order() {
        let args = [arg(2, ArgumentKind::UnpackMapping), arg(7, ArgumentKind::Positional)];
        assert_eq!(
            check(&args, "3.5").as_deref(),
            Some("SyntaxError: positional argument follows keyword argument unpacking")
        );
        let args = [arg(2, ArgumentKind::UnpackMapping), arg(7, ArgumentKind::Unpack)];
        assert_eq!(
            check(&args, "3.5").as_deref(),
            Some("SyntaxError: iterable argument unpacking follows keyword argument unpacking")
        );
        let args = [arg(2, ArgumentKind::Unpack), arg(6, ArgumentKind::Positional)];
        assert_eq!(check(&args, "3.5"), None);
        assert_eq!(
            check(&args, "3.4").as_deref(),
            Some("SyntaxError: only named arguments may follow *expression")
        );
    }

    #[test]
    fn test_generator_must_be_alone() {
        let args = [arg(2, ArgumentKind::Generator), arg(20, ArgumentKind::Positional)];
        assert_eq!(
            check(&args, "3.6").as_deref(),
            Some("SyntaxError: Generator expression must be parenthesized if not sole argument")
        );
        assert_eq!(
            check(&args, "3.7").as_deref(),
            Some("SyntaxError: Generator expression must be parenthesized")
        );
        let alone = [arg(2, ArgumentKind::Generator)];
        assert_eq!(check(&alone, "3.7"), None);
        let g36 = load_grammar("3.6").unwrap();
        let g37 = load_grammar("3.7").unwrap();
        assert!(check_call_arguments(&alone, true, g36).is_none());
        assert!(check_call_arguments(&alone, true, g37).is_some());
    }

    #[test]
    fn test_keyword_must_be_a_name() {
        let lambda = arg(2, ArgumentKind::Keyword(Shape::new(ShapeKind::Lambda, Position::new(1, 2))));
        assert_eq!(
            check(std::slice::from_ref(&lambda), "3.6").as_deref(),
            Some("SyntaxError: lambda cannot contain assignment")
        );
        let op = arg(4, ArgumentKind::Keyword(Shape::new(ShapeKind::Operator, Position::new(1, 4))));
        assert_eq!(
            check(std::slice::from_ref(&op), "3.6").as_deref(),
            Some("SyntaxError: keyword can't be an expression")
        );
        assert_eq!(
            check(&[op], "3.8").as_deref(),
            Some("SyntaxError: expression cannot contain assignment, perhaps you meant \"==\"?")
        );
    }

    #[test]
    fn test_argument_limit() {
        let args: Vec<_> = (0..256).map(|i| arg(i, ArgumentKind::Positional)).collect();
        assert_eq!(check(&args, "3.6").as_deref(), Some("SyntaxError: more than 255 arguments"));
        assert_eq!(check(&args, "3.7"), None);
    }
}
