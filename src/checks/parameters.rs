use crate::grammar::Grammar;
use crate::location::Position;
use crate::types::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Positional-or-keyword, or keyword-only after a `*`.
    Named,
    /// The `/` marker.
    PositionalOnlyMarker,
    /// A bare `*`.
    BareStar,
    /// `*args`
    VarArgs,
    /// `**kwargs`
    KwArgs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter<'src> {
    pub kind: ParameterKind,
    pub name: Option<&'src str>,
    pub has_default: bool,
    pub start: Position,
}

/// Check a `def` or `lambda` signature.
pub fn check_parameters(params: &[Parameter<'_>], grammar: &Grammar) -> Option<Diagnostic> {
    if let Some(limit) = grammar.limits.arguments {
        let named = params
            .iter()
            .filter(|p| p.kind == ParameterKind::Named)
            .count();
        if named > limit {
            let start = params.first().map(|p| p.start).unwrap_or_default();
            return Some(Diagnostic::syntax(start, format!("more than {limit} arguments")));
        }
    }

    let mut keyword_only = false;
    let mut found_default = false;
    for (index, param) in params.iter().enumerate() {
        match param.kind {
            ParameterKind::Named if !keyword_only => {
                if param.has_default {
                    found_default = true;
                } else if found_default {
                    return Some(Diagnostic::syntax(
                        param.start,
                        "non-default argument follows default argument",
                    ));
                }
            }
            ParameterKind::Named | ParameterKind::PositionalOnlyMarker => {}
            ParameterKind::BareStar => {
                let followed = params
                    .get(index + 1)
                    .is_some_and(|next| next.kind == ParameterKind::Named);
                if !followed {
                    return Some(Diagnostic::syntax(
                        param.start,
                        "named arguments must follow bare *",
                    ));
                }
                keyword_only = true;
            }
            ParameterKind::VarArgs => keyword_only = true,
            ParameterKind::KwArgs => {}
        }
        if param.name == Some("__debug__") {
            return Some(Diagnostic::syntax(param.start, grammar.phrasing.debug_assignment));
        }
    }

    let mut seen: Vec<&str> = Vec::new();
    for param in params {
        let Some(name) = param.name else { continue };
        if seen.contains(&name) {
            return Some(Diagnostic::syntax(
                param.start,
                format!("duplicate argument '{name}' in function definition"),
            ));
        }
        seen.push(name);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::load_grammar;

    fn param(kind: ParameterKind, name: Option<&'static str>, has_default: bool, col: usize) -> Parameter<'static> {
        Parameter {
            kind,
            name,
            has_default,
            start: Position::new(1, col),
        }
    }

    fn named(name: &'static str, has_default: bool, col: usize) -> Parameter<'static> {
        param(ParameterKind::Named, Some(name), has_default, col)
    }

    fn check(params: &[Parameter<'_>]) -> Option<String> {
        check_parameters(params, load_grammar("3.6").unwrap()).map(|d| d.message().to_string())
    }

    #[test]
    fn test_duplicate_parameter() {
        let params = [named("x", false, 6), named("x", false, 9)];
        let d = check_parameters(&params, load_grammar("3.6").unwrap()).unwrap();
        assert_eq!(d.message(), "SyntaxError: duplicate argument 'x' in function definition");
        assert_eq!(d.start(), Position::new(1, 9));
    }

    #[test]
    fn test_non_default_after_default() {
        let params = [named("x", true, 6), named("y", false, 11)];
        assert_eq!(
            check(&params).as_deref(),
            Some("SyntaxError: non-default argument follows default argument")
        );
    }

    #[test]
    fn test_keyword_only_defaults_are_free() {
        let params = [
            named("bar", false, 8),
            param(ParameterKind::BareStar, None, false, 13),
            named("name", true, 16),
            named("other", false, 24),
        ];
        assert_eq!(check(&params), None);
    }

    #[test]
    fn test_bare_star_needs_named() {
        let alone = [param(ParameterKind::BareStar, None, false, 8)];
        assert_eq!(
            check(&alone).as_deref(),
            Some("SyntaxError: named arguments must follow bare *")
        );
        let before_kwargs = [
            param(ParameterKind::BareStar, None, false, 8),
            param(ParameterKind::KwArgs, Some("dict"), false, 11),
        ];
        assert!(check(&before_kwargs).is_some());
    }

    #[test]
    fn test_debug_parameter() {
        assert_eq!(
            check(&[named("__debug__", false, 6)]).as_deref(),
            Some("SyntaxError: assignment to keyword")
        );
    }

    #[test]
    fn test_positional_only_marker_keeps_default_rule() {
        let g = load_grammar("3.8").unwrap();
        let params = [
            named("a", true, 6),
            param(ParameterKind::PositionalOnlyMarker, None, false, 11),
            named("b", false, 14),
        ];
        assert!(check_parameters(&params, g).is_some());
    }
}
