//! Versioned grammar tables.
//!
//! Each supported language version owns one immutable [`Grammar`] bundle in a
//! static table. A parse resolves its bundle once and hands `&Grammar` to the
//! parser, the target validator, the literal decoder and the scope analyzer.
//! Everything that differs between versions (reserved words, feature gates,
//! limits and message wording) is data in that bundle.

use crate::error::{Error, Result};
use crate::tree::Module;
use std::fmt;
use std::str::FromStr;

// ── Version identifiers ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PythonVersion {
    pub major: u8,
    pub minor: u8,
}

impl PythonVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PythonVersion {
    type Err = Error;

    /// Accepts `MAJOR.MINOR` with an optional, ignored `.MICRO`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        if let Some(micro) = parts.next() {
            if micro.parse::<u16>().is_err() {
                return Err(invalid());
            }
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(major, minor))
    }
}

// ── Bundle contents ──────────────────────────────────────────────────────────

/// How `async` and `await` are tokenized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncKeywords {
    /// Ordinary identifiers everywhere.
    Names,
    /// Keywords only lexically inside an `async def`; `async def` itself is
    /// recognised anywhere a statement may start.
    Contextual,
    /// Reserved words.
    Reserved,
}

#[derive(Debug, Clone, Copy)]
pub struct Features {
    pub async_keywords: AsyncKeywords,
    /// `@` and `@=`.
    pub matrix_multiply: bool,
    /// `*a` and `**a` anywhere in calls and displays.
    pub unpacking_generalizations: bool,
    pub variable_annotations: bool,
    pub fstrings: bool,
    pub underscores_in_numbers: bool,
    pub async_generators: bool,
    pub async_comprehensions: bool,
    /// `:=` expressions.
    pub assignment_expressions: bool,
    /// `/` in parameter lists.
    pub positional_only_parameters: bool,
    /// A trailing comma after `*args` or `**kwargs` in a signature.
    pub trailing_comma_after_varargs: bool,
    /// `None`, `True` and `False` are constants rather than protected names.
    pub constant_keywords: bool,
    /// `continue` inside a `finally` body is rejected.
    pub continue_in_finally_rejected: bool,
    /// Name use or assignment before a `global`/`nonlocal` declaration is an
    /// error instead of a warning.
    pub strict_declaration_order: bool,
    /// `f(x for x in y,)` is rejected.
    pub genexp_trailing_comma_rejected: bool,
    /// `(value error)` byte-escape messages carry `at position N`.
    pub bytes_escape_positions: bool,
    /// `() = x` is accepted.
    pub empty_tuple_target: bool,
    /// `(x async for x in y)` is allowed outside `async def`.
    pub async_genexp_anywhere: bool,
    /// `return *a, b`, `yield *a, b` and starred annotated values.
    pub unparenthesized_unpacking: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Most targets allowed before a starred target.
    pub star_targets: usize,
    /// Statically nested blocks per code object.
    pub static_blocks: usize,
    /// Indentation levels the tokenizer accepts.
    pub indent_levels: usize,
    /// Open brackets the tokenizer accepts at once.
    pub bracket_levels: usize,
    /// Nested subexpressions the parser descends into: operands, unary
    /// operators, lambda bodies and comprehension clauses.
    pub expression_nesting: usize,
    /// Arguments per call or signature, when limited.
    pub arguments: Option<usize>,
}

impl Limits {
    pub const DEFAULT: Limits = Limits {
        star_targets: 255,
        static_blocks: 20,
        indent_levels: 100,
        bracket_levels: 200,
        expression_nesting: 300,
        arguments: None,
    };
}

/// How assignment to `None`, `True` and `False` is described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantTargets {
    /// Protected names: `assignment to keyword`; deleting them is allowed.
    ProtectedNames,
    /// `can't assign to keyword`.
    Keyword,
    /// `cannot assign to True`.
    Named,
}

/// Message wording that drifts between versions.
#[derive(Debug, Clone, Copy)]
pub struct Phrasing {
    /// Verb prefix for assignment and deletion targets: `can't` or `cannot`.
    pub cannot: &'static str,
    pub constant_targets: ConstantTargets,
    pub debug_assignment: &'static str,
    /// Displays and f-strings get their own names instead of `literal`.
    pub display_names: bool,
    pub genexp_argument: &'static str,
    pub positional_after_keyword: &'static str,
    pub keyword_expression: &'static str,
    pub lambda_keyword: &'static str,
    pub starred_misuse: &'static str,
    /// Hex escapes running off the end of a literal report `end of string in
    /// escape sequence` over the remaining body.
    pub legacy_escape_errors: bool,
}

/// Keywords shared by every supported version.
const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "break", "class", "continue", "def", "del",
    "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

const KEYWORDS_WITH_ASYNC: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Names `from __future__ import` accepts.
const FUTURE_FEATURES: &[&str] = &[
    "nested_scopes", "generators", "division", "absolute_import", "with_statement",
    "print_function", "unicode_literals", "barry_as_FLUFL",
];

const FUTURE_FEATURES_3_5: &[&str] = &[
    "nested_scopes", "generators", "division", "absolute_import", "with_statement",
    "print_function", "unicode_literals", "barry_as_FLUFL", "generator_stop",
];

const FUTURE_FEATURES_3_7: &[&str] = &[
    "nested_scopes", "generators", "division", "absolute_import", "with_statement",
    "print_function", "unicode_literals", "barry_as_FLUFL", "generator_stop", "annotations",
];

const EXPRESSION_ASSIGNMENT: &str = "expression cannot contain assignment, perhaps you meant \"==\"?";

/// An immutable per-version grammar bundle.
#[derive(Debug)]
pub struct Grammar {
    pub version: PythonVersion,
    pub reserved: &'static [&'static str],
    pub future_features: &'static [&'static str],
    pub features: Features,
    pub limits: Limits,
    pub phrasing: Phrasing,
}

const fn build(minor: u8) -> Grammar {
    let modern = minor >= 8;
    Grammar {
        version: PythonVersion::new(3, minor),
        reserved: if minor >= 7 { KEYWORDS_WITH_ASYNC } else { KEYWORDS },
        future_features: if minor >= 7 {
            FUTURE_FEATURES_3_7
        } else if minor >= 5 {
            FUTURE_FEATURES_3_5
        } else {
            FUTURE_FEATURES
        },
        features: Features {
            async_keywords: if minor >= 7 {
                AsyncKeywords::Reserved
            } else if minor >= 5 {
                AsyncKeywords::Contextual
            } else {
                AsyncKeywords::Names
            },
            matrix_multiply: minor >= 5,
            unpacking_generalizations: minor >= 5,
            variable_annotations: minor >= 6,
            fstrings: minor >= 6,
            underscores_in_numbers: minor >= 6,
            async_generators: minor >= 6,
            async_comprehensions: minor >= 6,
            assignment_expressions: modern,
            positional_only_parameters: modern,
            trailing_comma_after_varargs: minor >= 6,
            constant_keywords: minor >= 4,
            continue_in_finally_rejected: !modern,
            strict_declaration_order: minor >= 6,
            genexp_trailing_comma_rejected: minor >= 7,
            bytes_escape_positions: true,
            empty_tuple_target: modern,
            async_genexp_anywhere: minor >= 7,
            unparenthesized_unpacking: modern,
        },
        limits: Limits {
            arguments: if minor >= 7 { None } else { Some(255) },
            ..Limits::DEFAULT
        },
        phrasing: Phrasing {
            cannot: if modern { "cannot" } else { "can't" },
            constant_targets: if modern {
                ConstantTargets::Named
            } else if minor >= 4 {
                ConstantTargets::Keyword
            } else {
                ConstantTargets::ProtectedNames
            },
            debug_assignment: if modern {
                "cannot assign to __debug__"
            } else {
                "assignment to keyword"
            },
            display_names: modern,
            genexp_argument: if minor >= 7 {
                "Generator expression must be parenthesized"
            } else {
                "Generator expression must be parenthesized if not sole argument"
            },
            positional_after_keyword: if minor >= 5 {
                "positional argument follows keyword argument"
            } else {
                "non-keyword arg after keyword arg"
            },
            keyword_expression: if modern {
                EXPRESSION_ASSIGNMENT
            } else {
                "keyword can't be an expression"
            },
            lambda_keyword: if modern {
                EXPRESSION_ASSIGNMENT
            } else {
                "lambda cannot contain assignment"
            },
            starred_misuse: if minor >= 5 {
                "can't use starred expression here"
            } else {
                "can use starred expression only as assignment target"
            },
            legacy_escape_errors: minor < 6,
        },
    }
}

static GRAMMARS: [Grammar; 6] = [build(3), build(4), build(5), build(6), build(7), build(8)];

// ── Lookup ───────────────────────────────────────────────────────────────────

/// Resolve a version string such as `"3.6"` to its grammar bundle.
pub fn load_grammar(version: &str) -> Result<&'static Grammar> {
    let wanted: PythonVersion = version.parse()?;
    GRAMMARS
        .iter()
        .find(|g| g.version == wanted)
        .ok_or_else(|| Error::UnsupportedVersion(version.trim().to_string()))
}

pub fn supported_versions() -> impl Iterator<Item = PythonVersion> {
    GRAMMARS.iter().map(|g| g.version)
}

impl Grammar {
    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved.contains(&word)
    }

    /// Parse `text` under this grammar and run the scope analysis.
    pub fn parse<'src>(&self, text: &'src str) -> Result<Module<'src>> {
        crate::syntax::parse_module(text, self)
    }
}
