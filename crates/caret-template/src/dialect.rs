/*
 * dialect.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Dialects: marker character, keyword spellings, feature flags and the
//! ordered list of directive parsers.
//!
//! A [`DialectRegistry`] is assembled once when the engine is configured
//! and is read-only afterwards. Its registration order is the order in
//! which dialects are tried when a template does not pin one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{TemplateError, TemplateResult};
use crate::parser::{self, DirectiveParser, ParserFactory};

/// A construct that a dialect may forbid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectFeature {
    /// `@{ ... }` blocks of host code.
    Scripting,
    /// `@for(init; cond; step)` loops.
    FreeLoop,
    /// `@(...)` expressions.
    ComplexExpression,
    /// Typed loop variables and `@args` declarations.
    TypeDeclaration,
}

impl fmt::Display for DialectFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DialectFeature::Scripting => "Scripting block",
            DialectFeature::FreeLoop => "Free loop",
            DialectFeature::ComplexExpression => "Complex expression",
            DialectFeature::TypeDeclaration => "Type declaration",
        };
        f.write_str(name)
    }
}

/// Feature switches for a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub scripting: bool,
    pub free_loop: bool,
    pub complex_expression: bool,
    pub type_declaration: bool,
}

impl Features {
    pub const ALL: Features = Features {
        scripting: true,
        free_loop: true,
        complex_expression: true,
        type_declaration: true,
    };

    pub const NONE: Features = Features {
        scripting: false,
        free_loop: false,
        complex_expression: false,
        type_declaration: false,
    };

    pub fn allows(&self, feature: DialectFeature) -> bool {
        match feature {
            DialectFeature::Scripting => self.scripting,
            DialectFeature::FreeLoop => self.free_loop,
            DialectFeature::ComplexExpression => self.complex_expression,
            DialectFeature::TypeDeclaration => self.type_declaration,
        }
    }
}

impl Default for Features {
    fn default() -> Self {
        Features::ALL
    }
}

/// Directive keywords with a configurable spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Args,
    Assign,
    Break,
    Compact,
    Continue,
    Each,
    Else,
    Exec,
    ExitIfNoClass,
    I18n,
    If,
    Invoke,
    Locale,
    Macro,
    NoCompact,
    Return,
    ReturnIf,
    Verbatim,
}

impl Keyword {
    pub const ALL: [Keyword; 18] = [
        Keyword::Args,
        Keyword::Assign,
        Keyword::Break,
        Keyword::Compact,
        Keyword::Continue,
        Keyword::Each,
        Keyword::Else,
        Keyword::Exec,
        Keyword::ExitIfNoClass,
        Keyword::I18n,
        Keyword::If,
        Keyword::Invoke,
        Keyword::Locale,
        Keyword::Macro,
        Keyword::NoCompact,
        Keyword::Return,
        Keyword::ReturnIf,
        Keyword::Verbatim,
    ];

    /// Default spelling, as a regex alternation.
    ///
    /// Longer aliases come first so that alternation never stops at a
    /// shorter prefix (`forEach` before `for`).
    pub fn default_spelling(self) -> &'static str {
        match self {
            Keyword::Args => "args",
            Keyword::Assign => "assign",
            Keyword::Break => "(?i:breakIf|break)",
            Keyword::Compact => "compact",
            Keyword::Continue => "(?i:continueIf|continue)",
            Keyword::Each => "(?i:forEach|for|each)",
            Keyword::Else => "else",
            Keyword::Exec => "exec|expand",
            Keyword::ExitIfNoClass => "__exitIfNoClass__",
            Keyword::I18n => "i18n",
            Keyword::If => "(?i:ifNot|if)",
            Keyword::Invoke => "invoke",
            Keyword::Locale => "locale",
            Keyword::Macro => "macro",
            Keyword::NoCompact => "nocompact",
            Keyword::Return => "return",
            Keyword::ReturnIf => "returnIf",
            Keyword::Verbatim => "verbatim",
        }
    }

    /// Name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Keyword::Args => "args",
            Keyword::Assign => "assign",
            Keyword::Break => "break",
            Keyword::Compact => "compact",
            Keyword::Continue => "continue",
            Keyword::Each => "for",
            Keyword::Else => "else",
            Keyword::Exec => "exec",
            Keyword::ExitIfNoClass => "__exitIfNoClass__",
            Keyword::I18n => "i18n",
            Keyword::If => "if",
            Keyword::Invoke => "invoke",
            Keyword::Locale => "locale",
            Keyword::Macro => "macro",
            Keyword::NoCompact => "nocompact",
            Keyword::Return => "return",
            Keyword::ReturnIf => "returnIf",
            Keyword::Verbatim => "verbatim",
        }
    }
}

/// Marker character and keyword spellings of one dialect.
#[derive(Debug, Clone)]
pub struct Grammar {
    marker: char,
    spellings: HashMap<Keyword, String>,
}

impl Grammar {
    pub fn new(marker: char) -> Self {
        Self {
            marker,
            spellings: HashMap::new(),
        }
    }

    pub fn with_spelling(mut self, keyword: Keyword, spelling: impl Into<String>) -> Self {
        self.spellings.insert(keyword, spelling.into());
        self
    }

    pub fn marker(&self) -> char {
        self.marker
    }

    /// The marker, escaped for use in a regex.
    pub fn marker_pattern(&self) -> String {
        regex::escape(&self.marker.to_string())
    }

    pub fn spelling(&self, keyword: Keyword) -> &str {
        self.spellings
            .get(&keyword)
            .map(String::as_str)
            .unwrap_or_else(|| keyword.default_spelling())
    }

    /// Pattern for a directive introduced by `keyword`.
    ///
    /// Captures an optional preceding line break (`lb`), the blanks before
    /// the marker (`ws`) and the spelling that matched (`kw`). The keyword
    /// must end on a word boundary.
    pub fn keyword_regex(&self, keyword: Keyword) -> Result<Regex, regex::Error> {
        self.directive_regex(&format!(r"(?P<kw>{})\b", self.spelling(keyword)))
    }

    /// Pattern for a directive whose text after the marker is `tail`.
    pub fn directive_regex(&self, tail: &str) -> Result<Regex, regex::Error> {
        Regex::new(&format!(
            r"^(?P<lb>\r?\n)?(?P<ws>[ \t\x0B\x0C]*){}{}",
            self.marker_pattern(),
            tail
        ))
    }
}

/// An immutable, fully built dialect.
pub struct Dialect {
    id: String,
    grammar: Grammar,
    features: Features,
    parsers: Vec<Box<dyn DirectiveParser>>,
}

impl Dialect {
    pub fn builder(id: impl Into<String>, marker: char) -> DialectBuilder {
        DialectBuilder {
            id: id.into(),
            grammar: Grammar::new(marker),
            features: Features::ALL,
            first: Vec::new(),
            extra: Vec::new(),
            builtin: true,
        }
    }

    /// Full dialect: `@` marker, every feature allowed.
    pub fn rythm() -> TemplateResult<Dialect> {
        Dialect::builder("rythm", '@').build()
    }

    /// `@` marker without scripting, free loops, complex expressions or
    /// type declarations.
    pub fn rythm_basic() -> TemplateResult<Dialect> {
        Dialect::builder("rythm-basic", '@')
            .features(Features::NONE)
            .build()
    }

    /// Backtick marker, every feature allowed.
    pub fn japid() -> TemplateResult<Dialect> {
        Dialect::builder("japid", '`').build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn marker(&self) -> char {
        self.grammar.marker
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn allows(&self, feature: DialectFeature) -> bool {
        self.features.allows(feature)
    }

    /// Parsers in priority order.
    pub fn parsers(&self) -> &[Box<dyn DirectiveParser>] {
        &self.parsers
    }

    pub fn parser_names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("id", &self.id)
            .field("marker", &self.grammar.marker)
            .field("features", &self.features)
            .field("parsers", &self.parser_names())
            .finish()
    }
}

pub struct DialectBuilder {
    id: String,
    grammar: Grammar,
    features: Features,
    first: Vec<Arc<dyn ParserFactory>>,
    extra: Vec<Arc<dyn ParserFactory>>,
    builtin: bool,
}

impl DialectBuilder {
    pub fn features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Replace a keyword's spelling, e.g. `"breakIf|break|stop"`.
    pub fn spelling(mut self, keyword: Keyword, spelling: impl Into<String>) -> Self {
        self.grammar = self.grammar.with_spelling(keyword, spelling);
        self
    }

    /// Add a parser tried before every built-in parser.
    pub fn parser_first(mut self, factory: impl ParserFactory + 'static) -> Self {
        self.first.push(Arc::new(factory));
        self
    }

    /// Add a parser tried after the built-in directives and before expressions.
    pub fn parser(mut self, factory: impl ParserFactory + 'static) -> Self {
        self.extra.push(Arc::new(factory));
        self
    }

    /// Start from an empty parser list instead of the built-in directives.
    pub fn without_builtin_parsers(mut self) -> Self {
        self.builtin = false;
        self
    }

    pub fn build(self) -> TemplateResult<Dialect> {
        let grammar_error = |err: regex::Error| TemplateError::Grammar {
            dialect: self.id.clone(),
            message: err.to_string(),
        };

        let mut parsers = Vec::new();
        for factory in &self.first {
            parsers.push(factory.create(&self.grammar).map_err(grammar_error)?);
        }
        if self.builtin {
            parsers.extend(parser::builtin_parsers(&self.grammar).map_err(grammar_error)?);
        }
        for factory in &self.extra {
            parsers.push(factory.create(&self.grammar).map_err(grammar_error)?);
        }
        if self.builtin {
            parsers.push(parser::expression_parser(&self.grammar).map_err(grammar_error)?);
        }

        Ok(Dialect {
            id: self.id,
            grammar: self.grammar,
            features: self.features,
            parsers,
        })
    }
}

/// Registered dialects, in negotiation order.
#[derive(Debug, Default)]
pub struct DialectRegistry {
    dialects: IndexMap<String, Arc<Dialect>>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `rythm-basic`, `rythm` and `japid`, most restrictive first.
    pub fn with_builtin() -> TemplateResult<Self> {
        let mut registry = Self::new();
        registry.register(Dialect::rythm_basic()?);
        registry.register(Dialect::rythm()?);
        registry.register(Dialect::japid()?);
        Ok(registry)
    }

    /// Register a dialect. Re-registering an id replaces it in place.
    pub fn register(&mut self, dialect: Dialect) {
        self.dialects
            .insert(dialect.id().to_string(), Arc::new(dialect));
    }

    pub fn get(&self, id: &str) -> Option<Arc<Dialect>> {
        self.dialects.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.dialects.keys().map(String::as_str).collect()
    }

    /// Dialects to try, in order, for a template that does not pin one.
    ///
    /// Only dialects sharing the first dialect's marker take part: a
    /// template is written for one marker character.
    pub fn negotiation_order(&self) -> Vec<Arc<Dialect>> {
        let Some(first) = self.dialects.values().next() else {
            return Vec::new();
        };
        let marker = first.marker();
        self.dialects
            .values()
            .filter(|d| d.marker() == marker)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dialects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_regex_alias_and_boundary() {
        let grammar = Grammar::new('@');
        let re = grammar.keyword_regex(Keyword::Break).unwrap();

        let caps = re.captures("@breakIf(x)").unwrap();
        assert_eq!(&caps["kw"], "breakIf");
        let caps = re.captures("\n  @break()").unwrap();
        assert_eq!(caps.name("lb").map(|m| m.as_str()), Some("\n"));
        assert_eq!(&caps["ws"], "  ");
        assert_eq!(&caps["kw"], "break");
        assert!(re.captures("@BREAK").is_some());
        assert!(re.captures("@breaker").is_none());
        assert!(re.captures("x@break").is_none());
    }

    #[test]
    fn test_for_does_not_match_format() {
        let re = Grammar::new('@').keyword_regex(Keyword::Each).unwrap();
        assert_eq!(&re.captures("@forEach(x : y)").unwrap()["kw"], "forEach");
        assert_eq!(&re.captures("@for(x : y)").unwrap()["kw"], "for");
        assert!(re.captures("@format(x)").is_none());
        assert!(re.captures("@fore").is_none());
    }

    #[test]
    fn test_custom_spelling_and_marker() {
        let grammar = Grammar::new('$').with_spelling(Keyword::Break, "stop|break");
        let re = grammar.keyword_regex(Keyword::Break).unwrap();
        assert!(re.is_match("$stop"));
        assert!(!re.is_match("@stop"));
        assert!(!re.is_match("$breakIf"));
    }

    #[test]
    fn test_builtin_dialects() {
        let basic = Dialect::rythm_basic().unwrap();
        assert_eq!(basic.marker(), '@');
        assert!(!basic.allows(DialectFeature::Scripting));
        assert!(!basic.allows(DialectFeature::TypeDeclaration));

        let full = Dialect::rythm().unwrap();
        assert!(full.allows(DialectFeature::FreeLoop));
        assert!(full.allows(DialectFeature::ComplexExpression));

        let japid = Dialect::japid().unwrap();
        assert_eq!(japid.marker(), '`');
    }

    #[test]
    fn test_parser_priority_order() {
        let dialect = Dialect::rythm().unwrap();
        let names = dialect.parser_names();
        assert_eq!(names.first(), Some(&"escape"));
        assert_eq!(names.last(), Some(&"expression"));

        let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(pos("block-comment") < pos("inline-comment"));
        assert!(pos("else") < pos("block-close"));
        assert!(pos("return-if") < pos("return"));
        assert!(pos("block-close") < pos("for"));
    }

    #[test]
    fn test_invalid_spelling_is_grammar_error() {
        let err = Dialect::builder("broken", '@')
            .spelling(Keyword::If, "(unclosed")
            .build()
            .unwrap_err();
        assert!(matches!(err, TemplateError::Grammar { ref dialect, .. } if dialect == "broken"));
    }

    #[test]
    fn test_registry_order_and_replace() {
        let mut registry = DialectRegistry::with_builtin().unwrap();
        assert_eq!(registry.ids(), vec!["rythm-basic", "rythm", "japid"]);

        let order: Vec<String> = registry
            .negotiation_order()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(order, vec!["rythm-basic", "rythm"]);

        registry.register(
            Dialect::builder("rythm-basic", '@')
                .features(Features::ALL)
                .build()
                .unwrap(),
        );
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.ids()[0], "rythm-basic");
        assert!(
            registry
                .get("rythm-basic")
                .unwrap()
                .allows(DialectFeature::Scripting)
        );
        assert!(registry.get("velocity").is_none());
    }
}
