/*
 * extension.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Pluggable formatters, expression processors, method extensions and
//! code types.
//!
//! The registry is filled while the engine is configured and shared
//! read-only by every parse and build afterwards.

use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;

use crate::code_type::CodeType;

/// Claims `.format(pattern)` calls and names the runtime helper for them.
pub trait Formatter: Send + Sync {
    fn name(&self) -> &str;

    /// The helper that formats with `pattern`, or `None` to decline.
    ///
    /// `pattern` is the argument as written in the template, quotes included.
    fn helper(&self, pattern: &str) -> Option<String>;
}

/// Rewrites an output expression before it is emitted.
pub trait ExpressionProcessor: Send + Sync {
    /// `None` leaves the expression unchanged.
    fn process(&self, expr: &str) -> Option<String>;
}

/// Rewrites a trailing `.name(..)` call on an expression into a helper call.
///
/// `user.name.raw()` becomes `S.raw(user.name)`, and
/// `price.format("#.00")` becomes `S.format(price, "#.00")`.
#[derive(Debug, Clone)]
pub struct MethodExtension {
    name: String,
    target: String,
    takes_argument: bool,
    /// Registered formatters may pick the target.
    formatting: bool,
    suffix: Regex,
}

impl MethodExtension {
    /// `.name()` with no argument.
    pub fn void(name: &str, target: impl Into<String>) -> Result<Self, regex::Error> {
        Self::new(name, target.into(), false, false)
    }

    /// `.name(arg)`.
    pub fn with_argument(name: &str, target: impl Into<String>) -> Result<Self, regex::Error> {
        Self::new(name, target.into(), true, false)
    }

    /// `.name(pattern)`, routed to the first formatter that claims the
    /// pattern and to `target` otherwise.
    pub fn formatting(name: &str, target: impl Into<String>) -> Result<Self, regex::Error> {
        Self::new(name, target.into(), true, true)
    }

    fn new(
        name: &str,
        target: String,
        takes_argument: bool,
        formatting: bool,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.to_string(),
            target,
            takes_argument,
            formatting,
            suffix: Regex::new(&format!(r"\.\s*{}\s*$", regex::escape(name)))?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split `expr` into receiver and argument if it ends with this call.
    fn split<'e>(&self, expr: &'e str) -> Option<(&'e str, &'e str)> {
        let expr = expr.trim_end();
        let open = matching_open_paren(expr)?;
        let argument = expr[open + 1..expr.len() - 1].trim();
        if self.takes_argument == argument.is_empty() {
            return None;
        }
        let head = &expr[..open];
        let found = self.suffix.find(head)?;
        let receiver = head[..found.start()].trim_end();
        if receiver.is_empty() {
            return None;
        }
        Some((receiver, argument))
    }
}

/// Index of the `(` matching a trailing `)`. Quoted text is skipped.
fn matching_open_paren(expr: &str) -> Option<usize> {
    if !expr.ends_with(')') {
        return None;
    }
    let last = expr.len() - 1;
    let mut opens = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in expr.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => opens.push(i),
            ')' => {
                let open = opens.pop()?;
                if i == last {
                    return Some(open);
                }
            }
            _ => {}
        }
    }
    None
}

pub struct ExtensionRegistry {
    formatters: Vec<Arc<dyn Formatter>>,
    processors: Vec<Arc<dyn ExpressionProcessor>>,
    methods: Vec<MethodExtension>,
    code_types: IndexMap<String, Arc<CodeType>>,
}

impl ExtensionRegistry {
    /// An empty registry holding only the built-in code types.
    pub fn empty() -> Self {
        let mut registry = Self {
            formatters: Vec::new(),
            processors: Vec::new(),
            methods: Vec::new(),
            code_types: IndexMap::new(),
        };
        for code_type in CodeType::builtin() {
            registry.register_code_type(code_type);
        }
        registry
    }

    /// Built-in code types plus the standard method extensions.
    pub fn new() -> Result<Self, regex::Error> {
        let mut registry = Self::empty();
        for name in ["raw", "escapeHtml", "escapeJs", "capFirst", "lowerFirst", "nl2br"] {
            registry.register_method(MethodExtension::void(name, format!("S.{name}"))?);
        }
        for name in ["escape", "pad"] {
            registry.register_method(MethodExtension::with_argument(name, format!("S.{name}"))?);
        }
        registry.register_method(MethodExtension::formatting("format", "S.format")?);
        Ok(registry)
    }

    pub fn register_formatter(&mut self, formatter: Arc<dyn Formatter>) {
        self.formatters.push(formatter);
    }

    pub fn register_processor(&mut self, processor: Arc<dyn ExpressionProcessor>) {
        self.processors.push(processor);
    }

    pub fn register_method(&mut self, method: MethodExtension) {
        self.methods.push(method);
    }

    /// Register a code type, replacing one with the same id.
    pub fn register_code_type(&mut self, code_type: CodeType) {
        self.code_types
            .insert(code_type.id().to_string(), Arc::new(code_type));
    }

    pub fn code_type(&self, id: &str) -> Option<Arc<CodeType>> {
        self.code_types.get(id).cloned()
    }

    /// Helper of the first formatter, in registration order, that claims `pattern`.
    pub fn format_helper(&self, pattern: &str) -> Option<String> {
        self.formatters.iter().find_map(|f| {
            let helper = f.helper(pattern)?;
            tracing::trace!(formatter = f.name(), %helper, "formatter claimed pattern");
            Some(helper)
        })
    }

    /// Apply processors in registration order, then method extensions.
    pub fn process_expression(&self, expr: &str) -> String {
        let mut expr = expr.trim().to_string();
        for processor in &self.processors {
            if let Some(rewritten) = processor.process(&expr) {
                expr = rewritten;
            }
        }
        self.apply_methods(&expr)
    }

    fn apply_methods(&self, expr: &str) -> String {
        for method in &self.methods {
            if let Some((receiver, argument)) = method.split(expr) {
                let receiver = self.apply_methods(receiver);
                let target = if method.formatting {
                    self.format_helper(argument)
                        .unwrap_or_else(|| method.target.clone())
                } else {
                    method.target.clone()
                };
                return if argument.is_empty() {
                    format!("{target}({receiver})")
                } else {
                    format!("{target}({receiver}, {argument})")
                };
            }
        }
        expr.to_string()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("formatters", &self.formatters.len())
            .field("processors", &self.processors.len())
            .field(
                "methods",
                &self.methods.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("code_types", &self.code_types.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dates;

    impl Formatter for Dates {
        fn name(&self) -> &str {
            "dates"
        }

        fn helper(&self, pattern: &str) -> Option<String> {
            pattern
                .trim_matches('"')
                .starts_with("yyyy")
                .then(|| "Dates.format".to_string())
        }
    }

    struct Prefix;

    impl ExpressionProcessor for Prefix {
        fn process(&self, expr: &str) -> Option<String> {
            let rest = expr.strip_prefix('$')?;
            let end = rest
                .find(|c: char| !c.is_alphanumeric() && c != '_')
                .unwrap_or(rest.len());
            Some(format!("params.get(\"{}\"){}", &rest[..end], &rest[end..]))
        }
    }

    #[test]
    fn test_void_method_extension() {
        let registry = ExtensionRegistry::new().unwrap();
        assert_eq!(registry.process_expression("user.name.raw()"), "S.raw(user.name)");
        assert_eq!(registry.process_expression("user.name"), "user.name");
        // raw takes no argument
        assert_eq!(registry.process_expression("x.raw(1)"), "x.raw(1)");
    }

    #[test]
    fn test_argument_method_extension() {
        let registry = ExtensionRegistry::new().unwrap();
        assert_eq!(
            registry.process_expression("price.format(\"#.00\")"),
            "S.format(price, \"#.00\")"
        );
        assert_eq!(registry.process_expression("x.format()"), "x.format()");
    }

    #[test]
    fn test_chained_method_extensions() {
        let registry = ExtensionRegistry::new().unwrap();
        assert_eq!(
            registry.process_expression("a.get(b(1)).format(\"p\").raw()"),
            "S.raw(S.format(a.get(b(1)), \"p\"))"
        );
    }

    #[test]
    fn test_method_name_must_match_exactly() {
        let registry = ExtensionRegistry::new().unwrap();
        assert_eq!(registry.process_expression("x.unraw()"), "x.unraw()");
        assert_eq!(registry.process_expression("raw()"), "raw()");
    }

    #[test]
    fn test_processors_run_before_methods() {
        let mut registry = ExtensionRegistry::new().unwrap();
        registry.register_processor(Arc::new(Prefix));
        assert_eq!(
            registry.process_expression("$title.raw()"),
            "S.raw(params.get(\"title\"))"
        );
        assert_eq!(registry.process_expression("title"), "title");
    }

    #[test]
    fn test_formatters_pick_format_helper() {
        let mut registry = ExtensionRegistry::new().unwrap();
        assert_eq!(registry.format_helper("\"yyyy\""), None);
        registry.register_formatter(Arc::new(Dates));
        assert_eq!(
            registry.process_expression("day.format(\"yyyy-MM-dd\")"),
            "Dates.format(day, \"yyyy-MM-dd\")"
        );
        assert_eq!(
            registry.process_expression("price.format(\"#.00\")"),
            "S.format(price, \"#.00\")"
        );
        // only `.format` consults formatters
        assert_eq!(
            registry.process_expression("day.pad(\"yyyy\")"),
            "S.pad(day, \"yyyy\")"
        );
    }

    #[test]
    fn test_quoted_parens_in_arguments() {
        let registry = ExtensionRegistry::new().unwrap();
        assert_eq!(
            registry.process_expression("x.format(\")\")"),
            "S.format(x, \")\")"
        );
        assert_eq!(
            registry.process_expression("f(\"(\").raw()"),
            "S.raw(f(\"(\"))"
        );
        assert_eq!(registry.process_expression("x.raw())"), "x.raw())");
    }

    #[test]
    fn test_code_types() {
        let mut registry = ExtensionRegistry::empty();
        assert_eq!(registry.code_type("html").unwrap().id(), "html");
        assert!(registry.code_type("sql").is_none());
        registry.register_code_type(CodeType::new("sql", crate::code_type::Escape::Raw));
        assert!(registry.code_type("sql").is_some());
    }
}
