/*
 * builder.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The code builder: accumulates tokens in parse order and emits the
//! generated class.
//!
//! Building runs in two passes. The first records every macro definition
//! in the sequence, so a macro can be expanded before the point where it
//! is defined. The second writes one statement per token.

use std::collections::HashMap;

use crate::error::{ParseError, ParseErrorKind};
use crate::extension::ExtensionRegistry;
use crate::token::{BlockKind, Code, Literal, Token};

/// Base class every generated template extends.
pub const TEMPLATE_BASE: &str = "caret.TemplateBase";

/// A `@args` declaration, emitted as a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderArg {
    pub ty: String,
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct CodeBuilder {
    template_id: String,
    class_name: String,
    sequence: Vec<Token>,
    /// Token lists of macro bodies being recorded, innermost last.
    captures: Vec<Vec<Token>>,
    render_args: Vec<RenderArg>,
    remove_next_line_break: bool,
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0B' | '\x0C')
}

impl CodeBuilder {
    pub fn new(template_id: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            class_name: class_name.into(),
            sequence: Vec::new(),
            captures: Vec::new(),
            render_args: Vec::new(),
            remove_next_line_break: false,
        }
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The top-level build sequence.
    pub fn tokens(&self) -> &[Token] {
        &self.sequence
    }

    pub fn render_args(&self) -> &[RenderArg] {
        &self.render_args
    }

    fn target(&self) -> &Vec<Token> {
        self.captures.last().unwrap_or(&self.sequence)
    }

    fn target_mut(&mut self) -> &mut Vec<Token> {
        match self.captures.last_mut() {
            Some(capture) => capture,
            None => &mut self.sequence,
        }
    }

    /// Append a token in parse order.
    ///
    /// Adjacent literals with the same compact flag are merged. A code
    /// token flagged `remove_next_line_break` strips one line break from
    /// the start of whatever literal comes next.
    pub fn append(&mut self, token: Token) {
        let remove_line_break = match &token {
            Token::Block(_) => false,
            _ => std::mem::take(&mut self.remove_next_line_break),
        };
        match token {
            Token::Literal(mut literal) => {
                if remove_line_break {
                    strip_leading_line_break(&mut literal.text);
                }
                if literal.text.is_empty() {
                    return;
                }
                match self.target_mut().last_mut() {
                    Some(Token::Literal(prev)) if prev.compact == literal.compact => {
                        prev.text.push_str(&literal.text);
                    }
                    _ => self.target_mut().push(Token::Literal(literal)),
                }
            }
            Token::Code(code) => {
                self.remove_next_line_break = code.remove_next_line_break;
                if !code.code.is_empty() || code.remove_next_line_break {
                    self.target_mut().push(Token::Code(code));
                }
            }
            other => self.target_mut().push(other),
        }
    }

    /// Whether the output so far ends at the start of a line, ignoring blanks.
    ///
    /// True after a literal that ends with a line break plus blanks, and
    /// after a block close that already took its own line.
    pub fn at_line_start(&self) -> bool {
        match self.target().last() {
            Some(Token::Literal(Literal { text, .. })) => {
                text.trim_end_matches(is_blank).ends_with('\n')
            }
            Some(Token::Code(Code {
                remove_next_line_break,
                ..
            })) => *remove_next_line_break,
            _ => false,
        }
    }

    /// Strip the blanks that follow the last line break of the last literal.
    ///
    /// Nothing happens unless those blanks start a line.
    pub fn strip_to_last_line_break(&mut self) {
        if let Some(Token::Literal(literal)) = self.target_mut().last_mut() {
            let trimmed = literal.text.trim_end_matches(is_blank).len();
            if literal.text[..trimmed].ends_with('\n') {
                literal.text.truncate(trimmed);
            }
        }
    }

    /// Strip every trailing blank of the last literal.
    pub fn strip_trailing_blanks(&mut self) {
        let target = self.target_mut();
        if let Some(Token::Literal(literal)) = target.last_mut() {
            let trimmed = literal.text.trim_end_matches(is_blank).len();
            literal.text.truncate(trimmed);
            if literal.text.is_empty() {
                target.pop();
            }
        }
    }

    /// Start recording tokens for a macro body.
    pub fn begin_capture(&mut self) {
        self.captures.push(Vec::new());
    }

    /// Stop recording and return the recorded tokens.
    pub fn end_capture(&mut self) -> Vec<Token> {
        self.captures.pop().unwrap_or_default()
    }

    pub fn add_render_arg(&mut self, arg: RenderArg) {
        if !self.render_args.iter().any(|a| a.name == arg.name) {
            self.render_args.push(arg);
        }
    }

    /// Discard everything appended so far.
    pub fn rewind(&mut self) {
        self.sequence.clear();
        self.captures.clear();
        self.render_args.clear();
        self.remove_next_line_break = false;
    }

    fn error(&self, dialect: &str, line: usize, kind: ParseErrorKind) -> ParseError {
        ParseError {
            template_id: self.template_id.clone(),
            dialect: dialect.to_string(),
            line,
            column: None,
            kind,
        }
    }

    fn collect_macros<'t>(&'t self, dialect: &str) -> Result<MacroTable<'t>, ParseError> {
        let mut macros = MacroTable::default();
        for token in &self.sequence {
            if let Token::Block(block) = token {
                let BlockKind::Macro { name } = &block.kind;
                if let Some((_, first_line)) = macros.get(name) {
                    return Err(self.error(
                        dialect,
                        block.line,
                        ParseErrorKind::MacroRedefined {
                            name: name.clone(),
                            first_line,
                        },
                    ));
                }
                macros.insert(name, block.line, &block.children);
            }
        }
        Ok(macros)
    }

    /// Emit the generated class.
    pub fn build(&self, dialect: &str, extensions: &ExtensionRegistry) -> Result<String, ParseError> {
        let macros = self.collect_macros(dialect)?;
        let mut emitter = Emitter {
            builder: self,
            dialect,
            extensions,
            macros: &macros,
            expanding: Vec::new(),
            out: SourceWriter::new(),
        };

        emitter.out.line(
            0,
            &format!(
                "// Generated by caret from `{}` (dialect: {dialect}). Do not edit.",
                self.template_id
            ),
        );
        emitter.out.line(
            0,
            &format!("public class {} extends {TEMPLATE_BASE} {{", self.class_name),
        );
        for arg in &self.render_args {
            emitter
                .out
                .line(1, &format!("protected {} {};", arg.ty, arg.name));
        }
        if !self.render_args.is_empty() {
            emitter.out.blank();
        }
        emitter.out.line(1, "@Override");
        emitter.out.line(1, "protected void build() {");
        for token in &self.sequence {
            emitter.emit(token)?;
        }
        emitter.out.line(1, "}");
        emitter.out.line(0, "}");
        Ok(emitter.out.finish())
    }
}

fn strip_leading_line_break(text: &mut String) {
    if text.starts_with("\r\n") {
        text.drain(..2);
    } else if text.starts_with('\n') {
        text.remove(0);
    }
}

/// Macro bodies by name, with the line of each definition.
#[derive(Debug, Default)]
struct MacroTable<'t> {
    bodies: HashMap<&'t str, (usize, &'t [Token])>,
}

impl<'t> MacroTable<'t> {
    fn get(&self, name: &str) -> Option<(&'t [Token], usize)> {
        self.bodies.get(name).map(|(line, body)| (*body, *line))
    }

    fn insert(&mut self, name: &'t str, line: usize, body: &'t [Token]) {
        self.bodies.insert(name, (line, body));
    }
}

struct Emitter<'b, 't> {
    builder: &'b CodeBuilder,
    dialect: &'b str,
    extensions: &'b ExtensionRegistry,
    macros: &'b MacroTable<'t>,
    /// Names of macros being expanded, outermost first.
    expanding: Vec<String>,
    out: SourceWriter,
}

impl Emitter<'_, '_> {
    fn emit(&mut self, token: &Token) -> Result<(), ParseError> {
        match token {
            Token::Literal(literal) => {
                let text = if literal.compact {
                    compact(&literal.text)
                } else {
                    literal.text.clone()
                };
                if !text.is_empty() {
                    self.out.statement(
                        &format!("p(\"{}\");", escape_string(&text)),
                        literal.line,
                    );
                }
            }
            Token::Code(code) => {
                if !code.code.trim().is_empty() {
                    self.out.statement(&code.code, code.line);
                }
            }
            Token::Expr(expr) => {
                let processed = self.extensions.process_expression(&expr.expr);
                let statement = match expr.escape {
                    crate::code_type::Escape::Raw => format!("p({processed});"),
                    escape => format!("pe({processed}, \"{escape}\");"),
                };
                self.out.statement(&statement, expr.line);
            }
            Token::Conditional(cond) => {
                self.out.statement(&cond.to_lines().join("\n"), cond.line);
            }
            Token::MacroCall(call) => {
                let Some((body, _)) = self.macros.get(&call.name) else {
                    return Err(self.builder.error(
                        self.dialect,
                        call.line,
                        ParseErrorKind::UndefinedMacro {
                            name: call.name.clone(),
                        },
                    ));
                };
                if self.expanding.contains(&call.name) {
                    return Err(self.builder.error(
                        self.dialect,
                        call.line,
                        ParseErrorKind::RecursiveMacro {
                            name: call.name.clone(),
                        },
                    ));
                }
                self.expanding.push(call.name.clone());
                for child in body {
                    self.emit(child)?;
                }
                self.expanding.pop();
            }
            // definitions are emitted where they are expanded
            Token::Block(_) => {}
        }
        Ok(())
    }
}

/// Collapse blank runs to one space and line-break runs to one line break.
pub fn compact(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending: Option<char> = None;
    for c in text.chars() {
        if c == '\n' || c == '\r' {
            pending = Some('\n');
        } else if c.is_whitespace() {
            if pending.is_none() {
                pending = Some(' ');
            }
        } else {
            if let Some(ws) = pending.take() {
                out.push(ws);
            }
            out.push(c);
        }
    }
    if let Some(ws) = pending {
        out.push(ws);
    }
    out
}

/// Escape text for a double-quoted string literal in generated code.
pub fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Indented line writer for the generated class.
#[derive(Debug, Default)]
pub struct SourceWriter {
    buf: String,
}

const INDENT: &str = "    ";
const STATEMENT_DEPTH: usize = 2;

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.buf.push_str(INDENT);
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Write a statement inside `build()`, tagging its last line with the
    /// template line it came from.
    pub fn statement(&mut self, code: &str, template_line: usize) {
        let lines: Vec<&str> = code.lines().collect();
        let last = lines.len().saturating_sub(1);
        for (i, text) in lines.iter().enumerate() {
            if i == last {
                self.line(STATEMENT_DEPTH, &format!("{text} //line: {template_line}"));
            } else {
                self.line(STATEMENT_DEPTH, text);
            }
        }
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_type::Escape;
    use crate::token::{Block, Expr, MacroCall};
    use pretty_assertions::assert_eq;

    fn builder() -> CodeBuilder {
        CodeBuilder::new("t.html", "caret_t_html")
    }

    fn literals(builder: &CodeBuilder) -> Vec<String> {
        builder
            .tokens()
            .iter()
            .filter_map(|t| match t {
                Token::Literal(l) => Some(l.text.clone()),
                _ => None,
            })
            .collect()
    }

    fn macro_def(name: &str, line: usize, children: Vec<Token>) -> Token {
        Token::Block(Block {
            kind: BlockKind::Macro {
                name: name.to_string(),
            },
            line,
            children,
        })
    }

    #[test]
    fn test_append_merges_literals() {
        let mut b = builder();
        b.append(Token::literal("abc", 1));
        b.append(Token::literal("@", 1));
        b.append(Token::literal("xyz", 1));
        assert_eq!(b.tokens().len(), 1);
        assert_eq!(literals(&b), vec!["abc@xyz"]);
    }

    #[test]
    fn test_compact_flag_splits_literals() {
        let mut b = builder();
        b.append(Token::literal("a", 1));
        b.append(Token::Literal(Literal {
            text: "b".to_string(),
            line: 1,
            compact: true,
        }));
        assert_eq!(b.tokens().len(), 2);
    }

    #[test]
    fn test_remove_next_line_break() {
        let mut b = builder();
        b.append(Token::Code(Code {
            code: "}".to_string(),
            line: 1,
            remove_next_line_break: true,
        }));
        b.append(Token::literal("\nnext", 2));
        assert_eq!(literals(&b), vec!["next"]);

        // only the next token is affected
        b.append(Token::literal("\nagain", 3));
        assert_eq!(literals(&b), vec!["next\nagain"]);
    }

    #[test]
    fn test_strip_to_last_line_break() {
        let mut b = builder();
        b.append(Token::literal("a\n   \t", 1));
        assert!(b.at_line_start());
        b.strip_to_last_line_break();
        assert_eq!(literals(&b), vec!["a\n"]);

        let mut b = builder();
        b.append(Token::literal("a  ", 1));
        assert!(!b.at_line_start());
        b.strip_to_last_line_break();
        assert_eq!(literals(&b), vec!["a  "]);
    }

    #[test]
    fn test_strip_trailing_blanks() {
        let mut b = builder();
        b.append(Token::literal("a  ", 1));
        b.strip_trailing_blanks();
        assert_eq!(literals(&b), vec!["a"]);

        let mut b = builder();
        b.append(Token::code("x();", 1));
        b.append(Token::literal("  ", 1));
        b.strip_trailing_blanks();
        assert_eq!(b.tokens().len(), 1);
    }

    #[test]
    fn test_capture_records_into_body() {
        let mut b = builder();
        b.append(Token::literal("before", 1));
        b.begin_capture();
        b.append(Token::literal("inside", 2));
        let body = b.end_capture();
        assert_eq!(body, vec![Token::literal("inside", 2)]);
        assert_eq!(literals(&b), vec!["before"]);
    }

    #[test]
    fn test_rewind() {
        let mut b = builder();
        b.append(Token::literal("x", 1));
        b.add_render_arg(RenderArg {
            ty: "String".into(),
            name: "x".into(),
            line: 1,
        });
        b.rewind();
        assert!(b.tokens().is_empty());
        assert!(b.render_args().is_empty());
    }

    #[test]
    fn test_build_statements() {
        let mut b = builder();
        b.add_render_arg(RenderArg {
            ty: "String".into(),
            name: "who".into(),
            line: 1,
        });
        b.append(Token::literal("Hi \"", 1));
        b.append(Token::Expr(Expr {
            expr: "who".into(),
            escape: Escape::Html,
            line: 1,
        }));
        b.append(Token::Expr(Expr {
            expr: "who.raw()".into(),
            escape: Escape::Raw,
            line: 2,
        }));
        let source = b
            .build("rythm", &ExtensionRegistry::new().unwrap())
            .unwrap();
        assert_eq!(
            source,
            "// Generated by caret from `t.html` (dialect: rythm). Do not edit.\n\
             public class caret_t_html extends caret.TemplateBase {\n\
             \x20   protected String who;\n\
             \n\
             \x20   @Override\n\
             \x20   protected void build() {\n\
             \x20       p(\"Hi \\\"\"); //line: 1\n\
             \x20       pe(who, \"html\"); //line: 1\n\
             \x20       p(S.raw(who)); //line: 2\n\
             \x20   }\n\
             }\n"
        );
    }

    #[test]
    fn test_macro_forward_reference() {
        let mut b = builder();
        b.append(Token::MacroCall(MacroCall {
            name: "m".into(),
            line: 1,
        }));
        b.append(macro_def("m", 2, vec![Token::literal("body", 3)]));
        let source = b.build("rythm", &ExtensionRegistry::empty()).unwrap();
        assert!(source.contains("p(\"body\"); //line: 3"));
        assert_eq!(source.matches("p(\"body\")").count(), 1);
    }

    #[test]
    fn test_undefined_macro() {
        let mut b = builder();
        b.append(Token::MacroCall(MacroCall {
            name: "nope".into(),
            line: 4,
        }));
        let err = b.build("rythm", &ExtensionRegistry::empty()).unwrap_err();
        assert_eq!(err.line, 4);
        assert_eq!(
            err.kind,
            ParseErrorKind::UndefinedMacro {
                name: "nope".into()
            }
        );
        assert_eq!(err.template_id, "t.html");
    }

    #[test]
    fn test_macro_redefinition_is_error() {
        let mut b = builder();
        b.append(macro_def("m", 1, vec![]));
        b.append(macro_def("m", 5, vec![]));
        let err = b.build("rythm", &ExtensionRegistry::empty()).unwrap_err();
        assert_eq!(err.line, 5);
        assert_eq!(
            err.kind,
            ParseErrorKind::MacroRedefined {
                name: "m".into(),
                first_line: 1
            }
        );
    }

    #[test]
    fn test_recursive_macro() {
        let mut b = builder();
        b.append(macro_def(
            "a",
            1,
            vec![Token::MacroCall(MacroCall {
                name: "b".into(),
                line: 2,
            })],
        ));
        b.append(macro_def(
            "b",
            3,
            vec![Token::MacroCall(MacroCall {
                name: "a".into(),
                line: 4,
            })],
        ));
        b.append(Token::MacroCall(MacroCall {
            name: "a".into(),
            line: 5,
        }));
        let err = b.build("rythm", &ExtensionRegistry::empty()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::RecursiveMacro { name: "a".into() });
        assert_eq!(err.line, 4);
    }

    #[test]
    fn test_compact() {
        assert_eq!(compact("a  \n\n   b \t"), "a\nb ");
        assert_eq!(compact("  x"), " x");
        assert_eq!(compact("no-space"), "no-space");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("a\"b\\c\nd\te"), "a\\\"b\\\\c\\nd\\te");
        assert_eq!(escape_string("\u{1}"), "\\u0001");
    }

    #[test]
    fn test_multiline_statement_marks_last_line() {
        let mut w = SourceWriter::new();
        w.statement("a;\nb;", 7);
        assert_eq!(w.finish(), "        a;\n        b; //line: 7\n");
    }
}
