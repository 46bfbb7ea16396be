/*
 * loops.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `@for` loops and the `@break`/`@continue` statements inside them.

use super::{
    Args, DirectiveParser, DirectivePattern, Leading, block_open, has_top_level, is_identifier,
    leading_tokens, paren_args, statement_tail, usage,
};
use crate::block::LoopBlock;
use crate::context::ParseContext;
use crate::dialect::{DialectFeature, Grammar, Keyword};
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::token::{Conditional, Token};

const FOR_USAGE: &str = "for (Type var : iterable) {";

/// `@for (Type var : items) {`, `@for (var in items) {` and, where the
/// dialect allows it, `@for (init; cond; step) {`.
///
/// Every loop gets a label and an "iterated" flag so that `@break`,
/// `@continue` and a trailing `} else {` can refer to it.
pub struct ForEachParser {
    pattern: DirectivePattern,
    marker: char,
}

impl ForEachParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Each)?,
            marker: grammar.marker(),
        })
    }

    fn header(&self, ctx: &ParseContext<'_>, args: &str, at: usize) -> Result<String, ParseError> {
        let bad = || ctx.error_at(usage("for", self.marker, FOR_USAGE), at);
        if has_top_level(args, ';') {
            ctx.require(DialectFeature::FreeLoop, at)?;
            return Ok(args.to_string());
        }
        let Some((sep, sep_len)) = loop_separator(args) else {
            return Err(bad());
        };
        let decl = args[..sep].trim();
        let iterable = args[sep + sep_len..].trim();
        if decl.is_empty() || iterable.is_empty() {
            return Err(bad());
        }
        let (ty, var) = match decl.rsplit_once(char::is_whitespace) {
            Some((ty, var)) => {
                ctx.require(DialectFeature::TypeDeclaration, at)?;
                (ty.trim(), var)
            }
            None => ("var", decl),
        };
        if !is_identifier(var) {
            return Err(bad());
        }
        Ok(format!("{ty} {var} : {iterable}"))
    }
}

/// Offset and length of the `:` or ` in ` that splits a for-each header.
fn loop_separator(args: &str) -> Option<(usize, usize)> {
    let bytes = args.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut word_in = None;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' | b'>' => depth -= 1,
            b':' if depth == 0 => {
                let scoped = bytes.get(i + 1) == Some(&b':') || (i > 0 && bytes[i - 1] == b':');
                if !scoped {
                    return Some((i, 1));
                }
            }
            b' ' if depth == 0 && word_in.is_none() && args[i..].starts_with(" in ") => {
                word_in = Some(i);
            }
            _ => {}
        }
    }
    word_in.map(|i| (i, 4))
}

impl DirectiveParser for ForEachParser {
    fn name(&self) -> &'static str {
        "for"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let at = ctx.cursor() + d.marker_at;
        let (args, args_end) = match paren_args(remain, d.end) {
            Args::Found { inner, end } if !inner.trim().is_empty() => (inner.trim(), end),
            _ => return Err(ctx.error_at(usage("for", self.marker, FOR_USAGE), at).into()),
        };
        let Some(end) = block_open(remain, args_end) else {
            return Err(ctx.error_at(usage("for", self.marker, FOR_USAGE), at).into());
        };
        let header = self.header(ctx, args, at)?;

        let id = ctx.next_loop_id();
        let label = format!("__loop_{id}");
        let flag = format!("__iterated_{id}");
        let mut tokens = leading_tokens(ctx, &d, Leading::Block);
        tokens.push(Token::code(
            format!("boolean {flag} = false;\n{label}: for ({header}) {{\n{flag} = true;"),
            d.line,
        ));
        ctx.step(end);
        ctx.open_block(Box::new(LoopBlock::new(d.line, label, flag)));
        Ok(Some(tokens))
    }
}

/// `@break`, `@breakIf(cond)`, `@continue` and `@continueIf(cond)`.
///
/// Parentheses are optional; a non-empty condition guards the statement.
pub struct LoopControlParser {
    pattern: DirectivePattern,
    directive: &'static str,
    marker: char,
}

impl LoopControlParser {
    pub fn breaking(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Break)?,
            directive: "break",
            marker: grammar.marker(),
        })
    }

    pub fn continuing(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Continue)?,
            directive: "continue",
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for LoopControlParser {
    fn name(&self) -> &'static str {
        self.directive
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let at = ctx.cursor() + d.marker_at;
        let (condition, args_end) = match paren_args(remain, d.end) {
            Args::Missing => (None, d.end),
            Args::Found { inner, end } => (Some(inner.trim()).filter(|c| !c.is_empty()), end),
            Args::Unbalanced => {
                let hint = format!("{}()", self.directive);
                return Err(ctx
                    .error_at(usage(self.directive, self.marker, &hint), at)
                    .into());
            }
        };
        let statement = if self.directive == "break" {
            ctx.peek_break()
        } else {
            ctx.peek_continue()
        };
        let Some(statement) = statement.map(str::to_string) else {
            return Err(ctx
                .error_at(
                    ParseErrorKind::NoLoopContext {
                        directive: self.directive.to_string(),
                        marker: self.marker,
                    },
                    at,
                )
                .into());
        };

        let mut tokens = leading_tokens(ctx, &d, Leading::Statement);
        tokens.push(match condition {
            Some(condition) => Token::Conditional(Conditional::guard(d.line, condition, statement)),
            None => Token::code(statement, d.line),
        });
        ctx.step(statement_tail(remain, args_end));
        Ok(Some(tokens))
    }
}
