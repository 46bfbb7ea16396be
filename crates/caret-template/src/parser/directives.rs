/*
 * directives.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Declarations and output-shaping blocks: `@args`, `@assign`, `@locale`,
//! `@i18n`, `@compact`, `@nocompact` and `@verbatim`.

use super::{
    Args, DirectiveParser, DirectivePattern, Leading, block_open, is_identifier, leading_tokens,
    paren_args, scan_balanced, skip_blanks, split_top_level, unquote, usage,
};
use crate::block::{AssignBlock, CompactBlock, LocaleBlock};
use crate::builder::RenderArg;
use crate::context::ParseContext;
use crate::dialect::{DialectFeature, Grammar, Keyword};
use crate::error::{ParseErrorKind, ParseResult};
use crate::token::{Expr, Literal, Token};

const ARGS_USAGE: &str = "args Type name[, Type name...]";

/// Skip one `\r?\n` at `at`.
fn line_break_end(text: &str, at: usize) -> usize {
    if text[at..].starts_with("\r\n") {
        at + 2
    } else if text[at..].starts_with('\n') {
        at + 1
    } else {
        at
    }
}

/// `@args Type name, Type name` declares render arguments.
///
/// The whole declaration line disappears from the output.
pub struct ArgsParser {
    pattern: DirectivePattern,
    marker: char,
}

impl ArgsParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Args)?,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for ArgsParser {
    fn name(&self) -> &'static str {
        "args"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let at = ctx.cursor() + d.marker_at;
        ctx.require(DialectFeature::TypeDeclaration, at)?;

        let line_end = remain[d.end..]
            .find(['\r', '\n'])
            .map_or(remain.len(), |i| d.end + i);
        let declarations = remain[d.end..line_end].trim().trim_end_matches(';').trim();
        if declarations.is_empty() {
            return Err(ctx.error_at(usage("args", self.marker, ARGS_USAGE), at).into());
        }
        let mut args = Vec::new();
        for declaration in split_top_level(declarations, ',', true) {
            let parsed = declaration
                .trim()
                .rsplit_once(char::is_whitespace)
                .map(|(ty, name)| (ty.trim(), name))
                .filter(|(ty, name)| !ty.is_empty() && is_identifier(name));
            let Some((ty, name)) = parsed else {
                return Err(ctx.error_at(usage("args", self.marker, ARGS_USAGE), at).into());
            };
            args.push(RenderArg {
                ty: ty.to_string(),
                name: name.to_string(),
                line: d.line,
            });
        }

        let tokens = leading_tokens(ctx, &d, Leading::Block);
        for arg in args {
            ctx.builder_mut().add_render_arg(arg);
        }
        ctx.step(line_break_end(remain, line_end));
        Ok(Some(tokens))
    }
}

/// `@assign("name") { body }` renders the body into a variable.
pub struct AssignParser {
    pattern: DirectivePattern,
    marker: char,
}

impl AssignParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Assign)?,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for AssignParser {
    fn name(&self) -> &'static str {
        "assign"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let at = ctx.cursor() + d.marker_at;
        let bad = || ctx.error_at(usage("assign", self.marker, "assign(\"variable\") {"), at);
        let (variable, args_end) = match paren_args(remain, d.end) {
            Args::Found { inner, end } if is_identifier(unquote(inner)) => (unquote(inner), end),
            _ => return Err(bad().into()),
        };
        let Some(end) = block_open(remain, args_end) else {
            return Err(bad().into());
        };
        let mut tokens = leading_tokens(ctx, &d, Leading::Block);
        tokens.push(Token::code("__captureBegin();", d.line));
        ctx.step(end);
        ctx.open_block(Box::new(AssignBlock::new(d.line, variable)));
        Ok(Some(tokens))
    }
}

/// `@locale("fr") { body }` switches the message locale for the body.
pub struct LocaleParser {
    pattern: DirectivePattern,
    marker: char,
}

impl LocaleParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Locale)?,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for LocaleParser {
    fn name(&self) -> &'static str {
        "locale"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let at = ctx.cursor() + d.marker_at;
        let bad = || ctx.error_at(usage("locale", self.marker, "locale(\"fr\") {"), at);
        let (locale, args_end) = match paren_args(remain, d.end) {
            Args::Found { inner, end } if !inner.trim().is_empty() => (inner.trim(), end),
            _ => return Err(bad().into()),
        };
        let Some(end) = block_open(remain, args_end) else {
            return Err(bad().into());
        };
        let mut tokens = leading_tokens(ctx, &d, Leading::Block);
        tokens.push(Token::code(format!("__pushLocale({locale});"), d.line));
        ctx.step(end);
        ctx.open_block(Box::new(LocaleBlock::new(d.line, locale)));
        Ok(Some(tokens))
    }
}

/// `@i18n("key", args..)` outputs a localized message, escaped like any
/// other expression.
pub struct I18nParser {
    pattern: DirectivePattern,
    marker: char,
}

impl I18nParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::I18n)?,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for I18nParser {
    fn name(&self) -> &'static str {
        "i18n"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let (args, end) = match paren_args(remain, d.end) {
            Args::Found { inner, end } if !inner.trim().is_empty() => (inner.trim(), end),
            _ => {
                return Err(ctx
                    .error_at(
                        usage("i18n", self.marker, "i18n(\"message.key\", args...)"),
                        ctx.cursor() + d.marker_at,
                    )
                    .into());
            }
        };
        let locale = ctx.peek_locale().unwrap_or("null");
        let expr = format!("__i18n({locale}, {args})");
        let mut tokens = leading_tokens(ctx, &d, Leading::Inline);
        tokens.push(Token::Expr(Expr {
            expr,
            escape: ctx.escape(),
            line: d.line,
        }));
        ctx.step(end);
        Ok(Some(tokens))
    }
}

/// `@compact() { body }` and `@nocompact() { body }`.
pub struct CompactParser {
    pattern: DirectivePattern,
    compact: bool,
    marker: char,
}

impl CompactParser {
    pub fn compact(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Compact)?,
            compact: true,
            marker: grammar.marker(),
        })
    }

    pub fn nocompact(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::NoCompact)?,
            compact: false,
            marker: grammar.marker(),
        })
    }

    fn directive(&self) -> &'static str {
        if self.compact { "compact" } else { "nocompact" }
    }
}

impl DirectiveParser for CompactParser {
    fn name(&self) -> &'static str {
        self.directive()
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let args_end = match paren_args(remain, d.end) {
            Args::Missing => Some(d.end),
            Args::Found { inner, end } if inner.trim().is_empty() => Some(end),
            _ => None,
        };
        let Some(end) = args_end.and_then(|at| block_open(remain, at)) else {
            let hint = format!("{}() {{", self.directive());
            return Err(ctx
                .error_at(
                    usage(self.directive(), self.marker, &hint),
                    ctx.cursor() + d.marker_at,
                )
                .into());
        };
        let tokens = leading_tokens(ctx, &d, Leading::Block);
        ctx.step(end);
        ctx.open_block(Box::new(CompactBlock::new(d.line, self.compact)));
        Ok(Some(tokens))
    }
}

/// `@verbatim() { raw }` copies the body to the output untouched.
///
/// Braces in the body must balance.
pub struct VerbatimParser {
    pattern: DirectivePattern,
    marker: char,
}

impl VerbatimParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Verbatim)?,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for VerbatimParser {
    fn name(&self) -> &'static str {
        "verbatim"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let at = ctx.cursor() + d.marker_at;
        let args_end = match paren_args(remain, d.end) {
            Args::Missing => d.end,
            Args::Found { inner, end } if inner.trim().is_empty() => end,
            _ => {
                return Err(ctx
                    .error_at(usage("verbatim", self.marker, "verbatim() {"), at)
                    .into());
            }
        };
        let brace = skip_blanks(remain, args_end);
        if !remain[brace..].starts_with('{') {
            return Err(ctx
                .error_at(usage("verbatim", self.marker, "verbatim() {"), at)
                .into());
        }
        let Some(len) = scan_balanced(&remain[brace..], '{', '}', false) else {
            return Err(ctx
                .error_at(
                    ParseErrorKind::syntax(
                        "Unclosed verbatim block",
                        "braces inside a verbatim block must balance",
                    ),
                    at,
                )
                .into());
        };
        let close = brace + len;
        let raw = &remain[brace + 1..close - 1];
        let body = raw
            .strip_prefix("\r\n")
            .or_else(|| raw.strip_prefix('\n'))
            .unwrap_or(raw);
        let trimmed = body.trim_end_matches([' ', '\t']);
        let (body, end) = if trimmed.ends_with('\n') {
            // the close has a line of its own
            (trimmed, line_break_end(remain, skip_blanks(remain, close)))
        } else {
            (body, close)
        };

        let mut tokens = leading_tokens(ctx, &d, Leading::Block);
        tokens.push(Token::Literal(Literal {
            text: body.to_string(),
            line: d.line,
            compact: false,
        }));
        ctx.step(end);
        Ok(Some(tokens))
    }
}
