/*
 * tokenizer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The scan loop of one parse pass.
//!
//! At each position the tokenizer tries, in order: natural-template
//! comment sensors, embedded code-type sensors, the dialect's parsers in
//! priority order, and finally plain text. A marker that no parser claims
//! is an error.

use std::sync::Arc;

use regex::Regex;

use crate::block::LiteralBlock;
use crate::context::ParseContext;
use crate::error::{ParseErrorKind, ParseResult};
use crate::parser::skip_blanks;
use crate::token::Token;

pub struct Tokenizer {
    comment_start: Regex,
    comment_end: Regex,
    /// The open directive comment started its own line.
    comment_owns_line: bool,
}

impl Tokenizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            comment_start: Regex::new(r"^(?P<lb>\r?\n)?[ \t]*<!--[ \t]*")?,
            comment_end: Regex::new(r"^[ \t]*-->")?,
            comment_owns_line: false,
        })
    }

    /// Tokens for the next piece of input. The cursor always advances.
    pub fn next_tokens(&mut self, ctx: &mut ParseContext<'_>) -> ParseResult<Vec<Token>> {
        if ctx.config().natural_template {
            if let Some(tokens) = self.directive_comment(ctx) {
                return Ok(tokens);
            }
        }
        let remain = ctx.remain();
        if remain.starts_with('<') {
            switch_code_type(ctx);
        }

        let dialect = Arc::clone(ctx.dialect());
        for parser in dialect.parsers() {
            let before = ctx.cursor();
            if let Some(tokens) = parser.parse(ctx)? {
                if ctx.cursor() == before {
                    return Err(ctx
                        .error(ParseErrorKind::Internal(format!(
                            "parser `{}` matched without consuming input",
                            parser.name()
                        )))
                        .into());
                }
                return Ok(tokens);
            }
        }

        let marker = ctx.marker();
        if remain.starts_with(marker) {
            return Err(ctx.error(ParseErrorKind::UnknownDirective { marker }).into());
        }
        if remain.starts_with('{') && ctx.has_open_block() {
            let token = ctx.literal("{");
            let line = ctx.current_line();
            ctx.step(1);
            ctx.open_block(Box::new(LiteralBlock::new(line)));
            return Ok(vec![token]);
        }
        Ok(vec![literal(ctx)])
    }

    /// Enter or leave a `<!-- ... -->` comment that hides directives.
    fn directive_comment(&mut self, ctx: &mut ParseContext<'_>) -> Option<Vec<Token>> {
        let remain = ctx.remain();
        if ctx.inside_directive_comment() {
            let end = self.comment_end.find(remain)?.end();
            let end = if self.comment_owns_line {
                let after = skip_blanks(remain, end);
                if remain[after..].starts_with("\r\n") {
                    after + 2
                } else if remain[after..].starts_with('\n') {
                    after + 1
                } else {
                    after
                }
            } else {
                end
            };
            ctx.step(end);
            ctx.set_inside_directive_comment(false);
            return Some(Vec::new());
        }

        let caps = self.comment_start.captures(remain)?;
        let end = caps.get(0)?.end();
        let next = remain[end..].chars().next()?;
        if next != ctx.marker() && !(next == '}' && ctx.has_open_block()) {
            return None;
        }
        let line_break = caps.name("lb").map_or("", |m| m.as_str());
        self.comment_owns_line = !line_break.is_empty() || ctx.at_line_start();
        let tokens = if line_break.is_empty() {
            Vec::new()
        } else {
            vec![ctx.literal(line_break)]
        };
        ctx.step(end);
        ctx.set_inside_directive_comment(true);
        Some(tokens)
    }
}

/// Follow `<script>`/`<style>`-like tags into and out of embedded languages.
fn switch_code_type(ctx: &mut ParseContext<'_>) {
    let remain = ctx.remain();
    if ctx
        .peek_code_type()
        .is_some_and(|frame| frame.code_type.ends_block(remain))
    {
        ctx.pop_code_type();
        return;
    }
    let current = ctx.code_type();
    let extensions = ctx.extensions();
    let embedded = current
        .embedded()
        .iter()
        .filter_map(|id| extensions.code_type(id))
        .find(|code_type| code_type.starts_block(remain));
    if let Some(code_type) = embedded {
        ctx.push_code_type(code_type);
    }
}

/// Consume template text up to the next position a directive could start.
fn literal(ctx: &mut ParseContext<'_>) -> Token {
    let remain = ctx.remain();
    let marker = ctx.marker();
    let braces = ctx.has_open_block();
    let angles = ctx.config().natural_template
        || ctx.code_type().has_sensors()
        || ctx.peek_code_type().is_some();
    let dashes = ctx.inside_directive_comment();
    let stop = |c: char| {
        c == marker
            || c == '\n'
            || (braces && (c == '{' || c == '}'))
            || (angles && c == '<')
            || (dashes && c == '-')
    };
    let first = remain.chars().next().map_or(0, char::len_utf8);
    let len = remain[first..].find(stop).map_or(remain.len(), |i| first + i);
    let token = ctx.literal(&remain[..len]);
    ctx.step(len);
    token
}

/// Run one parse pass over the whole source, appending to the builder.
pub fn run_pass(ctx: &mut ParseContext<'_>) -> ParseResult<()> {
    let mut tokenizer =
        Tokenizer::new().map_err(|err| ctx.error(ParseErrorKind::Internal(err.to_string())))?;
    while ctx.has_remain() {
        for token in tokenizer.next_tokens(ctx)? {
            ctx.builder_mut().append(token);
        }
    }
    if let Some((kind, line)) = ctx.unclosed_block() {
        let mut err = ctx.error(ParseErrorKind::UnclosedBlock {
            block: kind.name().to_string(),
            line,
        });
        err.line = line;
        err.column = None;
        return Err(err.into());
    }
    Ok(())
}
