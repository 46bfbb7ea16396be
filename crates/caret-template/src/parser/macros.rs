/*
 * macros.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Macro definitions and expansions.
//!
//! Definitions are recorded as block tokens and expansions as call tokens;
//! the code builder resolves one against the other at build time.

use super::{
    Args, DirectiveParser, DirectivePattern, Leading, block_open, leading_tokens, paren_args,
    unquote, usage,
};
use crate::block::MacroBlock;
use crate::context::ParseContext;
use crate::dialect::{Grammar, Keyword};
use crate::error::{ParseErrorKind, ParseResult};
use crate::token::{MacroCall, Token};

/// `@macro("name") { body }`.
pub struct MacroParser {
    pattern: DirectivePattern,
    marker: char,
}

impl MacroParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Macro)?,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for MacroParser {
    fn name(&self) -> &'static str {
        "macro"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let at = ctx.cursor() + d.marker_at;
        let bad = || ctx.error_at(usage("macro", self.marker, "macro(\"name\") {"), at);
        let (name, args_end) = match paren_args(remain, d.end) {
            Args::Found { inner, end } if !unquote(inner).is_empty() => (unquote(inner), end),
            _ => return Err(bad().into()),
        };
        let Some(end) = block_open(remain, args_end) else {
            return Err(bad().into());
        };
        if ctx.peek_inside_body2() {
            return Err(ctx
                .error_at(
                    ParseErrorKind::syntax(
                        format!("Macro \"{name}\" is defined inside another macro"),
                        "define macros at the top level of the template",
                    ),
                    at,
                )
                .into());
        }

        // the whitespace in front belongs to the enclosing sequence, not the body
        for token in leading_tokens(ctx, &d, Leading::Block) {
            ctx.builder_mut().append(token);
        }
        ctx.step(end);
        ctx.open_block(Box::new(MacroBlock::new(d.line, name)));
        Ok(Some(Vec::new()))
    }
}

/// `@exec("name")` and `@expand("name")`.
pub struct ExecParser {
    pattern: DirectivePattern,
    marker: char,
}

impl ExecParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Exec)?,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for ExecParser {
    fn name(&self) -> &'static str {
        "exec"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let (name, end) = match paren_args(remain, d.end) {
            Args::Found { inner, end } if !unquote(inner).is_empty() => (unquote(inner), end),
            _ => {
                return Err(ctx
                    .error_at(
                        usage("exec", self.marker, "exec(\"name\")"),
                        ctx.cursor() + d.marker_at,
                    )
                    .into());
            }
        };
        let mut tokens = leading_tokens(ctx, &d, Leading::Inline);
        tokens.push(Token::MacroCall(MacroCall {
            name: name.to_string(),
            line: d.line,
        }));
        ctx.step(end);
        Ok(Some(tokens))
    }
}
