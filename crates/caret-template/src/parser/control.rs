/*
 * control.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Conditionals and early exits: `@if`, `@return`, `@returnIf` and
//! `@__exitIfNoClass__`.

use super::{
    Args, DirectiveParser, DirectivePattern, Leading, block_open, leading_tokens, paren_args,
    statement_end, statement_tail, unquote, usage,
};
use crate::block::SimpleBlock;
use crate::context::ParseContext;
use crate::dialect::{Grammar, Keyword};
use crate::error::{ParseResult, ParseSignal};
use crate::token::{Conditional, Token};

/// `@if (cond) {` and `@ifNot (cond) {`.
pub struct IfParser {
    pattern: DirectivePattern,
    marker: char,
}

impl IfParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::If)?,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for IfParser {
    fn name(&self) -> &'static str {
        "if"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let at = ctx.cursor() + d.marker_at;
        let bad = || ctx.error_at(usage("if", self.marker, "if (condition) {"), at);
        let (condition, args_end) = match paren_args(remain, d.end) {
            Args::Found { inner, end } if !inner.trim().is_empty() => (inner.trim(), end),
            _ => return Err(bad().into()),
        };
        let Some(end) = block_open(remain, args_end) else {
            return Err(bad().into());
        };

        let code = if d.keyword.eq_ignore_ascii_case("ifNot") {
            format!("if (!(__eval({condition}))) {{")
        } else {
            format!("if (__eval({condition})) {{")
        };
        let mut tokens = leading_tokens(ctx, &d, Leading::Block);
        tokens.push(Token::code(code, d.line));
        ctx.step(end);
        ctx.open_block(Box::new(SimpleBlock::conditional(d.line, false)));
        Ok(Some(tokens))
    }
}

/// The statement that ends rendering at the current point.
fn return_statement(ctx: &ParseContext<'_>) -> &'static str {
    if ctx.peek_inside_body() {
        "return;"
    } else {
        "return this;"
    }
}

/// `@return` with optional empty parentheses.
pub struct ReturnParser {
    pattern: DirectivePattern,
}

impl ReturnParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Return)?,
        })
    }
}

impl DirectiveParser for ReturnParser {
    fn name(&self) -> &'static str {
        "return"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let args_end = match paren_args(remain, d.end) {
            Args::Found { inner, end } if inner.trim().is_empty() => end,
            _ => d.end,
        };
        let mut tokens = leading_tokens(ctx, &d, Leading::Statement);
        tokens.push(Token::code(return_statement(ctx), d.line));
        ctx.step(statement_end(remain, args_end));
        Ok(Some(tokens))
    }
}

/// `@returnIf (cond)`: a guarded return.
pub struct ReturnIfParser {
    pattern: DirectivePattern,
    marker: char,
}

impl ReturnIfParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::ReturnIf)?,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for ReturnIfParser {
    fn name(&self) -> &'static str {
        "return-if"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let (condition, args_end) = match paren_args(remain, d.end) {
            Args::Found { inner, end } if !inner.trim().is_empty() => (inner.trim(), end),
            _ => {
                return Err(ctx
                    .error_at(
                        usage("returnIf", self.marker, "returnIf (condition)"),
                        ctx.cursor() + d.marker_at,
                    )
                    .into());
            }
        };
        let mut tokens = leading_tokens(ctx, &d, Leading::IndentOnly);
        tokens.push(Token::Conditional(Conditional::guard(
            d.line,
            condition,
            return_statement(ctx),
        )));
        ctx.step(statement_tail(remain, args_end));
        Ok(Some(tokens))
    }
}

/// `@__exitIfNoClass__(unit.Name)`: ends the pass when the backend does not
/// know the named unit.
///
/// The engine reports an ended pass as a skipped build.
pub struct ExitIfNoClassParser {
    pattern: DirectivePattern,
    marker: char,
}

impl ExitIfNoClassParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::ExitIfNoClass)?,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for ExitIfNoClassParser {
    fn name(&self) -> &'static str {
        "exit-if-no-class"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let (unit, args_end) = match paren_args(remain, d.end) {
            Args::Found { inner, end } if !unquote(inner).is_empty() => (unquote(inner), end),
            _ => {
                return Err(ctx
                    .error_at(
                        usage(
                            "__exitIfNoClass__",
                            self.marker,
                            "__exitIfNoClass__(unit.Name)",
                        ),
                        ctx.cursor() + d.marker_at,
                    )
                    .into());
            }
        };
        let known = ctx.units().is_some_and(|units| units.has_unit(unit));
        if !known {
            return Err(ParseSignal::Exit);
        }
        let tokens = leading_tokens(ctx, &d, Leading::Statement);
        ctx.step(statement_end(remain, args_end));
        Ok(Some(tokens))
    }
}
