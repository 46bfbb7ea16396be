/*
 * expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Output expressions and scripting blocks.

use super::{DirectiveParser, DirectivePattern, Leading, leading_tokens, scan_balanced, statement_end};
use crate::context::ParseContext;
use crate::dialect::{DialectFeature, Grammar};
use crate::error::{ParseErrorKind, ParseResult};
use crate::token::{Expr, Token};

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn ident_len(text: &str) -> usize {
    if !text.starts_with(is_ident_start) {
        return 0;
    }
    text.find(|c: char| !is_ident_char(c)).unwrap_or(text.len())
}

/// `@name.path(args)[index]` and `@(any expression)`.
///
/// Always the last parser of a dialect: a marker no directive claimed is
/// read as an expression if one follows it.
pub struct ExpressionParser {
    marker: char,
}

impl ExpressionParser {
    pub fn new(grammar: &Grammar) -> Self {
        Self {
            marker: grammar.marker(),
        }
    }
}

impl DirectiveParser for ExpressionParser {
    fn name(&self) -> &'static str {
        "expression"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let remain = ctx.remain();
        let Some(text) = remain.strip_prefix(self.marker) else {
            return Ok(None);
        };
        let start = self.marker.len_utf8();
        let unclosed = |ctx: &ParseContext<'_>| {
            ctx.error(ParseErrorKind::syntax(
                "Unclosed expression",
                format!("balance the brackets after '{}'", self.marker),
            ))
        };

        let (expr, end) = if text.starts_with('(') {
            ctx.require(DialectFeature::ComplexExpression, ctx.cursor())?;
            let Some(len) = scan_balanced(text, '(', ')', true) else {
                return Err(unclosed(ctx).into());
            };
            (text[1..len - 1].trim(), start + len)
        } else {
            let mut end = ident_len(text);
            if end == 0 {
                return Ok(None);
            }
            loop {
                let rest = &text[end..];
                if let Some(after_dot) = rest.strip_prefix('.') {
                    let len = ident_len(after_dot);
                    if len == 0 {
                        break;
                    }
                    end += 1 + len;
                } else if rest.starts_with('(') || rest.starts_with('[') {
                    let (open, close) = if rest.starts_with('(') {
                        ('(', ')')
                    } else {
                        ('[', ']')
                    };
                    let Some(len) = scan_balanced(rest, open, close, true) else {
                        return Err(unclosed(ctx).into());
                    };
                    end += len;
                } else {
                    break;
                }
            }
            (&text[..end], start + end)
        };
        if expr.is_empty() {
            return Err(unclosed(ctx).into());
        }

        let token = Token::Expr(Expr {
            expr: expr.to_string(),
            escape: ctx.escape(),
            line: ctx.current_line(),
        });
        ctx.step(end);
        Ok(Some(vec![token]))
    }
}

/// `@{ host code }`, copied into the generated source as is.
pub struct ScriptParser {
    pattern: DirectivePattern,
}

impl ScriptParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::tail(grammar, r"\{")?,
        })
    }
}

impl DirectiveParser for ScriptParser {
    fn name(&self) -> &'static str {
        "script"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let at = ctx.cursor() + d.marker_at;
        ctx.require(DialectFeature::Scripting, at)?;
        let brace = d.end - 1;
        let Some(len) = scan_balanced(&remain[brace..], '{', '}', true) else {
            return Err(ctx
                .error_at(
                    ParseErrorKind::syntax(
                        "Unclosed scripting block",
                        "close the block with a matching '}'",
                    ),
                    at,
                )
                .into());
        };
        let code = remain[brace + 1..brace + len - 1].trim();
        let mut tokens = leading_tokens(ctx, &d, Leading::Statement);
        if !code.is_empty() {
            tokens.push(Token::code(code, d.line));
        }
        ctx.step(statement_end(remain, brace + len));
        Ok(Some(tokens))
    }
}
