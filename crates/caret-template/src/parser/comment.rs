/*
 * comment.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Marker escapes and template comments.

use super::{DirectiveParser, DirectivePattern, Leading, leading_tokens};
use crate::context::ParseContext;
use crate::dialect::Grammar;
use crate::error::{ParseErrorKind, ParseResult};
use crate::token::Token;

/// A doubled marker (`@@`) outputs one literal marker.
pub struct EscapeParser {
    escaped: String,
    marker: char,
}

impl EscapeParser {
    pub fn new(grammar: &Grammar) -> Self {
        let marker = grammar.marker();
        Self {
            escaped: format!("{marker}{marker}"),
            marker,
        }
    }
}

impl DirectiveParser for EscapeParser {
    fn name(&self) -> &'static str {
        "escape"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        if !ctx.remain().starts_with(&self.escaped) {
            return Ok(None);
        }
        let token = ctx.literal(self.marker);
        ctx.step(self.escaped.len());
        Ok(Some(vec![token]))
    }
}

/// `@** ... *@`, removed entirely.
pub struct BlockCommentParser {
    pattern: DirectivePattern,
    close: String,
}

impl BlockCommentParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::tail(grammar, r"\*\*")?,
            close: format!("*{}", grammar.marker()),
        })
    }
}

impl DirectiveParser for BlockCommentParser {
    fn name(&self) -> &'static str {
        "block-comment"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let Some(close) = remain[d.end..].find(&self.close) else {
            return Err(ctx
                .error_at(
                    ParseErrorKind::syntax(
                        "Unclosed block comment",
                        format!("close the comment with \"{}\"", self.close),
                    ),
                    ctx.cursor() + d.marker_at,
                )
                .into());
        };
        let tokens = leading_tokens(ctx, &d, Leading::Statement);
        ctx.step(d.end + close + self.close.len());
        Ok(Some(tokens))
    }
}

/// `@// ...` (or `@/ ...`) up to, not including, the end of the line.
pub struct InlineCommentParser {
    pattern: DirectivePattern,
}

impl InlineCommentParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::tail(grammar, r"//?[^\n]*")?,
        })
    }
}

impl DirectiveParser for InlineCommentParser {
    fn name(&self) -> &'static str {
        "inline-comment"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let tokens = leading_tokens(ctx, &d, Leading::Statement);
        ctx.step(d.end);
        Ok(Some(tokens))
    }
}
