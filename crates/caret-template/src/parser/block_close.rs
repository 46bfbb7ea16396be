/*
 * block_close.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Block closes and `} else {` continuations.

use regex::Regex;

use super::{Args, DirectiveParser, block_open, paren_args, skip_blanks, usage};
use crate::block::{BlockKind, CloseStyle, SimpleBlock};
use crate::context::ParseContext;
use crate::dialect::{Grammar, Keyword};
use crate::error::{ParseErrorKind, ParseResult};
use crate::token::{Code, Token};

/// Whether only blanks precede the cursor on its source line.
fn close_starts_line(ctx: &ParseContext<'_>) -> bool {
    let before = &ctx.source()[..ctx.cursor()];
    let trimmed = before.trim_end_matches([' ', '\t', '\x0B', '\x0C']);
    trimmed.is_empty() || trimmed.ends_with('\n')
}

/// Closes the innermost open block on `}` or `@}`.
pub struct BlockCloseParser {
    marker_close: String,
}

impl BlockCloseParser {
    pub fn new(grammar: &Grammar) -> Self {
        Self {
            marker_close: format!("{}}}", grammar.marker()),
        }
    }
}

impl DirectiveParser for BlockCloseParser {
    fn name(&self) -> &'static str {
        "block-close"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let remain = ctx.remain();
        let len = if remain.starts_with(&self.marker_close) {
            self.marker_close.len()
        } else if remain.starts_with('}') {
            1
        } else {
            return Ok(None);
        };
        let Some(kind) = ctx.current_block() else {
            // a bare `}` outside any block is template text
            if len == 1 {
                return Ok(None);
            }
            return Err(ctx.error(ParseErrorKind::UnmatchedClose).into());
        };

        let line = ctx.current_line();
        let line_alone = ctx.builder().at_line_start() || close_starts_line(ctx);
        match kind.close_style() {
            CloseStyle::Literal => {
                ctx.step(len);
                let token = ctx.close_block()?;
                return Ok(Some(vec![token]));
            }
            CloseStyle::Generic => {
                if line_alone {
                    ctx.builder_mut().strip_to_last_line_break();
                }
            }
            CloseStyle::Loop => ctx.builder_mut().strip_trailing_blanks(),
        }
        ctx.step(len);
        if line_alone {
            let blanks = skip_blanks(ctx.remain(), 0);
            ctx.step(blanks);
        }

        let mut tokens = Vec::with_capacity(2);
        match ctx.close_block()? {
            Token::Code(mut code) => {
                code.remove_next_line_break = line_alone;
                tokens.push(Token::Code(code));
            }
            other => {
                tokens.push(other);
                if line_alone {
                    tokens.push(Token::Code(Code::line_break_eater(line)));
                }
            }
        }
        Ok(Some(tokens))
    }
}

/// `} else {`, `} else if (c) {` and `} else ifNot (c) {`.
///
/// After a conditional this continues the ladder. After a loop it opens
/// the branch taken when the loop did not iterate.
pub struct ElseParser {
    regex: Regex,
    marker: char,
}

impl ElseParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        let marker = grammar.marker_pattern();
        let regex = Regex::new(&format!(
            r"^\}}[ \t\x0B\x0C]*(?:\r?\n[ \t\x0B\x0C]*)?(?:{marker})?(?:{else_kw})\b(?:[ \t]*(?:{marker})?(?P<if>{if_kw})\b)?",
            else_kw = grammar.spelling(Keyword::Else),
            if_kw = grammar.spelling(Keyword::If),
        ))?;
        Ok(Self {
            regex,
            marker: grammar.marker(),
        })
    }
}

impl DirectiveParser for ElseParser {
    fn name(&self) -> &'static str {
        "else"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let (iterated, final_else) = match ctx.current_block() {
            Some(BlockKind::Conditional { final_else }) => (None, final_else),
            Some(BlockKind::Loop { iterated }) => (Some(iterated), false),
            _ => return Ok(None),
        };
        let remain = ctx.remain();
        let Some(caps) = self.regex.captures(remain) else {
            return Ok(None);
        };
        let head_end = caps.get(0).map_or(0, |m| m.end());
        let if_kw = caps.name("if").map(|m| m.as_str());
        let start = ctx.cursor();

        if final_else {
            return Err(ctx
                .error(ParseErrorKind::syntax(
                    "Unexpected else after a final else branch",
                    "a conditional can have only one plain else branch",
                ))
                .into());
        }

        let condition = match if_kw {
            None => None,
            Some(_) if iterated.is_some() => {
                return Err(ctx
                    .error(ParseErrorKind::syntax(
                        "Bad else if after a loop",
                        format!("only a plain {}else may follow a loop", self.marker),
                    ))
                    .into());
            }
            Some(kw) => match paren_args(remain, head_end) {
                Args::Found { inner, end } if !inner.trim().is_empty() => {
                    Some((inner.trim(), kw.eq_ignore_ascii_case("ifNot"), end))
                }
                _ => {
                    return Err(ctx
                        .error(usage("else if", self.marker, "} else if (condition) {"))
                        .into());
                }
            },
        };
        let args_end = condition.map_or(head_end, |(_, _, end)| end);
        let Some(end) = block_open(remain, args_end) else {
            return Err(ctx
                .error_at(
                    usage("else", self.marker, "} else {"),
                    start + args_end,
                )
                .into());
        };

        let line = ctx.current_line();
        if ctx.builder().at_line_start() || close_starts_line(ctx) {
            ctx.builder_mut().strip_to_last_line_break();
        }
        // the `}` is part of the generated continuation
        ctx.close_block()?;
        ctx.step(end);

        let (code, block) = match (iterated, condition) {
            (Some(flag), _) => (
                format!("}}\nif (!{flag}) {{"),
                SimpleBlock::loop_else(line),
            ),
            (None, Some((cond, negated, _))) => {
                let code = if negated {
                    format!("}} else if (!(__eval({cond}))) {{")
                } else {
                    format!("}} else if (__eval({cond})) {{")
                };
                (code, SimpleBlock::conditional(line, false))
            }
            (None, None) => ("} else {".to_string(), SimpleBlock::conditional(line, true)),
        };
        ctx.open_block(Box::new(block));
        Ok(Some(vec![Token::code(code, line)]))
    }
}
