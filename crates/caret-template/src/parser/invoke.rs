/*
 * invoke.rs
 * Copyright (c) 2025 Posit, PBC
 */

use super::{
    Args, DirectiveParser, DirectivePattern, Leading, block_open, leading_tokens, paren_args,
    split_top_level, usage,
};
use crate::block::InvokeBodyBlock;
use crate::context::ParseContext;
use crate::dialect::{Grammar, Keyword};
use crate::error::ParseResult;
use crate::token::Token;

/// `@invoke("tag", params..)` with optional `.name(..)` calls and an
/// optional `{ body }` passed to the tag.
pub struct InvokeParser {
    pattern: DirectivePattern,
    marker: char,
}

impl InvokeParser {
    pub fn new(grammar: &Grammar) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: DirectivePattern::keyword(grammar, Keyword::Invoke)?,
            marker: grammar.marker(),
        })
    }
}

/// Consume `.ident(args)` calls starting at `at`. Returns the chain text
/// and the offset after it.
fn call_chain(text: &str, mut at: usize) -> (String, usize) {
    let mut chain = String::new();
    while let Some(rest) = text[at..].strip_prefix('.') {
        let ident_len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(rest.len());
        if ident_len == 0 || rest.starts_with(|c: char| c.is_ascii_digit()) {
            break;
        }
        let name_end = at + 1 + ident_len;
        let Args::Found { inner, end } = paren_args(text, name_end) else {
            break;
        };
        chain.push('.');
        chain.push_str(&text[at + 1..name_end]);
        chain.push('(');
        chain.push_str(inner.trim());
        chain.push(')');
        at = end;
    }
    (chain, at)
}

impl DirectiveParser for InvokeParser {
    fn name(&self) -> &'static str {
        "invoke"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        let Some(d) = self.pattern.find(ctx) else {
            return Ok(None);
        };
        let remain = ctx.remain();
        let (args, args_end) = match paren_args(remain, d.end) {
            Args::Found { inner, end } if !inner.trim().is_empty() => (inner.trim(), end),
            _ => {
                return Err(ctx
                    .error_at(
                        usage("invoke", self.marker, "invoke(\"tagName\", params...)"),
                        ctx.cursor() + d.marker_at,
                    )
                    .into());
            }
        };
        let tag = split_top_level(args, ',', false)
            .first()
            .map_or(args, |first| *first);
        let params = args[tag.len()..].trim_start_matches(',').trim();
        let mut call = format!("__tag({}", tag.trim());
        if !params.is_empty() {
            call.push_str(", ");
            call.push_str(params);
        }
        call.push(')');
        let (chain, chain_end) = call_chain(remain, args_end);
        call.push_str(&chain);

        let mut tokens = leading_tokens(ctx, &d, Leading::Inline);
        match block_open(remain, chain_end) {
            Some(end) => {
                tokens.push(Token::code(format!("{call}.call(__body -> {{"), d.line));
                ctx.step(end);
                ctx.open_block(Box::new(InvokeBodyBlock::new(d.line)));
            }
            None => {
                tokens.push(Token::code(format!("{call}.call();"), d.line));
                ctx.step(chain_end);
            }
        }
        Ok(Some(tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_chain() {
        let text = "@invoke(\"t\").cache(\"1h\").assign(x) rest";
        let (chain, end) = call_chain(text, 12);
        assert_eq!(chain, ".cache(\"1h\").assign(x)");
        assert_eq!(&text[end..], " rest");
    }

    #[test]
    fn test_call_chain_stops_at_plain_dot() {
        let text = "@invoke(\"t\"). Next sentence";
        assert_eq!(call_chain(text, 12), (String::new(), 12));
        let text = "@invoke(\"t\").field";
        assert_eq!(call_chain(text, 12), (String::new(), 12));
    }
}
