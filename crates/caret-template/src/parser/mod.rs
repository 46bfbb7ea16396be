/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive parsers.
//!
//! Every parser follows the same two steps. It first matches a pattern
//! built from the dialect's marker and keyword spelling; if that fails it
//! declines by returning `Ok(None)`. Once the keyword has matched, a
//! malformed argument list is an error with a usage hint, never a decline.
//! On success the parser advances the cursor and returns the tokens to
//! append, usually a whitespace literal followed by a code token.

mod block_close;
mod comment;
mod control;
mod directives;
mod expression;
mod invoke;
mod loops;
mod macros;

use regex::Regex;

use crate::context::ParseContext;
use crate::dialect::{Grammar, Keyword};
use crate::error::{ParseErrorKind, ParseResult};
use crate::token::Token;

pub use block_close::{BlockCloseParser, ElseParser};
pub use comment::{BlockCommentParser, EscapeParser, InlineCommentParser};
pub use control::{ExitIfNoClassParser, IfParser, ReturnIfParser, ReturnParser};
pub use directives::{ArgsParser, AssignParser, CompactParser, I18nParser, LocaleParser, VerbatimParser};
pub use expression::{ExpressionParser, ScriptParser};
pub use invoke::InvokeParser;
pub use loops::{ForEachParser, LoopControlParser};
pub use macros::{ExecParser, MacroParser};

pub trait DirectiveParser: Send + Sync {
    /// Short name, used in diagnostics and to document priority.
    fn name(&self) -> &'static str;

    /// Try to parse a directive at the cursor.
    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>>;
}

/// Creates a parser for a dialect's grammar.
pub trait ParserFactory: Send + Sync {
    fn create(&self, grammar: &Grammar) -> Result<Box<dyn DirectiveParser>, regex::Error>;
}

impl<F> ParserFactory for F
where
    F: Fn(&Grammar) -> Result<Box<dyn DirectiveParser>, regex::Error> + Send + Sync,
{
    fn create(&self, grammar: &Grammar) -> Result<Box<dyn DirectiveParser>, regex::Error> {
        self(grammar)
    }
}

/// Built-in parsers in priority order, without the expression parser.
pub(crate) fn builtin_parsers(grammar: &Grammar) -> Result<Vec<Box<dyn DirectiveParser>>, regex::Error> {
    Ok(vec![
        Box::new(EscapeParser::new(grammar)),
        Box::new(BlockCommentParser::new(grammar)?),
        Box::new(InlineCommentParser::new(grammar)?),
        Box::new(ElseParser::new(grammar)?),
        Box::new(BlockCloseParser::new(grammar)),
        Box::new(ArgsParser::new(grammar)?),
        Box::new(AssignParser::new(grammar)?),
        Box::new(LoopControlParser::breaking(grammar)?),
        Box::new(CompactParser::compact(grammar)?),
        Box::new(LoopControlParser::continuing(grammar)?),
        Box::new(ForEachParser::new(grammar)?),
        Box::new(ExecParser::new(grammar)?),
        Box::new(ExitIfNoClassParser::new(grammar)?),
        Box::new(I18nParser::new(grammar)?),
        Box::new(IfParser::new(grammar)?),
        Box::new(InvokeParser::new(grammar)?),
        Box::new(LocaleParser::new(grammar)?),
        Box::new(MacroParser::new(grammar)?),
        Box::new(CompactParser::nocompact(grammar)?),
        Box::new(ReturnIfParser::new(grammar)?),
        Box::new(ReturnParser::new(grammar)?),
        Box::new(VerbatimParser::new(grammar)?),
        Box::new(ScriptParser::new(grammar)?),
    ])
}

pub(crate) fn expression_parser(grammar: &Grammar) -> Result<Box<dyn DirectiveParser>, regex::Error> {
    Ok(Box::new(ExpressionParser::new(grammar)))
}

/// A matched directive head: `[line break][indent]<marker><keyword>`.
#[derive(Debug, Clone)]
pub struct Directive<'s> {
    pub line_break: &'s str,
    pub indent: &'s str,
    pub keyword: &'s str,
    /// Offset of the marker, relative to the cursor.
    pub marker_at: usize,
    /// Length of the match.
    pub end: usize,
    /// Line of the marker.
    pub line: usize,
}

/// Compiled head pattern for one directive.
#[derive(Debug, Clone)]
pub struct DirectivePattern {
    regex: Regex,
}

impl DirectivePattern {
    pub fn keyword(grammar: &Grammar, keyword: Keyword) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: grammar.keyword_regex(keyword)?,
        })
    }

    pub fn tail(grammar: &Grammar, tail: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: grammar.directive_regex(tail)?,
        })
    }

    pub fn find<'s>(&self, ctx: &ParseContext<'s>) -> Option<Directive<'s>> {
        let remain = ctx.remain();
        let caps = self.regex.captures(remain)?;
        let whole = caps.get(0)?;
        let line_break = caps.name("lb").map_or("", |m| m.as_str());
        let indent = caps.name("ws").map_or("", |m| m.as_str());
        let keyword = caps.name("kw").map_or("", |m| m.as_str());
        Some(Directive {
            line_break,
            indent,
            keyword,
            marker_at: line_break.len() + indent.len(),
            end: whole.end(),
            line: ctx.current_line() + usize::from(!line_break.is_empty()),
        })
    }
}

/// How a directive treats the whitespace in front of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Leading {
    /// Block openers: keep the line break, drop indentation.
    Block,
    /// Statements: drop the line break and indentation.
    Statement,
    /// Inline output: keep both.
    Inline,
    /// Keep the indentation, drop the line break.
    IndentOnly,
}

/// Literal tokens for the whitespace in front of a directive.
///
/// Blanks that do not start a line are never dropped.
pub(crate) fn leading_tokens(ctx: &ParseContext<'_>, d: &Directive<'_>, leading: Leading) -> Vec<Token> {
    let line_start = !d.line_break.is_empty() || ctx.at_line_start();
    let (keep_break, keep_indent) = match leading {
        Leading::Block => (true, !line_start),
        Leading::Statement => (false, !line_start),
        Leading::Inline => (true, true),
        Leading::IndentOnly => (false, true),
    };
    let mut text = String::new();
    if keep_break {
        text.push_str(d.line_break);
    }
    if keep_indent {
        text.push_str(d.indent);
    }
    if text.is_empty() {
        Vec::new()
    } else {
        vec![ctx.literal(text)]
    }
}

/// Result of scanning for a parenthesized argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Args<'s> {
    /// No `(` at the position (after optional blanks).
    Missing,
    /// `(` without a matching `)`.
    Unbalanced,
    /// The text between the parentheses and the offset just past `)`.
    Found { inner: &'s str, end: usize },
}

/// Scan `(..)` starting at `at`, skipping blanks first.
pub(crate) fn paren_args(text: &str, at: usize) -> Args<'_> {
    let start = skip_blanks(text, at);
    if !text[start..].starts_with('(') {
        return Args::Missing;
    }
    match scan_balanced(&text[start..], '(', ')', true) {
        Some(len) => Args::Found {
            inner: &text[start + 1..start + len - 1],
            end: start + len,
        },
        None => Args::Unbalanced,
    }
}

/// Length of the balanced `open..close` group at the start of `text`.
///
/// Nested groups are counted. With `quotes`, delimiters inside string and
/// char literals are ignored. `None` if the group is not closed.
pub(crate) fn scan_balanced(text: &str, open: char, close: char, quotes: bool) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if quotes && (c == '"' || c == '\'') {
            quote = Some(c);
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i + c.len_utf8());
            }
        }
    }
    None
}

pub(crate) fn skip_blanks(text: &str, at: usize) -> usize {
    at + text[at..]
        .find(|c: char| !matches!(c, ' ' | '\t' | '\x0B' | '\x0C'))
        .unwrap_or(text.len() - at)
}

/// End of `[ \t]*\{[ \t]*\r?\n?` at `at`, if a block opens there.
pub(crate) fn block_open(text: &str, at: usize) -> Option<usize> {
    let brace = skip_blanks(text, at);
    if !text[brace..].starts_with('{') {
        return None;
    }
    let mut end = skip_blanks(text, brace + 1);
    if text[end..].starts_with("\r\n") {
        end += 2;
    } else if text[end..].starts_with('\n') {
        end += 1;
    }
    Some(end)
}

/// End of the `[ \t;]*` run at `at`.
pub(crate) fn statement_end(text: &str, at: usize) -> usize {
    at + text[at..]
        .find(|c: char| !matches!(c, ' ' | '\t' | ';'))
        .unwrap_or(text.len() - at)
}

/// End of the `[\s;]*` run at `at`.
///
/// Loop control and `returnIf` consume the rest of their line, line
/// break included.
pub(crate) fn statement_tail(text: &str, at: usize) -> usize {
    at + text[at..]
        .find(|c: char| !(c.is_whitespace() || c == ';'))
        .unwrap_or(text.len() - at)
}

/// Split on `sep` where it is not nested in brackets or quotes.
///
/// With `angles`, `<..>` also nests, for generic type declarations.
pub(crate) fn split_top_level(text: &str, sep: char, angles: bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '<' if angles => depth += 1,
            '>' if angles => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Whether `sep` occurs outside brackets and quotes.
pub(crate) fn has_top_level(text: &str, sep: char) -> bool {
    split_top_level(text, sep, false).len() > 1
}

/// Trim and strip one pair of matching quotes.
pub(crate) fn unquote(text: &str) -> &str {
    let text = text.trim();
    for q in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(q) && text.ends_with(q) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Usage-hint syntax error for a directive.
pub(crate) fn usage(directive: &str, marker: char, usage: &str) -> ParseErrorKind {
    ParseErrorKind::syntax(
        format!("Bad {marker}{directive} statement"),
        format!("Correct usage: {marker}{usage}"),
    )
}
