/*
 * block.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Open/close behavior of directive blocks.
//!
//! A directive that opens a block pushes a [`BlockHandler`] onto the parse
//! context. The matching close pops it and asks it for the closing token.

use std::fmt;

use crate::context::ParseContext;
use crate::error::ParseError;
use crate::token::{Block, BlockKind as TokenBlockKind, Code, Token};

/// What kind of block is open. Decides how its close is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// A loop. `iterated` is the flag set by each iteration.
    Loop { iterated: String },
    /// The `else` branch of a loop.
    LoopElse,
    /// An `if` or `else if` branch. `final_else` is set for a plain `else`.
    Conditional { final_else: bool },
    Assign,
    Locale,
    Compact,
    InvokeBody,
    Macro,
    /// A `{` that is part of the template text.
    Literal,
}

/// How whitespace around a block close is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStyle {
    /// Loops and assignments: trailing blanks before the close are always
    /// stripped.
    Loop,
    /// Other directive blocks: blanks are stripped only when the close
    /// stands alone on its line.
    Generic,
    /// Literal braces: nothing is stripped.
    Literal,
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Loop { .. } => "loop",
            BlockKind::LoopElse => "loop else",
            BlockKind::Conditional { .. } => "if",
            BlockKind::Assign => "assign",
            BlockKind::Locale => "locale",
            BlockKind::Compact => "compact",
            BlockKind::InvokeBody => "invoke body",
            BlockKind::Macro => "macro",
            BlockKind::Literal => "brace",
        }
    }

    pub fn close_style(&self) -> CloseStyle {
        match self {
            BlockKind::Loop { .. } | BlockKind::LoopElse | BlockKind::Assign => CloseStyle::Loop,
            BlockKind::Literal => CloseStyle::Literal,
            _ => CloseStyle::Generic,
        }
    }
}

pub trait BlockHandler: fmt::Debug + Send {
    fn kind(&self) -> BlockKind;

    /// Line the block was opened on.
    fn line(&self) -> usize;

    /// Called when the block is pushed.
    fn open_block(&mut self, _ctx: &mut ParseContext<'_>) {}

    /// Called after the block is popped. Returns the closing token.
    fn close_block(self: Box<Self>, ctx: &mut ParseContext<'_>) -> Result<Token, ParseError>;
}

#[derive(Debug)]
pub struct LoopBlock {
    line: usize,
    label: String,
    iterated: String,
}

impl LoopBlock {
    pub fn new(line: usize, label: impl Into<String>, iterated: impl Into<String>) -> Self {
        Self {
            line,
            label: label.into(),
            iterated: iterated.into(),
        }
    }
}

impl BlockHandler for LoopBlock {
    fn kind(&self) -> BlockKind {
        BlockKind::Loop {
            iterated: self.iterated.clone(),
        }
    }

    fn line(&self) -> usize {
        self.line
    }

    fn open_block(&mut self, ctx: &mut ParseContext<'_>) {
        ctx.push_break(Some(format!("break {};", self.label)));
        ctx.push_continue(Some(format!("continue {};", self.label)));
    }

    fn close_block(self: Box<Self>, ctx: &mut ParseContext<'_>) -> Result<Token, ParseError> {
        ctx.pop_break();
        ctx.pop_continue();
        Ok(Token::code("}", ctx.current_line()))
    }
}

/// A block that closes with `}` and has no other side effect.
#[derive(Debug)]
pub struct SimpleBlock {
    kind: BlockKind,
    line: usize,
}

impl SimpleBlock {
    pub fn conditional(line: usize, final_else: bool) -> Self {
        Self {
            kind: BlockKind::Conditional { final_else },
            line,
        }
    }

    pub fn loop_else(line: usize) -> Self {
        Self {
            kind: BlockKind::LoopElse,
            line,
        }
    }
}

impl BlockHandler for SimpleBlock {
    fn kind(&self) -> BlockKind {
        self.kind.clone()
    }

    fn line(&self) -> usize {
        self.line
    }

    fn close_block(self: Box<Self>, ctx: &mut ParseContext<'_>) -> Result<Token, ParseError> {
        Ok(Token::code("}", ctx.current_line()))
    }
}

/// `@assign("name") { ... }`: captures the body's output into a variable.
#[derive(Debug)]
pub struct AssignBlock {
    line: usize,
    variable: String,
}

impl AssignBlock {
    pub fn new(line: usize, variable: impl Into<String>) -> Self {
        Self {
            line,
            variable: variable.into(),
        }
    }
}

impl BlockHandler for AssignBlock {
    fn kind(&self) -> BlockKind {
        BlockKind::Assign
    }

    fn line(&self) -> usize {
        self.line
    }

    fn close_block(self: Box<Self>, ctx: &mut ParseContext<'_>) -> Result<Token, ParseError> {
        Ok(Token::code(
            format!("String {} = __captureEnd();", self.variable),
            ctx.current_line(),
        ))
    }
}

#[derive(Debug)]
pub struct LocaleBlock {
    line: usize,
    locale: String,
}

impl LocaleBlock {
    pub fn new(line: usize, locale: impl Into<String>) -> Self {
        Self {
            line,
            locale: locale.into(),
        }
    }
}

impl BlockHandler for LocaleBlock {
    fn kind(&self) -> BlockKind {
        BlockKind::Locale
    }

    fn line(&self) -> usize {
        self.line
    }

    fn open_block(&mut self, ctx: &mut ParseContext<'_>) {
        ctx.push_locale(self.locale.clone());
    }

    fn close_block(self: Box<Self>, ctx: &mut ParseContext<'_>) -> Result<Token, ParseError> {
        ctx.pop_locale();
        Ok(Token::code("__popLocale();", ctx.current_line()))
    }
}

/// `@compact() { ... }` and `@nocompact() { ... }`.
#[derive(Debug)]
pub struct CompactBlock {
    line: usize,
    compact: bool,
}

impl CompactBlock {
    pub fn new(line: usize, compact: bool) -> Self {
        Self { line, compact }
    }
}

impl BlockHandler for CompactBlock {
    fn kind(&self) -> BlockKind {
        BlockKind::Compact
    }

    fn line(&self) -> usize {
        self.line
    }

    fn open_block(&mut self, ctx: &mut ParseContext<'_>) {
        ctx.push_compact(self.compact);
    }

    fn close_block(self: Box<Self>, ctx: &mut ParseContext<'_>) -> Result<Token, ParseError> {
        ctx.pop_compact();
        Ok(Token::Code(Code::new("", ctx.current_line())))
    }
}

/// Body passed to an `@invoke`d tag.
///
/// Loops outside the body are not visible to `@break`/`@continue` inside it.
#[derive(Debug)]
pub struct InvokeBodyBlock {
    line: usize,
}

impl InvokeBodyBlock {
    pub fn new(line: usize) -> Self {
        Self { line }
    }
}

impl BlockHandler for InvokeBodyBlock {
    fn kind(&self) -> BlockKind {
        BlockKind::InvokeBody
    }

    fn line(&self) -> usize {
        self.line
    }

    fn open_block(&mut self, ctx: &mut ParseContext<'_>) {
        ctx.push_inside_body(true);
        ctx.push_break(None);
        ctx.push_continue(None);
    }

    fn close_block(self: Box<Self>, ctx: &mut ParseContext<'_>) -> Result<Token, ParseError> {
        ctx.pop_inside_body();
        ctx.pop_break();
        ctx.pop_continue();
        Ok(Token::code("});", ctx.current_line()))
    }
}

/// `@macro("name") { ... }`: records the body instead of emitting it.
#[derive(Debug)]
pub struct MacroBlock {
    line: usize,
    name: String,
}

impl MacroBlock {
    pub fn new(line: usize, name: impl Into<String>) -> Self {
        Self {
            line,
            name: name.into(),
        }
    }
}

impl BlockHandler for MacroBlock {
    fn kind(&self) -> BlockKind {
        BlockKind::Macro
    }

    fn line(&self) -> usize {
        self.line
    }

    fn open_block(&mut self, ctx: &mut ParseContext<'_>) {
        ctx.push_inside_body2(true);
        ctx.builder_mut().begin_capture();
    }

    fn close_block(self: Box<Self>, ctx: &mut ParseContext<'_>) -> Result<Token, ParseError> {
        ctx.pop_inside_body2();
        let children = ctx.builder_mut().end_capture();
        Ok(Token::Block(Block {
            kind: TokenBlockKind::Macro { name: self.name },
            line: self.line,
            children,
        }))
    }
}

/// A literal `{` inside a directive block. Closes back to literal text.
#[derive(Debug)]
pub struct LiteralBlock {
    line: usize,
}

impl LiteralBlock {
    pub fn new(line: usize) -> Self {
        Self { line }
    }
}

impl BlockHandler for LiteralBlock {
    fn kind(&self) -> BlockKind {
        BlockKind::Literal
    }

    fn line(&self) -> usize {
        self.line
    }

    fn close_block(self: Box<Self>, ctx: &mut ParseContext<'_>) -> Result<Token, ParseError> {
        Ok(ctx.literal("}"))
    }
}
