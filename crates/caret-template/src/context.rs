/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The parse context: cursor and nested parse-time state shared by the
//! directive parsers during one parse pass.
//!
//! Each kind of state has its own LIFO stack. Peeking an empty stack
//! returns a fixed default: the engine-wide compact mode for the compact
//! stack, the configured default code type for the code-type stack, and
//! `false`/`None` for everything else.

use std::sync::Arc;

use crate::backend::UnitLookup;
use crate::block::{BlockHandler, BlockKind};
use crate::builder::CodeBuilder;
use crate::code_type::{CodeType, Escape};
use crate::config::EngineConfig;
use crate::dialect::{Dialect, DialectFeature};
use crate::error::{ParseError, ParseErrorKind};
use crate::extension::ExtensionRegistry;
use crate::source::line_col;
use crate::token::{Literal, Token};

/// Read-only collaborators available to every parse.
#[derive(Clone, Copy)]
pub struct ParseEnv<'a> {
    pub config: &'a EngineConfig,
    pub extensions: &'a ExtensionRegistry,
    pub units: Option<&'a dyn UnitLookup>,
}

/// One level of embedded-language nesting.
#[derive(Debug, Clone)]
pub struct CodeTypeFrame {
    pub code_type: Arc<CodeType>,
    parent: Option<Arc<CodeType>>,
}

impl CodeTypeFrame {
    pub fn parent(&self) -> Option<&Arc<CodeType>> {
        self.parent.as_ref()
    }
}

pub struct ParseContext<'a> {
    env: ParseEnv<'a>,
    template_id: &'a str,
    source: &'a str,
    dialect: Arc<Dialect>,
    default_code_type: Arc<CodeType>,
    cursor: usize,
    line: usize,
    builder: CodeBuilder,
    blocks: Vec<Box<dyn BlockHandler>>,
    breaks: Vec<Option<String>>,
    continues: Vec<Option<String>>,
    code_types: Vec<CodeTypeFrame>,
    compact: Vec<bool>,
    locales: Vec<String>,
    inside_body: Vec<bool>,
    inside_body2: Vec<bool>,
    inside_directive_comment: bool,
    loop_counter: usize,
}

impl<'a> ParseContext<'a> {
    pub fn new(
        template_id: &'a str,
        source: &'a str,
        class_name: &str,
        dialect: Arc<Dialect>,
        env: ParseEnv<'a>,
    ) -> Self {
        let default_code_type = env
            .extensions
            .code_type(&env.config.default_code_type)
            .unwrap_or_else(|| Arc::new(CodeType::raw()));
        Self {
            env,
            template_id,
            source,
            dialect,
            default_code_type,
            cursor: 0,
            line: 1,
            builder: CodeBuilder::new(template_id, class_name),
            blocks: Vec::new(),
            breaks: Vec::new(),
            continues: Vec::new(),
            code_types: Vec::new(),
            compact: Vec::new(),
            locales: Vec::new(),
            inside_body: Vec::new(),
            inside_body2: Vec::new(),
            inside_directive_comment: false,
            loop_counter: 0,
        }
    }

    /// Clear all state and rewind to the start of the source under `dialect`.
    pub fn reset(&mut self, dialect: Arc<Dialect>) {
        self.dialect = dialect;
        self.cursor = 0;
        self.line = 1;
        self.builder.rewind();
        self.blocks.clear();
        self.breaks.clear();
        self.continues.clear();
        self.code_types.clear();
        self.compact.clear();
        self.locales.clear();
        self.inside_body.clear();
        self.inside_body2.clear();
        self.inside_directive_comment = false;
        self.loop_counter = 0;
    }

    pub fn template_id(&self) -> &'a str {
        self.template_id
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn dialect(&self) -> &Arc<Dialect> {
        &self.dialect
    }

    pub fn marker(&self) -> char {
        self.dialect.marker()
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.env.config
    }

    pub fn extensions(&self) -> &'a ExtensionRegistry {
        self.env.extensions
    }

    pub fn units(&self) -> Option<&'a dyn UnitLookup> {
        self.env.units
    }

    // ---- cursor ----------------------------------------------------------

    /// Byte offset of the cursor.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Unconsumed source.
    pub fn remain(&self) -> &'a str {
        &self.source[self.cursor..]
    }

    pub fn has_remain(&self) -> bool {
        self.cursor < self.source.len()
    }

    /// Whether the cursor is at the start of a line.
    pub fn at_line_start(&self) -> bool {
        self.cursor == 0 || self.source[..self.cursor].ends_with('\n')
    }

    /// Move the cursor forward by `len` bytes.
    pub fn step(&mut self, len: usize) {
        let end = (self.cursor + len).min(self.source.len());
        debug_assert!(self.source.is_char_boundary(end));
        self.line += self.source.as_bytes()[self.cursor..end]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        self.cursor = end;
    }

    /// 1-based line of the cursor.
    pub fn current_line(&self) -> usize {
        self.line
    }

    /// 1-based column of the cursor.
    pub fn current_column(&self) -> usize {
        line_col(self.source, self.cursor).1
    }

    // ---- errors ----------------------------------------------------------

    /// An error located at the cursor.
    pub fn error(&self, kind: ParseErrorKind) -> ParseError {
        self.error_at(kind, self.cursor)
    }

    /// An error located at byte offset `offset`.
    pub fn error_at(&self, kind: ParseErrorKind, offset: usize) -> ParseError {
        let (line, column) = line_col(self.source, offset);
        ParseError {
            template_id: self.template_id.to_string(),
            dialect: self.dialect.id().to_string(),
            line,
            column: Some(column),
            kind,
        }
    }

    /// Fail with a rewindable error unless the dialect allows `feature`.
    pub fn require(&self, feature: DialectFeature, offset: usize) -> Result<(), ParseError> {
        if self.dialect.allows(feature) {
            Ok(())
        } else {
            Err(self.error_at(ParseErrorKind::Forbidden { feature }, offset))
        }
    }

    // ---- builder ---------------------------------------------------------

    pub fn builder(&self) -> &CodeBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut CodeBuilder {
        &mut self.builder
    }

    pub fn into_builder(self) -> CodeBuilder {
        self.builder
    }

    /// A literal token at the cursor line, honoring the compact stack.
    pub fn literal(&self, text: impl Into<String>) -> Token {
        Token::Literal(Literal {
            text: text.into(),
            line: self.line,
            compact: self.peek_compact(),
        })
    }

    /// Sequential loop number, unique within one pass.
    pub fn next_loop_id(&mut self) -> usize {
        self.loop_counter += 1;
        self.loop_counter
    }

    // ---- blocks ----------------------------------------------------------

    pub fn open_block(&mut self, mut handler: Box<dyn BlockHandler>) {
        handler.open_block(self);
        self.blocks.push(handler);
    }

    /// Pop the innermost block and return its closing token.
    pub fn close_block(&mut self) -> Result<Token, ParseError> {
        match self.blocks.pop() {
            Some(handler) => handler.close_block(self),
            None => Err(self.error(ParseErrorKind::UnmatchedClose)),
        }
    }

    pub fn current_block(&self) -> Option<BlockKind> {
        self.blocks.last().map(|b| b.kind())
    }

    pub fn has_open_block(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Kind and opening line of the innermost open block.
    pub fn unclosed_block(&self) -> Option<(BlockKind, usize)> {
        self.blocks.last().map(|b| (b.kind(), b.line()))
    }

    // ---- loop control ----------------------------------------------------

    /// Push the `break` statement of a loop, or `None` to hide outer loops.
    pub fn push_break(&mut self, statement: Option<String>) {
        self.breaks.push(statement);
    }

    pub fn peek_break(&self) -> Option<&str> {
        self.breaks.last().and_then(|s| s.as_deref())
    }

    pub fn pop_break(&mut self) -> Option<String> {
        self.breaks.pop().flatten()
    }

    pub fn push_continue(&mut self, statement: Option<String>) {
        self.continues.push(statement);
    }

    pub fn peek_continue(&self) -> Option<&str> {
        self.continues.last().and_then(|s| s.as_deref())
    }

    pub fn pop_continue(&mut self) -> Option<String> {
        self.continues.pop().flatten()
    }

    // ---- code types ------------------------------------------------------

    pub fn push_code_type(&mut self, code_type: Arc<CodeType>) {
        let parent = Some(self.code_type());
        self.code_types.push(CodeTypeFrame { code_type, parent });
    }

    pub fn peek_code_type(&self) -> Option<&CodeTypeFrame> {
        self.code_types.last()
    }

    /// Pop the innermost code-type frame, detaching it from its parent first.
    pub fn pop_code_type(&mut self) -> Option<CodeTypeFrame> {
        if let Some(top) = self.code_types.last_mut() {
            top.parent = None;
        }
        self.code_types.pop()
    }

    /// The active code type.
    pub fn code_type(&self) -> Arc<CodeType> {
        self.code_types
            .last()
            .map(|frame| frame.code_type.clone())
            .unwrap_or_else(|| self.default_code_type.clone())
    }

    pub fn escape(&self) -> Escape {
        self.code_types
            .last()
            .map(|frame| frame.code_type.escape())
            .unwrap_or_else(|| self.default_code_type.escape())
    }

    // ---- compact mode ----------------------------------------------------

    pub fn push_compact(&mut self, compact: bool) {
        self.compact.push(compact);
    }

    pub fn peek_compact(&self) -> bool {
        self.compact
            .last()
            .copied()
            .unwrap_or(self.env.config.compact_mode)
    }

    pub fn pop_compact(&mut self) -> Option<bool> {
        self.compact.pop()
    }

    // ---- locales ---------------------------------------------------------

    pub fn push_locale(&mut self, locale: String) {
        self.locales.push(locale);
    }

    pub fn peek_locale(&self) -> Option<&str> {
        self.locales.last().map(String::as_str)
    }

    pub fn pop_locale(&mut self) -> Option<String> {
        self.locales.pop()
    }

    // ---- body nesting ----------------------------------------------------

    /// Inside the body of an invoked tag.
    pub fn push_inside_body(&mut self, inside: bool) {
        self.inside_body.push(inside);
    }

    pub fn peek_inside_body(&self) -> bool {
        self.inside_body.last().copied().unwrap_or(false)
    }

    pub fn pop_inside_body(&mut self) -> Option<bool> {
        self.inside_body.pop()
    }

    /// Inside a macro definition.
    pub fn push_inside_body2(&mut self, inside: bool) {
        self.inside_body2.push(inside);
    }

    pub fn peek_inside_body2(&self) -> bool {
        self.inside_body2.last().copied().unwrap_or(false)
    }

    pub fn pop_inside_body2(&mut self) -> Option<bool> {
        self.inside_body2.pop()
    }

    // ---- directive comments ----------------------------------------------

    pub fn inside_directive_comment(&self) -> bool {
        self.inside_directive_comment
    }

    pub fn set_inside_directive_comment(&mut self, inside: bool) {
        self.inside_directive_comment = inside;
    }
}
