/*
 * token.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tokens produced by the tokenizer and consumed by the code builder.
//!
//! Each token records the 1-based source line it came from. Tokens are
//! appended once to the build sequence and emitted once (macro bodies are
//! emitted once per expansion).

use crate::code_type::Escape;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Template text copied to the output.
    Literal(Literal),
    /// A fragment of generated code.
    Code(Code),
    /// An output expression.
    Expr(Expr),
    /// An if/else-if ladder of guarded statements.
    Conditional(Conditional),
    /// A macro expansion, resolved at build time.
    MacroCall(MacroCall),
    /// A token that owns children, such as a macro definition.
    Block(Block),
}

impl Token {
    pub fn literal(text: impl Into<String>, line: usize) -> Token {
        Token::Literal(Literal {
            text: text.into(),
            line,
            compact: false,
        })
    }

    pub fn code(code: impl Into<String>, line: usize) -> Token {
        Token::Code(Code::new(code, line))
    }

    pub fn line(&self) -> usize {
        match self {
            Token::Literal(t) => t.line,
            Token::Code(t) => t.line,
            Token::Expr(t) => t.line,
            Token::Conditional(t) => t.line,
            Token::MacroCall(t) => t.line,
            Token::Block(t) => t.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub text: String,
    pub line: usize,
    /// Whether the text is compacted on output.
    pub compact: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub code: String,
    pub line: usize,
    /// Drop the line break that starts the next literal.
    pub remove_next_line_break: bool,
}

impl Code {
    pub fn new(code: impl Into<String>, line: usize) -> Self {
        Self {
            code: code.into(),
            line,
            remove_next_line_break: false,
        }
    }

    /// An empty fragment whose only effect is eating the next line break.
    pub fn line_break_eater(line: usize) -> Self {
        Self {
            code: String::new(),
            line,
            remove_next_line_break: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub expr: String,
    pub escape: Escape,
    pub line: usize,
}

/// One `(condition, action)` pair of a ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub condition: String,
    pub action: String,
}

/// Guarded statements compiled to `if (..) {..} else if (..) {..}`.
///
/// Branches are emitted in the order given; the first one becomes the
/// `if`, the rest `else if`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditional {
    pub branches: Vec<Branch>,
    pub line: usize,
}

impl Conditional {
    /// A single guarded statement.
    pub fn guard(line: usize, condition: impl Into<String>, action: impl Into<String>) -> Self {
        Self::ladder(line, [(condition.into(), action.into())])
    }

    pub fn ladder(line: usize, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            branches: pairs
                .into_iter()
                .map(|(condition, action)| Branch { condition, action })
                .collect(),
            line,
        }
    }

    /// Generated lines, one per branch.
    pub fn to_lines(&self) -> Vec<String> {
        self.branches
            .iter()
            .enumerate()
            .map(|(i, branch)| {
                let keyword = if i == 0 { "if" } else { "else if" };
                format!(
                    "{keyword} (__eval({})) {{{}}}",
                    branch.condition, branch.action
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroCall {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// `@macro("name") { ... }`: children are recorded, not emitted in place.
    Macro { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub line: usize,
    pub children: Vec<Token>,
}
