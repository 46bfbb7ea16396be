/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template parsing, building and compilation.

use std::fmt;

use thiserror::Error;

use crate::backend::CompileError;
use crate::dialect::DialectFeature;
use crate::source::line_col_to_char_offset;

/// Top-level error for engine operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template could not be parsed or built.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The compilation backend rejected the generated source.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The sandbox refused the generated unit.
    #[error(transparent)]
    Sandbox(#[from] caret_sandbox::SandboxError),

    /// A dialect id that is not registered.
    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    /// A dialect whose keyword grammar does not compile.
    #[error("Invalid grammar for dialect '{dialect}': {message}")]
    Grammar { dialect: String, message: String },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// The engine was asked for something it is not wired to do.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for engine operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// What went wrong while parsing or building a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Malformed directive grammar.
    #[error("{message}")]
    Syntax {
        message: String,
        hint: Option<String>,
    },

    /// `break`/`continue` with no enclosing loop.
    #[error("Bad {marker}{directive} statement: No loop context")]
    NoLoopContext { directive: String, marker: char },

    /// A block close with no open block.
    #[error("No open block found")]
    UnmatchedClose,

    /// Input ended while a block was still open.
    #[error("Unclosed {block} block opened at line {line}")]
    UnclosedBlock { block: String, line: usize },

    /// Macro invoked but never defined in the template.
    #[error("Cannot find macro definition for \"{name}\"")]
    UndefinedMacro { name: String },

    /// Macro defined twice in one template.
    #[error("Macro \"{name}\" is already defined at line {first_line}")]
    MacroRedefined { name: String, first_line: usize },

    /// Macro whose expansion reaches itself.
    #[error("Recursive expansion of macro \"{name}\"")]
    RecursiveMacro { name: String },

    /// A construct the active dialect does not allow.
    #[error("{feature} not allowed in current dialect")]
    Forbidden { feature: DialectFeature },

    /// The marker is not followed by anything a parser recognizes.
    #[error("Unrecognized directive after '{marker}'")]
    UnknownDirective { marker: char },

    /// Parser contract violation.
    #[error("Internal parser error: {0}")]
    Internal(String),
}

impl ParseErrorKind {
    /// Create a syntax error with a usage hint.
    pub fn syntax(message: impl Into<String>, hint: impl Into<String>) -> Self {
        ParseErrorKind::Syntax {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Whether a pass failing with this error may restart under another dialect.
    pub fn is_rewindable(&self) -> bool {
        matches!(self, ParseErrorKind::Forbidden { .. })
    }

    /// The usage hint, if any.
    pub fn hint(&self) -> Option<String> {
        match self {
            ParseErrorKind::Syntax { hint, .. } => hint.clone(),
            ParseErrorKind::UnknownDirective { marker } => Some(format!(
                "use \"{marker}{marker}\" to output a literal '{marker}'"
            )),
            _ => None,
        }
    }
}

/// A parse or build error located in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub template_id: String,
    pub dialect: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, when the position within the line is known.
    pub column: Option<usize>,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn is_rewindable(&self) -> bool {
        self.kind.is_rewindable()
    }

    /// Render the error against the template source with ariadne.
    ///
    /// Output is uncolored so it can be written to logs and compared in tests.
    pub fn render(&self, source: &str) -> String {
        use ariadne::{Color, Config, Label, Report, ReportKind, Source};

        let offset = line_col_to_char_offset(source, self.line, self.column.unwrap_or(1));
        let end = (offset + 1).min(source.chars().count()).max(offset);
        let path = self.template_id.clone();

        let mut report = Report::build(ReportKind::Error, path.clone(), offset)
            .with_config(Config::default().with_color(false))
            .with_message(format!("{} [dialect: {}]", self.kind, self.dialect))
            .with_label(
                Label::new((path.clone(), offset..end))
                    .with_message(self.kind.to_string())
                    .with_color(Color::Red),
            );
        if let Some(hint) = self.kind.hint() {
            report = report.with_help(hint);
        }

        let mut output = Vec::new();
        match report
            .finish()
            .write((path, Source::from(source)), &mut output)
        {
            Ok(()) => String::from_utf8_lossy(&output).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.template_id, self.line)?;
        if let Some(column) = self.column {
            write!(f, ":{column}")?;
        }
        write!(f, ": {} [dialect: {}]", self.kind, self.dialect)?;
        if let Some(hint) = self.kind.hint() {
            write!(f, ". {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Why a parse pass stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSignal {
    /// The template asked to end the pass. Not an error: the build is skipped.
    Exit,
    Error(ParseError),
}

impl From<ParseError> for ParseSignal {
    fn from(err: ParseError) -> Self {
        ParseSignal::Error(err)
    }
}

/// Result type used by parsers and the tokenizer.
pub type ParseResult<T> = Result<T, ParseSignal>;
