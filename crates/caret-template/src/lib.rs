/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template-to-source compiler for directive-based templates.
//!
//! A template is plain text with directives introduced by a marker
//! character (`@` by default):
//!
//! - Expressions: `@user.name`, `@(a + b)`
//! - Loops: `@for (item : items) { ... } else { ... }`, `@break`, `@continueIf(x)`
//! - Conditionals: `@if (x) { ... } else if (y) { ... }`, `@returnIf(x)`
//! - Macros: `@macro("name") { ... }` and `@exec("name")`
//! - Tags: `@invoke("tag", args) { body }`
//! - Output shaping: `@compact`, `@nocompact`, `@verbatim`, `@assign`
//! - Comments: `@// line` and `@** block *@`
//!
//! # Architecture
//!
//! Parsing is driven by a [`Dialect`]: a marker, keyword spellings, a set
//! of allowed features and an ordered list of [`DirectiveParser`]s. The
//! [`tokenizer`] runs those parsers over the source and appends their
//! [`Token`]s to a [`CodeBuilder`], which emits one generated class. The
//! [`Engine`] negotiates the dialect, builds, and hands the result to a
//! [`CompileBackend`] with a content-addressed cache in front.
//!
//! # Example
//!
//! ```
//! use caret_template::{Engine, GenerateOptions};
//!
//! let engine = Engine::builder().build().unwrap();
//! let generated = engine
//!     .generate("hello", "Hello @name!", &GenerateOptions::default())
//!     .unwrap()
//!     .into_generated()
//!     .unwrap();
//! assert_eq!(generated.class_name, "caret_hello");
//! assert!(generated.source.contains("pe(name, \"html\");"));
//! ```

pub mod backend;
pub mod block;
pub mod builder;
pub mod cache;
pub mod code_type;
pub mod config;
pub mod context;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod extension;
pub mod parser;
pub mod source;
pub mod token;
pub mod tokenizer;

// Re-export main types at crate root
pub use backend::{ByteCodeEnhancer, CompileBackend, CompileError, NoEnhancement, UnitLookup};
pub use builder::{CodeBuilder, RenderArg, TEMPLATE_BASE};
pub use cache::{CacheService, SimpleCacheService};
pub use code_type::{CodeType, Escape};
pub use config::{ConfigError, EngineConfig, SandboxConfig};
pub use context::{ParseContext, ParseEnv};
pub use dialect::{Dialect, DialectBuilder, DialectFeature, DialectRegistry, Features, Grammar, Keyword};
pub use engine::{
    BuildOutcome, CompileOutcome, Compiled, Engine, EngineBuilder, GenerateOptions, Generated,
    cache_key,
};
pub use error::{ParseError, ParseErrorKind, ParseResult, ParseSignal, TemplateError, TemplateResult};
pub use extension::{ExpressionProcessor, ExtensionRegistry, Formatter, MethodExtension};
pub use parser::{DirectiveParser, ParserFactory};
pub use token::Token;
