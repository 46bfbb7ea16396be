/*
 * code_type.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Code types: the embedded language active at a point in a template.
//!
//! The code type decides how expression output is escaped. An HTML
//! template switches to JS inside `<script>` and to CSS inside `<style>`.

use std::fmt;

/// Escaping applied to expression output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Escape {
    Raw,
    Html,
    Js,
    Css,
    Json,
    Xml,
    Csv,
}

impl Escape {
    pub fn as_str(self) -> &'static str {
        match self {
            Escape::Raw => "raw",
            Escape::Html => "html",
            Escape::Js => "js",
            Escape::Css => "css",
            Escape::Json => "json",
            Escape::Xml => "xml",
            Escape::Csv => "csv",
        }
    }
}

impl fmt::Display for Escape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeType {
    id: String,
    escape: Escape,
    /// Text that switches from a parent code type into this one, e.g. `<script`.
    block_start: Option<String>,
    /// Text that switches back to the parent, e.g. `</script`.
    block_end: Option<String>,
    /// Ids of code types that can be embedded in this one.
    embedded: Vec<String>,
}

impl CodeType {
    pub fn new(id: impl Into<String>, escape: Escape) -> Self {
        Self {
            id: id.into(),
            escape,
            block_start: None,
            block_end: None,
            embedded: Vec::new(),
        }
    }

    pub fn with_block(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.block_start = Some(start.into());
        self.block_end = Some(end.into());
        self
    }

    pub fn with_embedded(mut self, id: impl Into<String>) -> Self {
        self.embedded.push(id.into());
        self
    }

    pub fn html() -> Self {
        CodeType::new("html", Escape::Html)
            .with_embedded("js")
            .with_embedded("css")
    }

    pub fn js() -> Self {
        CodeType::new("js", Escape::Js).with_block("<script", "</script")
    }

    pub fn css() -> Self {
        CodeType::new("css", Escape::Css).with_block("<style", "</style")
    }

    pub fn json() -> Self {
        CodeType::new("json", Escape::Json)
    }

    pub fn xml() -> Self {
        CodeType::new("xml", Escape::Xml)
    }

    pub fn csv() -> Self {
        CodeType::new("csv", Escape::Csv)
    }

    pub fn raw() -> Self {
        CodeType::new("raw", Escape::Raw)
    }

    pub fn builtin() -> Vec<CodeType> {
        vec![
            CodeType::html(),
            CodeType::js(),
            CodeType::css(),
            CodeType::json(),
            CodeType::xml(),
            CodeType::csv(),
            CodeType::raw(),
        ]
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn escape(&self) -> Escape {
        self.escape
    }

    pub fn embedded(&self) -> &[String] {
        &self.embedded
    }

    /// Whether `text` starts with the switch into this code type.
    pub fn starts_block(&self, text: &str) -> bool {
        self.block_start
            .as_deref()
            .is_some_and(|start| starts_with_ignore_case(text, start))
    }

    /// Whether `text` starts with the switch back to the parent.
    pub fn ends_block(&self, text: &str) -> bool {
        self.block_end
            .as_deref()
            .is_some_and(|end| starts_with_ignore_case(text, end))
    }

    /// Whether this code type reacts to `<` in literal text.
    pub fn has_sensors(&self) -> bool {
        self.block_end.is_some() || !self.embedded.is_empty()
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}
