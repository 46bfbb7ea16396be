/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine-wide configuration.
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! compact-mode = true
//! natural-template = false
//! default-code-type = "html"
//! required-dialect = "rythm"
//! class-name-prefix = "caret_"
//! cache-ttl = 3600
//!
//! [sandbox]
//! restricted-names = ["System.exit", "Runtime"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid engine configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Compact mode used when no `@compact`/`@nocompact` block is open.
    pub compact_mode: bool,
    /// Recognize directives hidden in HTML comments (`<!-- @if(x) { -->`).
    pub natural_template: bool,
    /// Code type a template starts in.
    pub default_code_type: String,
    /// Pin every parse to one dialect, disabling renegotiation.
    pub required_dialect: Option<String>,
    /// Prefix for generated class names.
    pub class_name_prefix: String,
    /// TTL in seconds for compiled units. 0 uses the cache default, negative never expires.
    pub cache_ttl: i64,
    pub sandbox: SandboxConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compact_mode: false,
            natural_template: false,
            default_code_type: "html".to_string(),
            required_dialect: None,
            class_name_prefix: "caret_".to_string(),
            cache_ttl: 0,
            sandbox: SandboxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SandboxConfig {
    /// Names generated code may not reference when compiled for a sandboxed render.
    pub restricted_names: Vec<String>,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Generated class name for a template id.
    ///
    /// Characters that cannot appear in an identifier become `_`.
    pub fn class_name_for(&self, template_id: &str) -> String {
        let mut name = self.class_name_prefix.clone();
        if name.is_empty() && template_id.starts_with(|c: char| c.is_ascii_digit()) {
            name.push('_');
        }
        name.extend(template_id.chars().map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        }));
        name
    }
}
