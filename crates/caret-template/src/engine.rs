/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The template engine: dialect negotiation, source generation and the
//! compile-and-cache pipeline.
//!
//! An [`Engine`] is configured once through [`EngineBuilder`] and then
//! shared. Every call to [`Engine::generate`] or [`Engine::compile`] owns
//! its own parse context, so concurrent calls do not interact.

use std::fmt;
use std::sync::Arc;

use caret_sandbox::{SandboxError, find_restricted};
use sha2::{Digest, Sha256};

use crate::backend::{ByteCodeEnhancer, CompileBackend, NoEnhancement, UnitLookup};
use crate::cache::{CacheService, SimpleCacheService};
use crate::config::EngineConfig;
use crate::context::{ParseContext, ParseEnv};
use crate::dialect::{Dialect, DialectRegistry};
use crate::error::{ParseSignal, TemplateError, TemplateResult};
use crate::extension::ExtensionRegistry;
use crate::tokenizer::run_pass;

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Parse with this dialect only. Overrides `required-dialect`.
    pub dialect: Option<String>,
    /// Scan the generated source for restricted names before compiling.
    pub sandboxed: bool,
}

impl GenerateOptions {
    pub fn with_dialect(dialect: impl Into<String>) -> Self {
        Self {
            dialect: Some(dialect.into()),
            ..Self::default()
        }
    }
}

/// Generated source for one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub class_name: String,
    /// Id of the dialect the template was parsed with.
    pub dialect: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Generated(Generated),
    /// The template ended the pass with `@__exitIfNoClass__`.
    Skipped,
}

impl BuildOutcome {
    pub fn into_generated(self) -> Option<Generated> {
        match self {
            BuildOutcome::Generated(generated) => Some(generated),
            BuildOutcome::Skipped => None,
        }
    }
}

/// A compiled unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub class_name: String,
    pub bytes: Vec<u8>,
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Compiled(Compiled),
    Skipped,
}

impl CompileOutcome {
    pub fn into_compiled(self) -> Option<Compiled> {
        match self {
            CompileOutcome::Compiled(compiled) => Some(compiled),
            CompileOutcome::Skipped => None,
        }
    }
}

/// Lends a backend to the parser as a unit lookup.
struct BackendUnits<'b>(&'b dyn CompileBackend);

impl UnitLookup for BackendUnits<'_> {
    fn has_unit(&self, name: &str) -> bool {
        self.0.has_unit(name)
    }
}

/// Cache key of a generated unit: class name plus a digest of its source.
pub fn cache_key(generated: &Generated) -> String {
    format!(
        "{}:sha256:{:x}",
        generated.class_name,
        Sha256::digest(generated.source.as_bytes())
    )
}

pub struct Engine {
    config: EngineConfig,
    dialects: Arc<DialectRegistry>,
    extensions: Arc<ExtensionRegistry>,
    cache: Arc<dyn CacheService>,
    backend: Option<Arc<dyn CompileBackend>>,
    enhancer: Arc<dyn ByteCodeEnhancer>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("dialects", &self.dialects.ids())
            .field("backend", &self.backend.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dialects(&self) -> &DialectRegistry {
        &self.dialects
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn cache(&self) -> &Arc<dyn CacheService> {
        &self.cache
    }

    /// Dialects to try, in order.
    ///
    /// A pinned dialect is the only candidate. Otherwise the negotiation
    /// order of the registry applies.
    fn candidates(&self, pinned: Option<&str>) -> TemplateResult<Vec<Arc<Dialect>>> {
        match pinned {
            Some(id) => self
                .dialects
                .get(id)
                .map(|dialect| vec![dialect])
                .ok_or_else(|| TemplateError::UnknownDialect(id.to_string())),
            None => {
                let order = self.dialects.negotiation_order();
                if order.is_empty() {
                    return Err(TemplateError::Internal("no dialect registered".to_string()));
                }
                Ok(order)
            }
        }
    }

    /// Parse `source` and emit the generated class.
    ///
    /// Without a pinned dialect, a pass that fails only because the dialect
    /// forbids a construct restarts from the beginning under the next
    /// dialect. The last candidate's error is returned as is.
    pub fn generate(
        &self,
        template_id: &str,
        source: &str,
        options: &GenerateOptions,
    ) -> TemplateResult<BuildOutcome> {
        let pinned = options
            .dialect
            .as_deref()
            .or(self.config.required_dialect.as_deref());
        let candidates = self.candidates(pinned)?;
        let class_name = self.config.class_name_for(template_id);

        let units = self.backend.as_deref().map(BackendUnits);
        let env = ParseEnv {
            config: &self.config,
            extensions: &self.extensions,
            units: units.as_ref().map(|units| units as &dyn UnitLookup),
        };

        let mut ctx = ParseContext::new(
            template_id,
            source,
            &class_name,
            Arc::clone(&candidates[0]),
            env,
        );
        for (i, dialect) in candidates.iter().enumerate() {
            if i > 0 {
                ctx.reset(Arc::clone(dialect));
            }
            match run_pass(&mut ctx) {
                Ok(()) => {
                    let source = ctx.builder().build(dialect.id(), &self.extensions)?;
                    tracing::info!(template_id, dialect = dialect.id(), %class_name, "generated template");
                    return Ok(BuildOutcome::Generated(Generated {
                        class_name,
                        dialect: dialect.id().to_string(),
                        source,
                    }));
                }
                Err(ParseSignal::Exit) => {
                    tracing::debug!(template_id, "template exited early, build skipped");
                    return Ok(BuildOutcome::Skipped);
                }
                Err(ParseSignal::Error(err))
                    if pinned.is_none() && err.is_rewindable() && i + 1 < candidates.len() =>
                {
                    tracing::debug!(
                        template_id,
                        dialect = dialect.id(),
                        next = candidates[i + 1].id(),
                        error = %err.kind,
                        "renegotiating dialect"
                    );
                }
                Err(ParseSignal::Error(err)) => return Err(err.into()),
            }
        }
        Err(TemplateError::Internal(format!(
            "no dialect accepted template {template_id}"
        )))
    }

    /// Generate, compile, enhance and cache `source`.
    ///
    /// Units are cached by content, so an unchanged template compiles once.
    pub fn compile(
        &self,
        template_id: &str,
        source: &str,
        options: &GenerateOptions,
    ) -> TemplateResult<CompileOutcome> {
        let Some(generated) = self.generate(template_id, source, options)?.into_generated() else {
            return Ok(CompileOutcome::Skipped);
        };

        if options.sandboxed {
            if let Some(name) =
                find_restricted(&generated.source, &self.config.sandbox.restricted_names)
            {
                return Err(SandboxError::RestrictedAccess {
                    name: name.to_string(),
                }
                .into());
            }
        }

        let key = cache_key(&generated);
        if let Some(bytes) = self.cache.get(&key) {
            tracing::trace!(%key, "compiled unit cache hit");
            return Ok(CompileOutcome::Compiled(Compiled {
                class_name: generated.class_name,
                bytes,
                from_cache: true,
            }));
        }
        tracing::trace!(%key, "compiled unit cache miss");

        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| TemplateError::Internal("no compile backend configured".to_string()))?;
        let bytes = backend.compile(&generated.class_name, &generated.source)?;
        let enhanced = self.enhancer.enhance(&generated.class_name, &bytes)?;
        let bytes = if enhanced.is_empty() { bytes } else { enhanced };
        self.cache.put(&key, bytes.clone(), self.config.cache_ttl);

        Ok(CompileOutcome::Compiled(Compiled {
            class_name: generated.class_name,
            bytes,
            from_cache: false,
        }))
    }
}

/// Configures an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    dialects: Option<DialectRegistry>,
    extensions: Option<ExtensionRegistry>,
    cache: Option<Arc<dyn CacheService>>,
    backend: Option<Arc<dyn CompileBackend>>,
    enhancer: Option<Arc<dyn ByteCodeEnhancer>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the built-in dialects.
    pub fn dialects(mut self, dialects: DialectRegistry) -> Self {
        self.dialects = Some(dialects);
        self
    }

    /// Replace the default extensions.
    pub fn extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheService>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CompileBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn enhancer(mut self, enhancer: Arc<dyn ByteCodeEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn build(self) -> TemplateResult<Engine> {
        let dialects = match self.dialects {
            Some(dialects) => dialects,
            None => DialectRegistry::with_builtin()?,
        };
        if let Some(required) = &self.config.required_dialect {
            if dialects.get(required).is_none() {
                return Err(TemplateError::UnknownDialect(required.clone()));
            }
        }
        let extensions = match self.extensions {
            Some(extensions) => extensions,
            None => ExtensionRegistry::new().map_err(|err| TemplateError::Internal(err.to_string()))?,
        };
        Ok(Engine {
            config: self.config,
            dialects: Arc::new(dialects),
            extensions: Arc::new(extensions),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(SimpleCacheService::new())),
            backend: self.backend,
            enhancer: self.enhancer.unwrap_or_else(|| Arc::new(NoEnhancement)),
        })
    }
}
