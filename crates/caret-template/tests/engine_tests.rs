/*
 * engine_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Dialect negotiation, the compile pipeline and engine configuration.
 */

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use caret_sandbox::SandboxError;
use caret_template::{
    BuildOutcome, ByteCodeEnhancer, CompileBackend, CompileError, Dialect, DialectFeature,
    DialectRegistry, DirectiveParser, Engine, EngineConfig, GenerateOptions, Grammar,
    ParseContext, ParseErrorKind, ParseResult, SandboxConfig, TemplateError, Token, UnitLookup,
    cache_key,
};
use common::body;
use pretty_assertions::assert_eq;

/// Backend that "compiles" a unit to its source bytes and counts calls.
#[derive(Default)]
struct CountingBackend {
    units: HashSet<String>,
    compiles: AtomicUsize,
}

impl CountingBackend {
    fn with_unit(name: &str) -> Self {
        Self {
            units: HashSet::from([name.to_string()]),
            ..Self::default()
        }
    }

    fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl UnitLookup for CountingBackend {
    fn has_unit(&self, name: &str) -> bool {
        self.units.contains(name)
    }
}

impl CompileBackend for CountingBackend {
    fn compile(&self, unit_name: &str, source: &str) -> Result<Vec<u8>, CompileError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        if source.contains("broken") {
            return Err(CompileError::new(unit_name, "cannot find symbol: broken"));
        }
        Ok(source.as_bytes().to_vec())
    }
}

struct Stamp;

impl ByteCodeEnhancer for Stamp {
    fn enhance(&self, _unit_name: &str, bytes: &[u8]) -> Result<Vec<u8>, CompileError> {
        let mut out = b"stamped:".to_vec();
        out.extend_from_slice(bytes);
        Ok(out)
    }
}

fn generate_with(engine: &Engine, source: &str, options: &GenerateOptions) -> BuildOutcome {
    engine.generate("test.html", source, options).unwrap()
}

#[test]
fn test_negotiation_prefers_restrictive_dialect() {
    let engine = common::engine();
    let plain = generate_with(&engine, "Hello @name", &GenerateOptions::default());
    assert_eq!(plain.into_generated().unwrap().dialect, "rythm-basic");

    let scripted = generate_with(&engine, "@{ int x = 1; }@x", &GenerateOptions::default());
    assert_eq!(scripted.into_generated().unwrap().dialect, "rythm");
}

#[test]
fn test_pinned_dialect_does_not_renegotiate() {
    let engine = common::engine();
    let err = engine
        .generate(
            "test.html",
            "@{ int x = 1; }",
            &GenerateOptions::with_dialect("rythm-basic"),
        )
        .unwrap_err();
    let TemplateError::Parse(err) = err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(
        err.kind,
        ParseErrorKind::Forbidden {
            feature: DialectFeature::Scripting
        }
    );
    assert_eq!(err.dialect, "rythm-basic");
    assert!(err.to_string().contains("Scripting block not allowed in current dialect"));
}

#[test]
fn test_required_dialect_from_config() {
    let engine = Engine::builder()
        .config(EngineConfig {
            required_dialect: Some("rythm".to_string()),
            ..EngineConfig::default()
        })
        .build()
        .unwrap();
    let generated = generate_with(&engine, "Hello @name", &GenerateOptions::default());
    assert_eq!(generated.into_generated().unwrap().dialect, "rythm");
}

#[test]
fn test_unknown_dialect() {
    let engine = common::engine();
    let err = engine
        .generate("t", "x", &GenerateOptions::with_dialect("velocity"))
        .unwrap_err();
    assert!(matches!(err, TemplateError::UnknownDialect(ref id) if id == "velocity"));

    let err = Engine::builder()
        .config(EngineConfig {
            required_dialect: Some("velocity".to_string()),
            ..EngineConfig::default()
        })
        .build()
        .unwrap_err();
    assert!(matches!(err, TemplateError::UnknownDialect(_)));
}

#[test]
fn test_empty_registry_is_internal_error() {
    let engine = Engine::builder()
        .dialects(DialectRegistry::new())
        .build()
        .unwrap();
    let err = engine
        .generate("t", "x", &GenerateOptions::default())
        .unwrap_err();
    assert!(matches!(err, TemplateError::Internal(_)));
}

#[test]
fn test_backtick_dialect() {
    let engine = common::engine();
    let generated = generate_with(
        &engine,
        "Hello `name and me@example.com",
        &GenerateOptions::with_dialect("japid"),
    )
    .into_generated()
    .unwrap();
    assert_eq!(
        body(&generated.source),
        vec![
            "p(\"Hello \");",
            "pe(name, \"html\");",
            "p(\" and me@example.com\");",
        ]
    );
}

#[test]
fn test_generation_is_deterministic() {
    let engine = common::engine();
    let source = "@for (s : items) {\n  @s\n} else {\n  none\n}\n";
    let first = generate_with(&engine, source, &GenerateOptions::default());
    let second = generate_with(&engine, source, &GenerateOptions::default());
    assert_eq!(first, second);
}

#[test]
fn test_concurrent_generation() {
    let engine = common::engine();
    let expected = generate_with(&engine, "@if (x) {@x}", &GenerateOptions::default());
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| generate_with(&engine, "@if (x) {@x}", &GenerateOptions::default()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_generated_class_layout() {
    let engine = common::engine();
    let generated = engine
        .generate(
            "greeting",
            "@args String name\nHello @name!",
            &GenerateOptions::default(),
        )
        .unwrap()
        .into_generated()
        .unwrap();
    insta::assert_snapshot!(generated.source, @r#"
    // Generated by caret from `greeting` (dialect: rythm). Do not edit.
    public class caret_greeting extends caret.TemplateBase {
        protected String name;

        @Override
        protected void build() {
            p("Hello "); //line: 2
            pe(name, "html"); //line: 2
            p("!"); //line: 2
        }
    }
    "#);
}

#[test]
fn test_compile_caches_by_content() {
    let backend = Arc::new(CountingBackend::default());
    let engine = Engine::builder().backend(backend.clone()).build().unwrap();
    let options = GenerateOptions::default();

    let first = engine
        .compile("test.html", "Hi @name", &options)
        .unwrap()
        .into_compiled()
        .unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.class_name, "caret_test_html");

    let second = engine
        .compile("test.html", "Hi @name", &options)
        .unwrap()
        .into_compiled()
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.bytes, first.bytes);
    assert_eq!(backend.compiles(), 1);

    // a changed template is a new unit
    engine.compile("test.html", "Bye @name", &options).unwrap();
    assert_eq!(backend.compiles(), 2);
}

#[test]
fn test_cache_key_is_content_addressed() {
    let engine = common::engine();
    let a = generate_with(&engine, "a", &GenerateOptions::default())
        .into_generated()
        .unwrap();
    let b = generate_with(&engine, "b", &GenerateOptions::default())
        .into_generated()
        .unwrap();
    let key = cache_key(&a);
    let digest = key.strip_prefix("caret_test_html:sha256:").unwrap();
    assert_eq!(digest.len(), 64);
    assert_ne!(key, cache_key(&b));
}

#[test]
fn test_enhancer_rewrites_bytes_before_caching() {
    let engine = Engine::builder()
        .backend(Arc::new(CountingBackend::default()))
        .enhancer(Arc::new(Stamp))
        .build()
        .unwrap();
    let compiled = engine
        .compile("test.html", "x", &GenerateOptions::default())
        .unwrap()
        .into_compiled()
        .unwrap();
    assert!(compiled.bytes.starts_with(b"stamped:"));

    let cached = engine
        .compile("test.html", "x", &GenerateOptions::default())
        .unwrap()
        .into_compiled()
        .unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.bytes, compiled.bytes);
}

#[test]
fn test_compile_error_is_not_cached() {
    let backend = Arc::new(CountingBackend::default());
    let engine = Engine::builder().backend(backend.clone()).build().unwrap();
    for _ in 0..2 {
        let err = engine
            .compile("test.html", "@broken", &GenerateOptions::default())
            .unwrap_err();
        assert!(matches!(err, TemplateError::Compile(_)));
    }
    assert_eq!(backend.compiles(), 2);
}

#[test]
fn test_compile_without_backend() {
    let err = common::engine()
        .compile("test.html", "x", &GenerateOptions::default())
        .unwrap_err();
    assert!(matches!(err, TemplateError::Internal(_)));
}

#[test]
fn test_sandboxed_compile_rejects_restricted_names() {
    let engine = Engine::builder()
        .config(EngineConfig {
            sandbox: SandboxConfig {
                restricted_names: vec!["System.exit".to_string()],
            },
            ..EngineConfig::default()
        })
        .backend(Arc::new(CountingBackend::default()))
        .build()
        .unwrap();
    let source = "@{ System.exit(0); }";

    let sandboxed = GenerateOptions {
        sandboxed: true,
        ..GenerateOptions::default()
    };
    let err = engine.compile("test.html", source, &sandboxed).unwrap_err();
    assert!(matches!(
        err,
        TemplateError::Sandbox(SandboxError::RestrictedAccess { ref name }) if name == "System.exit"
    ));

    let compiled = engine
        .compile("test.html", source, &GenerateOptions::default())
        .unwrap();
    assert!(compiled.into_compiled().is_some());
}

#[test]
fn test_exit_if_no_class() {
    let source = "@__exitIfNoClass__(app.Models)\nHello";

    // no backend: nothing is known
    let outcome = generate_with(&common::engine(), source, &GenerateOptions::default());
    assert_eq!(outcome, BuildOutcome::Skipped);

    let engine = Engine::builder()
        .backend(Arc::new(CountingBackend::with_unit("app.Models")))
        .build()
        .unwrap();
    let outcome = generate_with(&engine, source, &GenerateOptions::default());
    assert!(outcome.into_generated().is_some());

    let engine = Engine::builder()
        .backend(Arc::new(CountingBackend::with_unit("other.Unit")))
        .build()
        .unwrap();
    let compiled = engine
        .compile("test.html", source, &GenerateOptions::default())
        .unwrap();
    assert!(compiled.into_compiled().is_none());
}

/// `@now` emits a call to the runtime clock.
struct NowParser;

impl DirectiveParser for NowParser {
    fn name(&self) -> &'static str {
        "now"
    }

    fn parse(&self, ctx: &mut ParseContext<'_>) -> ParseResult<Option<Vec<Token>>> {
        if !ctx.remain().starts_with("@now") {
            return Ok(None);
        }
        let token = Token::code("p(__now());", ctx.current_line());
        ctx.step(4);
        Ok(Some(vec![token]))
    }
}

#[test]
fn test_custom_parser_runs_first() {
    let dialect = Dialect::builder("custom", '@')
        .parser_first(|_: &Grammar| -> Result<Box<dyn DirectiveParser>, regex::Error> {
            Ok(Box::new(NowParser))
        })
        .build()
        .unwrap();
    assert_eq!(dialect.parser_names().first(), Some(&"now"));

    let mut registry = DialectRegistry::new();
    registry.register(dialect);
    let engine = Engine::builder().dialects(registry).build().unwrap();
    let generated = generate_with(&engine, "a @now b", &GenerateOptions::default())
        .into_generated()
        .unwrap();
    assert_eq!(
        body(&generated.source),
        vec!["p(\"a \");", "p(__now());", "p(\" b\");"]
    );

    // without the parser, `@now` is an expression
    assert_eq!(common::statements("@now"), vec!["pe(now, \"html\");"]);
}
