#![allow(dead_code)]

use std::any::Any;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kopi_core::{CompletionItem, CompletionItemKind, CompletionList, Diagnostic, Span};
use kopi_engine::{
    AnalysisEngine, Classpath, CompileError, CompileOutput, CompiledSnapshot, Compiler,
    CompletionContext, CompletionProvider, EngineConfig, SemanticModel,
};
use kopi_scheduler::{CancellationToken, Scheduler};

pub const KEYWORDS: &[&str] = &["print", "println", "private", "public"];
pub const MEMBERS: &[&str] = &["length", "chars", "isEmpty"];

#[derive(Debug)]
pub struct TextModel(pub String);

impl SemanticModel for TextModel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Produces a `TextModel` per compile and one diagnostic per `err(` call in
/// the text; `#fatal` anywhere makes the parse fail fatally.
pub struct FakeCompiler {
    compiles: AtomicUsize,
    delay: Duration,
}

impl FakeCompiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            compiles: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            compiles: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl Compiler for FakeCompiler {
    fn compile(&self, _path: &Path, text: &str) -> Result<CompileOutput, CompileError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if text.contains("#fatal") {
            return Err(CompileError::Fatal("unreadable input".into()));
        }

        let mut diagnostics = Vec::new();
        let mut search = 0;
        while let Some(found) = text[search..].find("err(") {
            let start = search + found;
            diagnostics.push(Diagnostic::error(
                "unresolved reference: err",
                Span::new(start, start + 3),
            ));
            search = start + 4;
        }
        Ok(CompileOutput {
            model: Arc::new(TextModel(text.to_string())),
            diagnostics,
        })
    }
}

pub struct FakeClasspath;

impl Classpath for FakeClasspath {
    fn visible_symbols(&self, _path: &Path) -> Vec<CompletionItem> {
        vec![CompletionItem::new(
            "printStackTrace",
            CompletionItemKind::Method,
        )]
    }
}

/// Keyword + classpath completion for identifier prefixes, member completion
/// after a `.`. A `#slow` marker in the text makes the computation spin until
/// its token is cancelled, which lets tests freeze an in-flight request.
pub struct FakeProvider {
    calls: AtomicUsize,
    started: AtomicBool,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            started: AtomicBool::new(false),
        })
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn wait_started(&self) {
        wait_until(Duration::from_secs(5), || self.started.load(Ordering::SeqCst));
    }
}

impl CompletionProvider for FakeProvider {
    fn complete(
        &self,
        _snapshot: &CompiledSnapshot,
        ctx: &CompletionContext<'_>,
        classpath: &dyn Classpath,
        token: &CancellationToken,
    ) -> CompletionList {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.store(true, Ordering::SeqCst);

        if ctx.text.contains("#slow") {
            while !token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        if ctx.cursor > 0 && ctx.text.as_bytes().get(ctx.cursor - 1) == Some(&b'.') {
            return CompletionList::new(
                MEMBERS
                    .iter()
                    .map(|member| {
                        CompletionItem::new(*member, CompletionItemKind::Method)
                            .with_type_text("String")
                    })
                    .collect(),
            );
        }

        let mut items: Vec<CompletionItem> = KEYWORDS
            .iter()
            .filter(|keyword| keyword.starts_with(ctx.prefix))
            .map(|keyword| CompletionItem::new(*keyword, CompletionItemKind::Keyword))
            .collect();
        items.extend(
            classpath
                .visible_symbols(ctx.path)
                .into_iter()
                .filter(|item| item.label.starts_with(ctx.prefix)),
        );
        CompletionList::new(items)
    }
}

pub struct EngineHarness {
    pub engine: AnalysisEngine,
    pub compiler: Arc<FakeCompiler>,
    pub provider: Arc<FakeProvider>,
}

pub fn harness() -> EngineHarness {
    harness_with(FakeCompiler::new(), Duration::from_millis(50))
}

pub fn harness_with(compiler: Arc<FakeCompiler>, lint_delay: Duration) -> EngineHarness {
    init_tracing();
    let provider = FakeProvider::new();
    let config = EngineConfig {
        lint_delay,
        ..EngineConfig::default()
    };
    let engine = AnalysisEngine::with_config(
        config,
        Scheduler::default(),
        Arc::clone(&compiler) as Arc<dyn Compiler>,
        Arc::new(FakeClasspath),
        Arc::clone(&provider) as Arc<dyn CompletionProvider>,
    );
    EngineHarness {
        engine,
        compiler,
        provider,
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !predicate() {
        assert!(
            Instant::now() < deadline,
            "condition not reached within {timeout:?}"
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}
