//! Collaborator contracts the engine depends on. All interfaces are
//! in-process calls; no wire format is defined here.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use kopi_core::{CompletionList, Diagnostic};
use kopi_scheduler::CancellationToken;

/// Opaque semantic binding result produced by the compiler collaborator.
pub trait SemanticModel: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Stand-in model recorded when compilation fails fatally, so completion can
/// still run in a degraded mode instead of hard-failing.
#[derive(Debug, Default)]
pub struct EmptyModel;

impl SemanticModel for EmptyModel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct CompileOutput {
    pub model: Arc<dyn SemanticModel>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Error)]
pub enum CompileError {
    /// The input could not be parsed at all. The store still records a
    /// best-effort snapshot whose diagnostics carry this message.
    #[error("fatal parse failure: {0}")]
    Fatal(String),
}

/// Turns source text into a semantic model plus diagnostics.
///
/// Must be safely callable repeatedly with different text for the same file
/// and must not retain references to stale text after returning. Recoverable
/// problems are reported through [`CompileOutput::diagnostics`], not as
/// errors.
pub trait Compiler: Send + Sync {
    fn compile(&self, path: &Path, text: &str) -> Result<CompileOutput, CompileError>;
}

/// Resolves external/library symbols visible to a given file. Read-only from
/// the engine's perspective.
pub trait Classpath: Send + Sync {
    fn visible_symbols(&self, path: &Path) -> Vec<kopi_core::CompletionItem>;
}

/// Cursor context handed to the completion algorithm.
pub struct CompletionContext<'a> {
    pub path: &'a Path,
    pub text: &'a str,
    pub cursor: usize,
    pub prefix: &'a str,
    /// How many times the user explicitly re-invoked completion at this
    /// position; providers may widen their scope on repeat invocations.
    pub invocation: u32,
}

/// The completion algorithm proper. The engine decides when to run it and
/// against which snapshot; the provider decides what to suggest.
pub trait CompletionProvider: Send + Sync {
    fn complete(
        &self,
        snapshot: &CompiledSnapshot,
        ctx: &CompletionContext<'_>,
        classpath: &dyn Classpath,
        token: &CancellationToken,
    ) -> CompletionList;
}

/// Immutable result of compiling one version of one file. Superseded, never
/// mutated, by the next successful compile.
pub struct CompiledSnapshot {
    model: Arc<dyn SemanticModel>,
    diagnostics: Vec<Diagnostic>,
}

impl CompiledSnapshot {
    pub(crate) fn new(model: Arc<dyn SemanticModel>, diagnostics: Vec<Diagnostic>) -> Self {
        Self { model, diagnostics }
    }

    pub fn model(&self) -> &Arc<dyn SemanticModel> {
        &self.model
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}
