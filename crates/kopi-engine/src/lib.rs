//! Incremental source-analysis engine backing interactive completion and live
//! diagnostics for a single open project.
//!
//! The engine decides *when* to recompile, *what* to recompile, when a
//! previous completion result can be narrowed instead of recomputed, and how
//! to coalesce bursts of edits into a bounded number of lint passes. Parsing
//! and type checking themselves live behind the [`Compiler`] collaborator;
//! external symbol resolution behind [`Classpath`]; the completion algorithm
//! proper behind [`CompletionProvider`].

mod cache;
mod compiler;
mod config;
mod diagnostics;
mod engine;
mod recompile;
mod source;

pub use cache::{CompletionCache, CompletionRequest};
pub use compiler::{
    Classpath, CompileError, CompileOutput, CompiledSnapshot, Compiler, CompletionContext,
    CompletionProvider, EmptyModel, SemanticModel,
};
pub use config::EngineConfig;
pub use diagnostics::convert_diagnostics;
pub use engine::{AnalysisEngine, CompletionTask};
pub use recompile::RecompilePolicy;
pub use source::SourceStore;
