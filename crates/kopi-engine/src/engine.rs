use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;

use kopi_core::{CompletionList, FileDiagnostic, LineIndex, TextSize};
use kopi_scheduler::{
    AsyncExecutor, BlockingTask, CancellationToken, Cancelled, Debouncer, PoolKind, ProgressGuard,
    Scheduler,
};

use crate::cache::{partial_identifier, CompletionCache, CompletionRequest};
use crate::compiler::{Classpath, CompiledSnapshot, Compiler, CompletionContext, CompletionProvider};
use crate::config::EngineConfig;
use crate::diagnostics::convert_diagnostics;
use crate::recompile::RecompilePolicy;
use crate::source::SourceStore;

/// Handle to an asynchronous completion computation. Only the most recently
/// requested handle is worth consuming; superseded handles resolve to
/// `Cancelled` and are expected to be abandoned.
pub type CompletionTask = BlockingTask<CompletionList>;

/// Incremental analysis engine for one open project.
///
/// One value per project, owned by the surrounding application and passed to
/// every call; there is no process-wide instance.
pub struct AnalysisEngine {
    shared: Arc<EngineShared>,
    executor: AsyncExecutor,
    lint_debouncer: Debouncer,
    scheduler: Scheduler,
}

struct EngineShared {
    store: SourceStore,
    cache: Mutex<CompletionCache>,
    pending_lints: Mutex<HashSet<PathBuf>>,
    indexing: AtomicBool,
    lint_passes: AtomicU64,
    classpath: Arc<dyn Classpath>,
    provider: Arc<dyn CompletionProvider>,
    max_completion_items: usize,
}

impl AnalysisEngine {
    pub fn new(
        compiler: Arc<dyn Compiler>,
        classpath: Arc<dyn Classpath>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self::with_config(
            EngineConfig::default(),
            Scheduler::default(),
            compiler,
            classpath,
            provider,
        )
    }

    pub fn with_config(
        config: EngineConfig,
        scheduler: Scheduler,
        compiler: Arc<dyn Compiler>,
        classpath: Arc<dyn Classpath>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        let executor = AsyncExecutor::new(scheduler.clone(), PoolKind::Compute);
        let lint_debouncer = Debouncer::new(scheduler.clone(), PoolKind::Background, config.lint_delay);
        Self {
            shared: Arc::new(EngineShared {
                store: SourceStore::new(compiler),
                cache: Mutex::new(CompletionCache::default()),
                pending_lints: Mutex::new(HashSet::new()),
                indexing: AtomicBool::new(false),
                lint_passes: AtomicU64::new(0),
                classpath,
                provider,
                max_completion_items: config.max_completion_items,
            }),
            executor,
            lint_debouncer,
            scheduler,
        }
    }

    pub fn store(&self) -> &SourceStore {
        &self.shared.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Whether the project is still in its initial bulk-indexing phase.
    /// While true, completion requests degrade to an empty result.
    pub fn is_indexing(&self) -> bool {
        self.shared.indexing.load(Ordering::SeqCst)
    }

    pub fn set_indexing(&self, indexing: bool) {
        self.shared.indexing.store(indexing, Ordering::SeqCst);
    }

    /// Completed, non-cancelled lint passes so far.
    pub fn lint_passes(&self) -> u64 {
        self.shared.lint_passes.load(Ordering::SeqCst)
    }

    /// Apply `text` to the store, then return a snapshot chosen by `policy`.
    pub fn recover(
        &self,
        path: &Path,
        text: &str,
        policy: RecompilePolicy,
        offset: usize,
    ) -> Arc<CompiledSnapshot> {
        self.shared.recover(path, text, policy, offset)
    }

    /// Request completion at a byte offset; prefix, line and column are
    /// derived from the text.
    pub fn complete_at(&self, path: &Path, text: &str, cursor: usize) -> CompletionTask {
        let request = derive_request(path, text, cursor, 0);
        self.complete_request(request, None)
    }

    /// Context-aware variant: the editor supplies the typed prefix and the
    /// cursor's line/column, and the engine drives the progress signal while
    /// the computation runs.
    pub fn complete_at_with_context(
        &self,
        path: &Path,
        text: &str,
        prefix: &str,
        line: u32,
        column: u32,
        cursor: usize,
    ) -> CompletionTask {
        let request = CompletionRequest {
            path: path.to_path_buf(),
            text: text.to_string(),
            cursor,
            line,
            column,
            prefix: prefix.to_string(),
            invocation: 0,
        };
        let progress = self.scheduler.progress().start("completion");
        self.complete_request(request, Some(progress))
    }

    /// Core completion path shared by both entry points.
    pub fn complete_request(
        &self,
        request: CompletionRequest,
        progress: Option<ProgressGuard>,
    ) -> CompletionTask {
        if self.is_indexing() {
            // Fail fast: no queuing while the index is being built.
            return BlockingTask::ready(CompletionList::default());
        }

        // Apply the edit on the calling thread so anything scheduled from
        // here on observes this text or newer.
        self.shared.store.put(&request.path, &request.text, false);

        // This request supersedes whatever completion was in flight, whether
        // or not it can be answered from the cache.
        self.executor.cancel_in_flight();

        if let Some(narrowed) = self.shared.cache.lock().try_narrow(&request) {
            tracing::debug!(
                target: "kopi.engine",
                path = %request.path.display(),
                prefix = %request.prefix,
                "completion served by narrowing"
            );
            return BlockingTask::ready(narrowed);
        }

        let shared = Arc::clone(&self.shared);
        self.executor.compute(move |token| {
            let _progress = progress;
            let snapshot =
                shared.recover(&request.path, &request.text, RecompilePolicy::Never, request.cursor);
            Cancelled::check(&token)?;

            let ctx = CompletionContext {
                path: &request.path,
                text: &request.text,
                cursor: request.cursor,
                prefix: &request.prefix,
                invocation: request.invocation,
            };
            let mut list = shared
                .provider
                .complete(&snapshot, &ctx, shared.classpath.as_ref(), &token);
            if list.items.len() > shared.max_completion_items {
                list.items.truncate(shared.max_completion_items);
                list.is_incomplete = true;
            }

            // A superseded computation must not touch the shared slot.
            Cancelled::check(&token)?;
            shared.cache.lock().replace(&request, list.clone());
            Ok(list)
        })
    }

    /// Queue `path` for the next coalesced lint pass. Repeated calls within
    /// the debounce window collapse into a single pass; the callback of the
    /// last call wins.
    pub fn lint_later<F>(&self, path: &Path, callback: F)
    where
        F: FnOnce(Vec<FileDiagnostic>) + Send + 'static,
    {
        self.shared.pending_lints.lock().insert(path.to_path_buf());
        let shared = Arc::clone(&self.shared);
        self.lint_debouncer.schedule(move |token| {
            let diagnostics = shared.run_lint_pass(&token)?;
            callback(diagnostics);
            Ok(())
        });
    }

    /// Like [`AnalysisEngine::lint_later`], but bypasses the debounce delay.
    pub fn lint_now<F>(&self, path: &Path, callback: F)
    where
        F: FnOnce(Vec<FileDiagnostic>) + Send + 'static,
    {
        self.shared.pending_lints.lock().insert(path.to_path_buf());
        let shared = Arc::clone(&self.shared);
        self.lint_debouncer.submit_immediately(move |token| {
            let diagnostics = shared.run_lint_pass(&token)?;
            callback(diagnostics);
            Ok(())
        });
    }
}

impl EngineShared {
    fn recover(
        &self,
        path: &Path,
        text: &str,
        policy: RecompilePolicy,
        offset: usize,
    ) -> Arc<CompiledSnapshot> {
        let force = policy.should_recompile(text, offset);
        self.store.put(path, text, false);
        if force {
            self.store.current_version(path)
        } else {
            self.store.latest_compiled_version(path)
        }
    }

    /// Snapshot-and-clear the pending set, compile every captured file with
    /// the ALWAYS policy, and convert the diagnostics. Files queued while
    /// this runs land in the next batch.
    fn run_lint_pass(&self, token: &CancellationToken) -> Result<Vec<FileDiagnostic>, Cancelled> {
        let batch: Vec<PathBuf> = {
            let mut pending = self.pending_lints.lock();
            pending.drain().collect()
        };
        tracing::debug!(target: "kopi.engine", files = batch.len(), "lint pass");

        let mut diagnostics = Vec::new();
        for path in &batch {
            Cancelled::check(token)?;
            let Some(text) = self.store.text(path) else {
                continue;
            };
            let snapshot = self.recover(path, &text, RecompilePolicy::Always, 0);
            diagnostics.extend(convert_diagnostics(path, &text, snapshot.diagnostics()));
        }

        // Checked last so a superseded pass produces no observable callback.
        Cancelled::check(token)?;
        self.lint_passes.fetch_add(1, Ordering::SeqCst);
        Ok(diagnostics)
    }
}

fn derive_request(path: &Path, text: &str, cursor: usize, invocation: u32) -> CompletionRequest {
    let cursor = cursor.min(text.len());
    let index = LineIndex::new(text);
    let line_col = index.line_col(TextSize::from(cursor as u32));
    CompletionRequest {
        path: path.to_path_buf(),
        text: text.to_string(),
        cursor,
        line: line_col.line,
        column: line_col.col,
        prefix: partial_identifier(text, cursor).to_string(),
        invocation,
    }
}
