use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use kopi_core::{Diagnostic, Span};

use crate::compiler::{CompileError, CompiledSnapshot, Compiler, EmptyModel, SemanticModel};

struct TrackedFile {
    text: Arc<str>,
    snapshot: Option<Arc<CompiledSnapshot>>,
    /// Current text differs from the text behind `snapshot`.
    dirty: bool,
    version: u64,
}

impl Default for TrackedFile {
    fn default() -> Self {
        Self {
            text: Arc::from(""),
            snapshot: None,
            dirty: true,
            version: 0,
        }
    }
}

/// Authoritative in-memory text of every tracked file plus its most recent
/// compiled snapshot.
///
/// Mutation is serialized per file: each entry carries its own mutex, and
/// compilation happens under it, so there is never more than one writer to
/// the same file.
pub struct SourceStore {
    compiler: Arc<dyn Compiler>,
    files: RwLock<HashMap<PathBuf, Arc<Mutex<TrackedFile>>>>,
}

impl SourceStore {
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            files: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, path: &Path) -> Arc<Mutex<TrackedFile>> {
        if let Some(file) = self.files.read().get(path) {
            return Arc::clone(file);
        }
        let mut files = self.files.write();
        Arc::clone(files.entry(path.to_path_buf()).or_default())
    }

    /// Replace the current text for `path` unconditionally. Never compiles.
    ///
    /// `record_history` bumps the file's edit version, queryable via
    /// [`SourceStore::version`].
    pub fn put(&self, path: &Path, text: &str, record_history: bool) {
        let entry = self.entry(path);
        let mut file = entry.lock();
        if file.text.as_ref() != text {
            file.text = Arc::from(text);
            file.dirty = true;
            tracing::trace!(target: "kopi.source", path = %path.display(), "text replaced");
        }
        if record_history {
            file.version += 1;
        }
    }

    /// The current text of `path`, if tracked.
    pub fn text(&self, path: &Path) -> Option<Arc<str>> {
        let file = self.files.read().get(path).map(Arc::clone)?;
        let file = file.lock();
        Some(Arc::clone(&file.text))
    }

    pub fn version(&self, path: &Path) -> u64 {
        match self.files.read().get(path) {
            Some(file) => file.lock().version,
            None => 0,
        }
    }

    pub fn is_dirty(&self, path: &Path) -> bool {
        match self.files.read().get(path) {
            Some(file) => file.lock().dirty,
            None => false,
        }
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    pub fn tracked_files(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }

    /// A snapshot guaranteed to reflect the current text: compiles
    /// synchronously first when the file is dirty.
    pub fn current_version(&self, path: &Path) -> Arc<CompiledSnapshot> {
        let entry = self.entry(path);
        let mut file = entry.lock();
        match &file.snapshot {
            Some(snapshot) if !file.dirty => Arc::clone(snapshot),
            _ => self.refresh(path, &mut file),
        }
    }

    /// The last compiled snapshot, even if stale relative to the current
    /// text. Compiles only when the file has never been compiled at all.
    pub fn latest_compiled_version(&self, path: &Path) -> Arc<CompiledSnapshot> {
        let entry = self.entry(path);
        let mut file = entry.lock();
        match &file.snapshot {
            Some(snapshot) => Arc::clone(snapshot),
            None => self.refresh(path, &mut file),
        }
    }

    /// Stop tracking `path`. Files are never removed implicitly.
    pub fn close(&self, path: &Path) -> bool {
        self.files.write().remove(path).is_some()
    }

    fn refresh(&self, path: &Path, file: &mut TrackedFile) -> Arc<CompiledSnapshot> {
        let text = Arc::clone(&file.text);
        let snapshot = match self.compiler.compile(path, &text) {
            Ok(output) => {
                file.dirty = false;
                Arc::new(CompiledSnapshot::new(output.model, output.diagnostics))
            }
            Err(CompileError::Fatal(message)) => {
                // Keep a best-effort snapshot so completion degrades instead
                // of hard-failing on malformed input. The file stays dirty so
                // the next forced compile retries.
                tracing::warn!(
                    target: "kopi.source",
                    path = %path.display(),
                    error = %message,
                    "fatal compile failure; recording best-effort snapshot"
                );
                let model = match &file.snapshot {
                    Some(previous) => Arc::clone(previous.model()),
                    None => Arc::new(EmptyModel) as Arc<dyn SemanticModel>,
                };
                let failure = Diagnostic::error(message, Span::new(0, 0));
                Arc::new(CompiledSnapshot::new(model, vec![failure]))
            }
        };
        file.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }
}
