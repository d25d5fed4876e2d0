use std::path::PathBuf;

use kopi_core::CompletionList;

/// A single completion request as issued by the editor.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub path: PathBuf,
    /// Full text of the file at request time.
    pub text: String,
    /// Byte offset of the cursor.
    pub cursor: usize,
    pub line: u32,
    pub column: u32,
    /// The partial identifier being typed at the cursor.
    pub prefix: String,
    /// Explicit re-invocations at the same position.
    pub invocation: u32,
}

#[derive(Debug, Clone)]
struct CachedCompletion {
    path: PathBuf,
    prefix: String,
    line: u32,
    column: u32,
    items: CompletionList,
}

/// Remembers the most recent completion result together with the cursor
/// context it was computed for.
///
/// One slot system-wide, not one per file: narrowing is only valid against
/// the most recent request anywhere, and the last writer wins. Filename
/// equality is the only cross-file guard.
#[derive(Debug, Default)]
pub struct CompletionCache {
    slot: Option<CachedCompletion>,
}

impl CompletionCache {
    /// Serve `request` by filtering the cached item list, if every narrowing
    /// precondition holds. Any failed precondition clears the slot; a cached
    /// result is never patched in place.
    pub fn try_narrow(&mut self, request: &CompletionRequest) -> Option<CompletionList> {
        if !self.can_narrow(request) {
            self.slot = None;
            return None;
        }
        let cached = self.slot.as_ref()?;
        let items = cached
            .items
            .items
            .iter()
            .filter(|item| item.label.starts_with(&request.prefix))
            .cloned()
            .collect();
        Some(CompletionList {
            is_incomplete: cached.items.is_incomplete,
            items,
        })
    }

    fn can_narrow(&self, request: &CompletionRequest) -> bool {
        let Some(cached) = &self.slot else {
            return false;
        };
        if request.prefix.is_empty() || request.prefix.ends_with('.') {
            // A fresh `.` always forces full recomputation.
            return false;
        }
        if cached.path != request.path {
            return false;
        }
        if cached.line != request.line {
            return false;
        }
        if cached.column > request.column {
            return false;
        }
        if !request.prefix.starts_with(&cached.prefix) {
            return false;
        }
        // The prefix must have grown by exactly as many characters as the
        // cursor moved; anything else means the line changed elsewhere.
        request.prefix.len() - cached.prefix.len() == (request.column - cached.column) as usize
    }

    /// Replace the slot wholesale with the context and result of a completed
    /// full computation.
    pub fn replace(&mut self, request: &CompletionRequest, items: CompletionList) {
        self.slot = Some(CachedCompletion {
            path: request.path.clone(),
            prefix: request.prefix.clone(),
            line: request.line,
            column: request.column,
            items,
        });
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    pub fn is_populated(&self) -> bool {
        self.slot.is_some()
    }
}

/// The partial identifier ending at `end`: scans back over identifier
/// characters, the way the editor determines what the user is typing.
pub(crate) fn partial_identifier(text: &str, end: usize) -> &str {
    let mut end = end.min(text.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let head = &text[..end];
    let start = head
        .char_indices()
        .rev()
        .take_while(|(_, ch)| is_identifier_part(*ch))
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(end);
    &text[start..end]
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}
