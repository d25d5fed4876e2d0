//! Core shared types for Kopi.
//!
//! This crate is intentionally small: text primitives and the plain data
//! model that every other crate exchanges.

mod model;
mod text;

pub use model::{
    CompletionItem, CompletionItemKind, CompletionList, Diagnostic, FileDiagnostic, Severity, Span,
};
pub use text::{LineCol, LineIndex, Position, Range};
pub use text_size::{TextRange, TextSize};

/// Best-effort conversion of a panic payload into something printable.
pub fn panic_payload_to_str(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
