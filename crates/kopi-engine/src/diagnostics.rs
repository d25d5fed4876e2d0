use std::path::Path;

use kopi_core::{Diagnostic, FileDiagnostic, LineIndex, Range, TextSize};

/// Convert compiler diagnostics for one file into the records the diagnostic
/// sink consumes.
pub fn convert_diagnostics(
    path: &Path,
    text: &str,
    diagnostics: &[Diagnostic],
) -> Vec<FileDiagnostic> {
    let index = LineIndex::new(text);
    diagnostics
        .iter()
        .map(|diagnostic| {
            let start = index.position(text, TextSize::from(diagnostic.span.start as u32));
            let end = index.position(text, TextSize::from(diagnostic.span.end as u32));
            FileDiagnostic {
                file: path.to_path_buf(),
                range: Range::new(start, end),
                severity: diagnostic.severity,
                message: diagnostic.message.clone(),
            }
        })
        .collect()
}
