/// How eagerly a request is willing to pay for recompilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecompilePolicy {
    /// Recompile the current text.
    Always,
    /// Serve the last compiled snapshot even if stale; the latency trade-off
    /// for interactive completion.
    Never,
    /// Recompile only when the character before the request offset is `.`.
    /// Member completion after a dot needs a fresh scope; completing an
    /// identifier mid-word does not.
    AfterDot,
}

impl RecompilePolicy {
    /// Pure decision function: should the current text be recompiled before
    /// serving this request? No side effects; evaluated once per request.
    pub fn should_recompile(self, text: &str, offset: usize) -> bool {
        match self {
            RecompilePolicy::Always => true,
            RecompilePolicy::Never => false,
            RecompilePolicy::AfterDot => {
                offset > 0 && text.as_bytes().get(offset - 1) == Some(&b'.')
            }
        }
    }
}
