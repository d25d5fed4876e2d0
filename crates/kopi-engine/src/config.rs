use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet period before a coalesced lint pass runs.
    pub lint_delay: Duration,
    /// Upper bound on items returned from a single completion computation;
    /// truncated lists are marked incomplete.
    pub max_completion_items: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lint_delay: Duration::from_millis(500),
            max_completion_items: 50,
        }
    }
}
