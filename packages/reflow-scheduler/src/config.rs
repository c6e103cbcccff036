/// Runtime toggles for the scheduler. One build serves every mode; nothing
/// here is a compile-time feature.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// When true, a requested flush is pushed to the next turn through the
    /// installed `Deferral`. When false, `enqueue` flushes synchronously
    /// before returning.
    pub deferred: bool,

    /// Emit `on_flush_complete` to the installed observer after each cycle.
    pub devtools: bool,

    /// Maintain the per-id repeat counter and abort a cycle that keeps
    /// re-marking the same job past the loop limit.
    pub track_circular: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            deferred: true,
            devtools: false,
            track_circular: true,
        }
    }
}
