use crate::sync_engine::types::CopyOutcome;

/// Performs one file copy and reports the outcome.
///
/// Calls are synchronous and may block; the scheduler runs them off the async
/// workers so a slow copy only delays its own task.
pub trait CopyExecutor: Send + Sync + 'static {
    fn copy(&self, source: &str, target: &str) -> CopyOutcome;
}

impl<F> CopyExecutor for F
where
    F: Fn(&str, &str) -> CopyOutcome + Send + Sync + 'static,
{
    fn copy(&self, source: &str, target: &str) -> CopyOutcome {
        self(source, target)
    }
}
