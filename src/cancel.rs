use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag the job layer can trip to abandon an in-flight conversion.
/// Clones observe the same flag; the pipeline checks it between stages and
/// per detector frame, and no partial sheet escapes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
