use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared, append-only log of `<module>.<hook>` entries.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, module: &str, hook: &str) {
        self.lock().push(format!("{module}.{hook}"));
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Modules that ran `hook`, in call order.
    pub fn modules_for(&self, hook: &str) -> Vec<String> {
        let suffix = format!(".{hook}");
        self.lock().iter().filter_map(|c| c.strip_suffix(&suffix)).map(str::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
