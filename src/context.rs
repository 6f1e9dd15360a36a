//! Test-case context shared across one scenario's resolution calls
//!
//! The context holds the currently active test case id. It is scoped to one
//! execution unit (one scenario against one browser session) and threaded
//! through the engine as a cloneable handle rather than living in a process
//! global, so parallel scenarios against separate sessions cannot observe
//! each other's ids.

use crate::error::EngineError;
use anyhow::Result;
use std::sync::{Arc, Mutex};

/// Current test-case identifier for one execution unit.
///
/// `set` at scenario start, read by every placeholder resolution during the
/// scenario, `clear` at scenario end. Resolution before `set` is an error,
/// never a stale value.
#[derive(Clone, Default)]
pub struct TestCaseContext {
    current: Arc<Mutex<Option<String>>>,
}

impl TestCaseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate a test case id. Replacing an id that was never cleared is a
    /// lifecycle bug in the caller; it is logged loudly but honored, since
    /// the newest scenario owns the context from here on.
    pub fn set(&self, id: impl Into<String>) {
        let id = id.into();
        let mut current = self.current.lock().unwrap();
        if let Some(ref previous) = *current {
            log::warn!(
                "Test case id '{}' set while '{}' was still active; previous scenario did not clear",
                id,
                previous
            );
        }
        log::info!("Current test case id set: {}", id);
        *current = Some(id);
    }

    pub fn get(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    pub fn is_set(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    pub fn clear(&self) {
        let mut current = self.current.lock().unwrap();
        if let Some(id) = current.take() {
            log::info!("Cleared test case context (was: {})", id);
        }
    }

    /// Return the active id, failing with `ContextNotSet` if there is none.
    pub fn validate_set(&self) -> Result<String> {
        self.get().ok_or_else(|| EngineError::ContextNotSet.into())
    }

    /// Activate `id` and return a guard that clears the context when dropped,
    /// so the set/clear pairing survives early returns and failure paths.
    pub fn enter_scenario(&self, id: impl Into<String>) -> ScenarioGuard {
        self.set(id);
        ScenarioGuard {
            context: self.clone(),
        }
    }
}

/// Clears the owning context on drop.
pub struct ScenarioGuard {
    context: TestCaseContext,
}

impl Drop for ScenarioGuard {
    fn drop(&mut self) {
        self.context.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn validate_fails_before_set() {
        let ctx = TestCaseContext::new();
        let err = ctx.validate_set().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::ContextNotSet)
        ));
    }

    #[test]
    fn set_get_clear_roundtrip() {
        let ctx = TestCaseContext::new();
        ctx.set("TC-001");
        assert_eq!(ctx.get().as_deref(), Some("TC-001"));
        assert_eq!(ctx.validate_set().unwrap(), "TC-001");
        ctx.clear();
        assert!(ctx.get().is_none());
    }

    #[test]
    fn guard_clears_on_drop_even_after_panic_path() {
        let ctx = TestCaseContext::new();
        {
            let _guard = ctx.enter_scenario("TC-042");
            assert!(ctx.is_set());
        }
        assert!(!ctx.is_set());
    }

    #[test]
    fn contexts_are_independent_per_execution_unit() {
        let a = TestCaseContext::new();
        let b = TestCaseContext::new();
        a.set("TC-00A");
        assert!(b.get().is_none());
    }
}
