//! Tracks the beans currently being created on each thread.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::error::{BeanError, BeanResult};

const MAX_DEPTH: usize = 512;

/// Per-thread creation stacks for one factory.
///
/// Entering a bean that is already on the current thread's stack reports a
/// circular dependency whose chain starts at the first occurrence, e.g.
/// `["a", "b", "a"]`.
#[derive(Default)]
pub(crate) struct CreationTracker {
    stacks: Mutex<HashMap<ThreadId, Vec<String>>>,
}

impl CreationTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pushes `name` onto the current thread's stack.
    pub(crate) fn enter(&self, name: &str) -> BeanResult<CreationGuard<'_>> {
        let mut stacks = self.stacks.lock();
        let stack = stacks.entry(thread::current().id()).or_default();

        // Circular detection BEFORE pushing the new name
        if let Some(first) = stack.iter().position(|entry| entry == name) {
            let mut chain = stack[first..].to_vec();
            chain.push(name.to_string());
            return Err(BeanError::CircularDependency { chain });
        }

        // Depth guard
        if stack.len() >= MAX_DEPTH {
            return Err(BeanError::IllegalState(format!(
                "bean creation nested deeper than {} levels at '{}'",
                MAX_DEPTH, name
            )));
        }

        stack.push(name.to_string());
        Ok(CreationGuard { tracker: self, name: name.to_string() })
    }

    /// True if `name` is being created on the current thread.
    pub(crate) fn is_in_creation(&self, name: &str) -> bool {
        self.stacks
            .lock()
            .get(&thread::current().id())
            .map_or(false, |stack| stack.iter().any(|entry| entry == name))
    }

    /// The current thread's creation stack, outermost first.
    #[cfg(test)]
    pub(crate) fn current_chain(&self) -> Vec<String> {
        self.stacks.lock().get(&thread::current().id()).cloned().unwrap_or_default()
    }
}

/// Pops the bean from the creating thread's stack on drop, on every exit path.
pub(crate) struct CreationGuard<'a> {
    tracker: &'a CreationTracker,
    name: String,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        let mut stacks = self.tracker.stacks.lock();
        let id = thread::current().id();
        if let Some(stack) = stacks.get_mut(&id) {
            if let Some(last) = stack.pop() {
                debug_assert_eq!(last, self.name);
            }
            if stack.is_empty() {
                stacks.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentry_reports_chain_from_first_occurrence() {
        let tracker = CreationTracker::new();
        let _root = tracker.enter("root").unwrap();
        let _a = tracker.enter("a").unwrap();
        let _b = tracker.enter("b").unwrap();

        match tracker.enter("a") {
            Err(BeanError::CircularDependency { chain }) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
        };
    }

    #[test]
    fn guards_release_on_error_paths() {
        let tracker = CreationTracker::new();
        let attempt = || -> BeanResult<()> {
            let _guard = tracker.enter("x")?;
            Err(BeanError::IllegalState("boom".into()))
        };
        assert!(attempt().is_err());
        assert!(!tracker.is_in_creation("x"));
        assert!(tracker.current_chain().is_empty());
    }

    #[test]
    fn stacks_are_per_thread() {
        let tracker = CreationTracker::new();
        let _guard = tracker.enter("shared").unwrap();
        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(!tracker.is_in_creation("shared"));
                assert!(tracker.enter("shared").is_ok());
            });
        });
    }
}
