//! Internal disposal bag for managing per-bean cleanup entries.

/// Named disposal entries kept in registration order.
///
/// Entries are drained newest first (LIFO); a single entry can be taken out
/// early when a dependent bean has to be destroyed before the others.
pub(crate) struct DisposeBag<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for DisposeBag<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> DisposeBag<T> {
    /// Adds an entry; a later push for the same name replaces the earlier one.
    pub(crate) fn push(&mut self, name: impl Into<String>, entry: T) {
        let name = name.into();
        self.entries.retain(|(existing, _)| existing != &name);
        self.entries.push((name, entry));
    }

    /// Removes and returns the entry for `name`.
    pub(crate) fn take(&mut self, name: &str) -> Option<T> {
        let index = self.entries.iter().position(|(existing, _)| existing == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Removes and returns the newest entry.
    pub(crate) fn pop(&mut self) -> Option<(String, T)> {
        self.entries.pop()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == name)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_newest_first_and_takes_by_name() {
        let mut bag = DisposeBag::default();
        bag.push("a", 1);
        bag.push("b", 2);
        bag.push("c", 3);

        assert_eq!(bag.take("b"), Some(2));
        assert!(!bag.contains("b"));
        assert_eq!(bag.pop(), Some(("c".to_string(), 3)));
        assert_eq!(bag.pop(), Some(("a".to_string(), 1)));
        assert!(bag.is_empty());
    }
}
