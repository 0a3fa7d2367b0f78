//! Ordering of named collections at finalize.

use crate::config::SortPolicy;
use crate::models::NamedObject;
use std::cmp::Ordering;
use std::sync::Arc;

impl<T: NamedObject> NamedObject for Arc<T> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }
}

fn alphabetical(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Orders a collection in place according to the policy.
///
/// Natural order is discovery order, which collections already have, so it
/// leaves the sequence untouched. Alphabetical order is a stable sort by
/// case-insensitive name with an exact-name tie break.
pub fn apply<T: NamedObject>(items: &mut [T], policy: SortPolicy) {
    match policy {
        SortPolicy::Natural => {}
        SortPolicy::Alphabetical => items.sort_by(|a, b| alphabetical(a.name(), b.name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Named(&'static str, usize);

    impl NamedObject for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn names(items: &[Named]) -> Vec<&'static str> {
        items.iter().map(|n| n.0).collect()
    }

    #[test]
    fn test_natural_keeps_discovery_order() {
        let mut items = vec![Named("ID", 0), Named("CUSTOMERID", 1), Named("TOTAL", 2)];
        apply(&mut items, SortPolicy::Natural);
        assert_eq!(names(&items), vec!["ID", "CUSTOMERID", "TOTAL"]);

        let once = items.clone();
        apply(&mut items, SortPolicy::Natural);
        assert_eq!(items, once);
    }

    #[test]
    fn test_alphabetical_is_idempotent() {
        let mut items = vec![Named("ID", 0), Named("CUSTOMERID", 1), Named("TOTAL", 2)];
        apply(&mut items, SortPolicy::Alphabetical);
        assert_eq!(names(&items), vec!["CUSTOMERID", "ID", "TOTAL"]);

        let sorted = items.clone();
        apply(&mut items, SortPolicy::Alphabetical);
        assert_eq!(items, sorted);
    }

    #[test]
    fn test_alphabetical_is_stable_for_equal_names() {
        let mut items = vec![Named("B", 0), Named("A", 1), Named("B", 2), Named("A", 3)];
        apply(&mut items, SortPolicy::Alphabetical);
        let order: Vec<usize> = items.iter().map(|n| n.1).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_alphabetical_ignores_case_first() {
        let mut items = vec![Named("beta", 0), Named("Alpha", 1), Named("alpha", 2)];
        apply(&mut items, SortPolicy::Alphabetical);
        assert_eq!(names(&items), vec!["Alpha", "alpha", "beta"]);
    }
}
