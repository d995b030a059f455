//! Event kind filter.

use std::collections::HashSet;

use crate::event::EventKind;

/// Set of enabled event kinds.
///
/// An empty set disables filtering: every kind is admitted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventFilter {
    enabled: HashSet<EventKind>,
}

impl EventFilter {
    /// Create a new [`EventFilter`] admitting every kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the enabled set.
    pub fn configure<I>(&mut self, kinds: I)
    where
        I: IntoIterator<Item = EventKind>,
    {
        self.enabled = kinds.into_iter().collect();
    }

    /// Check whether events of `kind` should be recorded.
    pub fn admit(&self, kind: EventKind) -> bool {
        self.enabled.is_empty() || self.enabled.contains(&kind)
    }

    /// Enabled kinds. Empty when filtering is disabled.
    pub fn enabled(&self) -> &HashSet<EventKind> {
        &self.enabled
    }
}

impl FromIterator<EventKind> for EventFilter {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        Self {
            enabled: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_admits_everything() {
        let filter = EventFilter::new();
        for kind in EventKind::ALL {
            assert!(filter.admit(kind));
        }
    }

    #[test]
    fn test_enforce_only() {
        let mut filter = EventFilter::new();
        filter.configure([EventKind::Enforce]);

        assert!(filter.admit(EventKind::Enforce));
        assert!(!filter.admit(EventKind::AddPolicy));
        assert!(!filter.admit(EventKind::SavePolicy));
    }

    #[test]
    fn test_configure_replaces() {
        let mut filter: EventFilter =
            [EventKind::Enforce, EventKind::AddPolicy].into_iter().collect();
        assert_eq!(filter.enabled().len(), 2);

        filter.configure([EventKind::RemovePolicy]);
        assert_eq!(filter.enabled().len(), 1);
        assert!(!filter.admit(EventKind::Enforce));
        assert!(filter.admit(EventKind::RemovePolicy));

        // an empty set turns filtering off again.
        filter.configure(Vec::<EventKind>::new());
        assert!(filter.admit(EventKind::LoadPolicy));
    }
}
