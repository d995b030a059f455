//! Event envelope passed through the before/after protocol.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::BoxError;

/// Kind of lifecycle event observed on the authorization engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// Permission check.
    Enforce,
    AddPolicy,
    RemovePolicy,
    LoadPolicy,
    SavePolicy,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Enforce,
        EventKind::AddPolicy,
        EventKind::RemovePolicy,
        EventKind::LoadPolicy,
        EventKind::SavePolicy,
    ];

    /// Value used for the `operation` label of policy metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Enforce => "enforce",
            EventKind::AddPolicy => "addPolicy",
            EventKind::RemovePolicy => "removePolicy",
            EventKind::LoadPolicy => "loadPolicy",
            EventKind::SavePolicy => "savePolicy",
        }
    }

    /// Whether this kind is a policy store operation.
    pub fn is_policy_operation(&self) -> bool {
        !matches!(self, EventKind::Enforce)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind `{0}`")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_owned()))
    }
}

/// One observed event.
///
/// Built by the caller, handed to
/// [`Recorder::on_before`](crate::Recorder::on_before), completed with the
/// outcome, then handed to [`Recorder::on_after`](crate::Recorder::on_after).
/// An entry must not be reused for another event.
///
/// Timing and the `active` flag are owned by the recorder and read-only from
/// the outside.
#[derive(Debug)]
pub struct Entry {
    kind: EventKind,
    /// Enforcement subject.
    pub subject: String,
    /// Enforcement object.
    pub object: String,
    /// Enforcement action.
    pub action: String,
    /// Enforcement domain. Empty means the default domain.
    pub domain: String,
    /// Enforcement decision.
    pub allowed: bool,
    /// Rules affected by a policy operation. Zero means not reported.
    pub rule_count: usize,
    /// Set when the policy operation failed.
    pub failure: Option<BoxError>,
    start: Option<Instant>,
    end: Option<Instant>,
    duration: Duration,
    active: bool,
}

impl Entry {
    /// Create a new [`Entry`] with empty fields.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            subject: String::default(),
            object: String::default(),
            action: String::default(),
            domain: String::default(),
            allowed: false,
            rule_count: 0,
            failure: None,
            start: None,
            end: None,
            duration: Duration::ZERO,
            active: false,
        }
    }

    /// Create an enforcement entry.
    pub fn enforce(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
            domain: domain.into(),
            ..Self::new(EventKind::Enforce)
        }
    }

    /// Set the number of affected rules.
    pub fn rules(mut self, rule_count: usize) -> Self {
        self.rule_count = rule_count;
        self
    }

    /// Mark the policy operation as failed.
    pub fn fail<E>(&mut self, err: E)
    where
        E: Into<BoxError>,
    {
        self.failure = Some(err.into());
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Whether the entry passed the event filter.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start_time(&self) -> Option<Instant> {
        self.start
    }

    pub fn end_time(&self) -> Option<Instant> {
        self.end
    }

    /// Elapsed time between both hooks. Zero until the after hook ran.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn activate(&mut self, now: Instant) {
        self.active = true;
        self.start = Some(now);
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
        self.start = None;
    }

    pub(crate) fn stop(&mut self, now: Instant) {
        let start = *self.start.get_or_insert(now);
        self.end = Some(now);
        self.duration = now.saturating_duration_since(start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }

        assert_eq!(
            "bogus".parse::<EventKind>(),
            Err(UnknownEventKind("bogus".into()))
        );
    }

    #[test]
    fn test_kind_yaml_names() {
        let kinds: Vec<EventKind> =
            serde_yaml::from_str("[enforce, addPolicy, savePolicy]").unwrap();
        assert_eq!(
            kinds,
            vec![EventKind::Enforce, EventKind::AddPolicy, EventKind::SavePolicy]
        );
    }

    #[test]
    fn test_new_entry_is_inactive() {
        let entry = Entry::enforce("alice", "data1", "read", "");
        assert!(!entry.is_active());
        assert!(entry.start_time().is_none());
        assert_eq!(entry.duration(), Duration::ZERO);
        assert_eq!(entry.domain, "");
    }

    #[test]
    fn test_stop_computes_duration() {
        let mut entry = Entry::new(EventKind::LoadPolicy).rules(3);
        let start = Instant::now();
        entry.activate(start);

        let end = start + Duration::from_millis(40);
        entry.stop(end);

        assert_eq!(entry.end_time(), Some(end));
        assert_eq!(entry.duration(), Duration::from_millis(40));
        assert_eq!(entry.rule_count, 3);
    }

    #[test]
    fn test_failure() {
        let mut entry = Entry::new(EventKind::SavePolicy);
        assert!(entry.failure.is_none());

        entry.fail("adapter unavailable");
        assert_eq!(
            entry.failure.as_ref().map(|e| e.to_string()).as_deref(),
            Some("adapter unavailable")
        );

        entry.fail(std::io::Error::other("disk full"));
        let failure: &BoxError = entry.failure.as_ref().unwrap();
        assert!(failure.downcast_ref::<std::io::Error>().is_some());
    }
}
