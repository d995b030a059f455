//! Label schema of enforcement metrics.
//!
//! `allowed` and `domain` are always present, in that order. Optional
//! labels follow in a fixed order (`subject`, `object`, `action`) whatever
//! the order they were requested in, so the same options always produce the
//! same schema.

use std::fmt;
use std::str::FromStr;

use crate::event::Entry;

/// Label holding the enforcement decision.
pub const ALLOWED: &str = "allowed";
/// Label holding the enforcement domain.
pub const DOMAIN: &str = "domain";
/// Value used when an entry has an empty domain.
pub const DEFAULT_DOMAIN: &str = "default";

/// Optional label of enforcement metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnforceLabel {
    Subject,
    Object,
    Action,
}

impl EnforceLabel {
    /// Optional labels in schema order.
    pub const ALL: [EnforceLabel; 3] =
        [EnforceLabel::Subject, EnforceLabel::Object, EnforceLabel::Action];

    pub const fn name(&self) -> &'static str {
        match self {
            EnforceLabel::Subject => "subject",
            EnforceLabel::Object => "object",
            EnforceLabel::Action => "action",
        }
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    fn value<'a>(&self, entry: &'a Entry) -> &'a str {
        match self {
            EnforceLabel::Subject => &entry.subject,
            EnforceLabel::Object => &entry.object,
            EnforceLabel::Action => &entry.action,
        }
    }
}

impl fmt::Display for EnforceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unsupported label name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported enforce label `{0}`")]
pub struct UnknownLabel(pub String);

impl FromStr for EnforceLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnforceLabel::ALL
            .into_iter()
            .find(|label| label.name() == s)
            .ok_or_else(|| UnknownLabel(s.to_owned()))
    }
}

/// Label configuration shared by the enforcement counter and histogram.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnforceLabels {
    optional: u8,
}

impl EnforceLabels {
    /// Create a new [`EnforceLabels`] with only `allowed` and `domain`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an optional label.
    pub fn with(mut self, label: EnforceLabel) -> Self {
        self.optional |= label.bit();
        self
    }

    /// Build labels from names. Unsupported names are skipped.
    ///
    /// # Example
    /// ```rust
    /// use casbin_metrics::EnforceLabels;
    ///
    /// let labels = EnforceLabels::from_names(["subject", "bogus", "object"]);
    /// assert_eq!(labels.names(), ["allowed", "domain", "subject", "object"]);
    /// ```
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().fold(Self::new(), |labels, name| {
            match name.as_ref().parse::<EnforceLabel>() {
                Ok(label) => labels.with(label),
                Err(err) => {
                    tracing::warn!(error = %err, "enforce label ignored");
                    labels
                },
            }
        })
    }

    pub fn contains(&self, label: EnforceLabel) -> bool {
        self.optional & label.bit() != 0
    }

    fn optional(&self) -> impl Iterator<Item = EnforceLabel> + '_ {
        EnforceLabel::ALL
            .into_iter()
            .filter(|label| self.contains(*label))
    }

    /// Label names, in schema order.
    pub fn names(&self) -> Vec<&'static str> {
        [ALLOWED, DOMAIN]
            .into_iter()
            .chain(self.optional().map(|label| label.name()))
            .collect()
    }

    /// Number of labels, mandatory ones included.
    pub fn len(&self) -> usize {
        2 + self.optional.count_ones() as usize
    }

    /// Always false: `allowed` and `domain` are mandatory.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Label values of `entry`, aligned with [`EnforceLabels::names`].
    pub fn project<'a>(&self, entry: &'a Entry) -> Vec<&'a str> {
        let allowed = if entry.allowed { "true" } else { "false" };
        let domain = if entry.domain.is_empty() {
            DEFAULT_DOMAIN
        } else {
            entry.domain.as_str()
        };

        [allowed, domain]
            .into_iter()
            .chain(self.optional().map(|label| label.value(entry)))
            .collect()
    }
}

impl FromIterator<EnforceLabel> for EnforceLabels {
    fn from_iter<I: IntoIterator<Item = EnforceLabel>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), EnforceLabels::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(allowed: bool, domain: &str) -> Entry {
        let mut entry = Entry::enforce("alice", "data1", "read", domain);
        entry.allowed = allowed;
        entry
    }

    #[test]
    fn test_default_labels() {
        let labels = EnforceLabels::new();
        assert_eq!(labels.names(), ["allowed", "domain"]);
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_all_labels() {
        let labels: EnforceLabels = EnforceLabel::ALL.into_iter().collect();
        assert_eq!(
            labels.names(),
            ["allowed", "domain", "subject", "object", "action"]
        );
        assert_eq!(labels.len(), 5);
    }

    #[test]
    fn test_unknown_label_is_dropped() {
        let labels = EnforceLabels::from_names(["subject", "bogus", "object"]);
        assert_eq!(labels.len(), 4);
        assert!(labels.contains(EnforceLabel::Subject));
        assert!(labels.contains(EnforceLabel::Object));
        assert!(!labels.contains(EnforceLabel::Action));
    }

    #[test]
    fn test_fixed_order_and_duplicates() {
        let labels = EnforceLabels::from_names(["action", "subject", "action"]);
        assert_eq!(labels.names(), ["allowed", "domain", "subject", "action"]);
    }

    #[test]
    fn test_project_default_domain() {
        let labels = EnforceLabels::new();
        assert_eq!(labels.project(&entry(false, "")), ["false", "default"]);
        assert_eq!(labels.project(&entry(true, "org1")), ["true", "org1"]);
    }

    #[test]
    fn test_project_optional_values() {
        let labels = EnforceLabels::new()
            .with(EnforceLabel::Object)
            .with(EnforceLabel::Subject);

        assert_eq!(
            labels.project(&entry(true, "domain1")),
            ["true", "domain1", "alice", "data1"]
        );

        // empty optional values are kept verbatim.
        let empty = Entry::enforce("", "", "", "domain1");
        assert_eq!(labels.project(&empty), ["false", "domain1", "", ""]);
    }

    #[test]
    fn test_project_is_deterministic() {
        let labels: EnforceLabels = EnforceLabel::ALL.into_iter().collect();
        let first = entry(true, "org2");
        let second = entry(true, "org2");

        assert_eq!(labels.project(&first), labels.project(&second));
        assert_eq!(labels.project(&first).len(), labels.names().len());
    }
}
