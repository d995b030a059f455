//! Before/after instrumentation of authorization events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use prometheus::Registry;

use crate::config::Metrics as MetricsConfig;
use crate::error::{ObserverError, Result};
use crate::event::{Entry, EventKind};
use crate::filter::EventFilter;
use crate::labels::{EnforceLabel, EnforceLabels};
use crate::metrics::{FAMILY_COUNT, MetricFamilies};
use crate::registry::Target;

/// Side processing run after an event has been recorded.
pub trait Observer: Send + Sync {
    /// Observe a recorded entry.
    ///
    /// An error is returned as-is by [`Recorder::on_after`]. Metrics of the
    /// entry are already recorded at that point.
    fn observe(&self, entry: &Entry) -> std::result::Result<(), ObserverError>;
}

impl<F> Observer for F
where
    F: Fn(&Entry) -> std::result::Result<(), ObserverError> + Send + Sync,
{
    fn observe(&self, entry: &Entry) -> std::result::Result<(), ObserverError> {
        self(entry)
    }
}

/// Records authorization events into Prometheus metric families.
///
/// The recorder only borrows its registry: it adds its six families and
/// removes them again on [`Recorder::unregister`], nothing else. Once
/// unregistered, it never touches a registry again, so families registered
/// later under the same names by another recorder are left alone.
///
/// # Example
/// ```rust
/// use casbin_metrics::{Entry, Recorder};
/// use prometheus::Registry;
///
/// let registry = Registry::new();
/// let recorder = Recorder::with_registry(&registry).unwrap();
///
/// let mut entry = Entry::enforce("alice", "data1", "read", "domain1");
/// recorder.on_before(&mut entry);
/// entry.allowed = true;
/// recorder.on_after(&mut entry).unwrap();
///
/// let total = recorder.families().enforce_total();
/// assert_eq!(total.with_label_values(&["true", "domain1"]).get(), 1.0);
/// recorder.unregister();
/// ```
pub struct Recorder {
    filter: EventFilter,
    observer: Option<Arc<dyn Observer>>,
    labels: EnforceLabels,
    families: MetricFamilies,
    registry: Registry,
    registered: AtomicBool,
}

impl Recorder {
    /// Create a new [`Recorder`] on the default registry.
    pub fn new() -> Result<Self> {
        RecorderBuilder::default().build()
    }

    /// Create a new [`Recorder`] on `registry`.
    pub fn with_registry(registry: &Registry) -> Result<Self> {
        RecorderBuilder::default().registry(registry).build()
    }

    pub fn builder<'a>() -> RecorderBuilder<'a> {
        RecorderBuilder::default()
    }

    /// Replace the kinds of events to record. An empty set records all.
    pub fn set_event_kinds<I>(&mut self, kinds: I)
    where
        I: IntoIterator<Item = EventKind>,
    {
        self.filter.configure(kinds);
    }

    /// Install the observer called after each recorded event.
    pub fn set_observer<O>(&mut self, observer: O)
    where
        O: Observer + 'static,
    {
        self.observer = Some(Arc::new(observer));
    }

    /// Install a closure as observer.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: Fn(&Entry) -> std::result::Result<(), ObserverError>
            + Send
            + Sync
            + 'static,
    {
        self.set_observer(callback);
    }

    /// Remove the installed observer, if any.
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Start an event.
    ///
    /// Decides once and for all whether the entry is recorded. Filtered
    /// entries get no timestamp.
    pub fn on_before(&self, entry: &mut Entry) {
        if self.filter.admit(entry.kind()) {
            entry.activate(Instant::now());
        } else {
            entry.deactivate();
        }
    }

    /// Complete an event and record it.
    ///
    /// Inactive entries are left untouched. The only possible error comes
    /// from the observer.
    pub fn on_after(
        &self,
        entry: &mut Entry,
    ) -> std::result::Result<(), ObserverError> {
        if !entry.is_active() {
            return Ok(());
        }

        entry.stop(Instant::now());

        match entry.kind() {
            EventKind::Enforce => self.record_enforce(entry),
            EventKind::AddPolicy
            | EventKind::RemovePolicy
            | EventKind::LoadPolicy
            | EventKind::SavePolicy => self.record_policy(entry),
        }

        match &self.observer {
            Some(observer) => observer.observe(entry),
            None => Ok(()),
        }
    }

    fn record_enforce(&self, entry: &Entry) {
        let values = self.labels.project(entry);
        let seconds = entry.duration().as_secs_f64();

        self.families
            .enforce_duration()
            .with_label_values(&values)
            .observe(seconds);
        self.families.enforce_total().with_label_values(&values).inc();

        tracing::debug!(
            allowed = entry.allowed,
            domain = %entry.domain,
            seconds,
            "enforce recorded"
        );
    }

    fn record_policy(&self, entry: &Entry) {
        let operation = entry.kind().as_str();
        let success = if entry.failure.is_some() {
            "false"
        } else {
            "true"
        };
        let seconds = entry.duration().as_secs_f64();

        self.families
            .policy_ops_total()
            .with_label_values(&[operation, success])
            .inc();
        self.families
            .policy_ops_duration()
            .with_label_values(&[operation])
            .observe(seconds);

        // last value wins, this is not a running total.
        if entry.rule_count > 0 {
            self.families
                .policy_rules_count()
                .with_label_values(&[operation])
                .set(entry.rule_count as f64);
        }

        tracing::debug!(
            operation,
            success,
            rules = entry.rule_count,
            seconds,
            "policy operation recorded"
        );
    }

    /// Set the current number of rules of policy type `ptype`.
    ///
    /// `ptype` is usually `p`, `g`, `g1`, `g2`, ...
    pub fn set_policy_state(&self, ptype: &str, count: usize) {
        self.families
            .policy_state_count()
            .with_label_values(&[ptype])
            .set(count as f64);
    }

    /// Remove the families from the registry the recorder was built with.
    ///
    /// Safe to call several times: only the first call removes anything.
    /// Returns `true` if the six families were removed by this call.
    pub fn unregister(&self) -> bool {
        if !self.registered.swap(false, Ordering::AcqRel) {
            tracing::debug!("recorder already unregistered");
            return false;
        }

        self.families.unregister(&self.registry) == FAMILY_COUNT
    }

    /// Remove the families from `registry`.
    ///
    /// Families are only ever registered on the registry the recorder was
    /// built with, so that is the one to pass. A registry holding none of
    /// them leaves the recorder registered. Returns `false` if any family
    /// was not registered there.
    pub fn unregister_from(&self, registry: &Registry) -> bool {
        if !self.registered.swap(false, Ordering::AcqRel) {
            tracing::debug!("recorder already unregistered");
            return false;
        }

        match self.families.unregister(registry) {
            0 => {
                self.registered.store(true, Ordering::Release);
                false
            },
            removed => removed == FAMILY_COUNT,
        }
    }

    /// Whether the families are still registered.
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub fn labels(&self) -> &EnforceLabels {
        &self.labels
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    pub fn families(&self) -> &MetricFamilies {
        &self.families
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Builder of [`Recorder`].
pub struct RecorderBuilder<'a> {
    target: Target<'a>,
    labels: EnforceLabels,
    buckets: Vec<f64>,
    kinds: Vec<EventKind>,
}

impl Default for RecorderBuilder<'_> {
    fn default() -> Self {
        Self {
            target: Target::Default,
            labels: EnforceLabels::new(),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
            kinds: Vec::new(),
        }
    }
}

impl<'a> RecorderBuilder<'a> {
    /// Register on `registry` instead of the default registry.
    pub fn registry(mut self, registry: &'a Registry) -> Self {
        self.target = Target::Custom(registry);
        self
    }

    pub fn target(mut self, target: Target<'a>) -> Self {
        self.target = target;
        self
    }

    /// Replace the enforce label configuration.
    pub fn labels(mut self, labels: EnforceLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Add an optional enforce label.
    pub fn label(mut self, label: EnforceLabel) -> Self {
        self.labels = self.labels.with(label);
        self
    }

    /// Buckets of both duration histograms.
    pub fn buckets(mut self, buckets: Vec<f64>) -> Self {
        self.buckets = buckets;
        self
    }

    /// Initial event kinds. Can be changed later with
    /// [`Recorder::set_event_kinds`].
    pub fn event_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = EventKind>,
    {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Apply the `metrics` section of the configuration file.
    pub fn config(self, config: &MetricsConfig) -> Self {
        let builder = self
            .labels(EnforceLabels::from_names(&config.enforce_labels))
            .event_kinds(config.event_kinds.iter().copied());

        match &config.buckets {
            Some(buckets) => builder.buckets(buckets.clone()),
            None => builder,
        }
    }

    /// Create the families and register them.
    ///
    /// # Errors
    ///
    /// Fails if a family of the same name is already registered, or if the
    /// buckets are invalid. Nothing is left registered on failure.
    pub fn build(self) -> Result<Recorder> {
        let registry = self.target.registry();
        let families = MetricFamilies::new(&self.labels, &self.buckets)?;
        families.register(registry)?;

        tracing::debug!(labels = ?self.labels.names(), "recorder registered");

        Ok(Recorder {
            filter: self.kinds.into_iter().collect(),
            observer: None,
            labels: self.labels,
            families,
            registry: registry.clone(),
            registered: AtomicBool::new(true),
        })
    }
}
