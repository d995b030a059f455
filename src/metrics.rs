//! Prometheus metric families fed by the recorder.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `casbin_enforce_total` | Counter | enforce labels |
//! | `casbin_enforce_duration_seconds` | Histogram | enforce labels |
//! | `casbin_policy_operations_total` | Counter | `operation`, `success` |
//! | `casbin_policy_operations_duration_seconds` | Histogram | `operation` |
//! | `casbin_policy_rules_count` | Gauge | `operation` |
//! | `casbin_policy_state_count` | Gauge | `ptype` |

use prometheus::core::Collector;
use prometheus::{
    CounterVec, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts,
    Registry,
};

use crate::error::{RecorderError, Result};
use crate::labels::EnforceLabels;

pub const ENFORCE_TOTAL: &str = "casbin_enforce_total";
pub const ENFORCE_DURATION: &str = "casbin_enforce_duration_seconds";
pub const POLICY_OPERATIONS_TOTAL: &str = "casbin_policy_operations_total";
pub const POLICY_OPERATIONS_DURATION: &str =
    "casbin_policy_operations_duration_seconds";
pub const POLICY_RULES_COUNT: &str = "casbin_policy_rules_count";
pub const POLICY_STATE_COUNT: &str = "casbin_policy_state_count";

/// Number of families owned by a recorder.
pub const FAMILY_COUNT: usize = 6;

/// The six instruments of a recorder.
///
/// All families are created, registered and unregistered together. Handles
/// are cheap to clone and share the underlying series.
#[derive(Clone)]
pub struct MetricFamilies {
    enforce_total: CounterVec,
    enforce_duration: HistogramVec,
    policy_ops_total: CounterVec,
    policy_ops_duration: HistogramVec,
    policy_rules_count: GaugeVec,
    policy_state_count: GaugeVec,
}

impl MetricFamilies {
    /// Create every family without registering them.
    ///
    /// `buckets` applies to both duration histograms.
    pub fn new(labels: &EnforceLabels, buckets: &[f64]) -> Result<Self> {
        // vectors only check buckets when their first series is created.
        Histogram::with_opts(
            HistogramOpts::new(ENFORCE_DURATION, "bucket check")
                .buckets(buckets.to_vec()),
        )?;

        let enforce_labels = labels.names();

        Ok(Self {
            enforce_total: CounterVec::new(
                Opts::new(ENFORCE_TOTAL, "Total number of enforce requests"),
                &enforce_labels,
            )?,
            enforce_duration: HistogramVec::new(
                HistogramOpts::new(
                    ENFORCE_DURATION,
                    "Duration of enforce requests in seconds",
                )
                .buckets(buckets.to_vec()),
                &enforce_labels,
            )?,
            policy_ops_total: CounterVec::new(
                Opts::new(
                    POLICY_OPERATIONS_TOTAL,
                    "Total number of policy operations",
                ),
                &["operation", "success"],
            )?,
            policy_ops_duration: HistogramVec::new(
                HistogramOpts::new(
                    POLICY_OPERATIONS_DURATION,
                    "Duration of policy operations in seconds",
                )
                .buckets(buckets.to_vec()),
                &["operation"],
            )?,
            policy_rules_count: GaugeVec::new(
                Opts::new(
                    POLICY_RULES_COUNT,
                    "Number of policy rules affected by operations",
                ),
                &["operation"],
            )?,
            policy_state_count: GaugeVec::new(
                Opts::new(
                    POLICY_STATE_COUNT,
                    "Current number of policy rules by type",
                ),
                &["ptype"],
            )?,
        })
    }

    fn collectors(&self) -> [(&'static str, Box<dyn Collector>); FAMILY_COUNT] {
        [
            (ENFORCE_DURATION, boxed(&self.enforce_duration)),
            (ENFORCE_TOTAL, boxed(&self.enforce_total)),
            (POLICY_OPERATIONS_TOTAL, boxed(&self.policy_ops_total)),
            (POLICY_OPERATIONS_DURATION, boxed(&self.policy_ops_duration)),
            (POLICY_RULES_COUNT, boxed(&self.policy_rules_count)),
            (POLICY_STATE_COUNT, boxed(&self.policy_state_count)),
        ]
    }

    /// Register all families on `registry`.
    ///
    /// On failure, families registered by this call are removed again.
    ///
    /// A registry remembers the help text and label names of every metric
    /// name it has ever seen, even after unregistration. Families with
    /// another enforce label set cannot be registered on a registry that
    /// already held this crate's families.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        let mut registered = Vec::with_capacity(FAMILY_COUNT);

        for (name, collector) in self.collectors() {
            if let Err(err) = registry.register(collector) {
                tracing::error!(
                    metric = name,
                    error = %err,
                    "metric family registration failed"
                );

                for (_, collector) in self
                    .collectors()
                    .into_iter()
                    .filter(|(name, _)| registered.contains(name))
                {
                    let _ = registry.unregister(collector);
                }

                return Err(RecorderError::Registration(err));
            }

            registered.push(name);
        }

        Ok(())
    }

    /// Remove all families from `registry`.
    ///
    /// Returns how many families were removed. Missing families are
    /// skipped.
    pub fn unregister(&self, registry: &Registry) -> usize {
        let mut removed = 0;

        for (name, collector) in self.collectors() {
            match registry.unregister(collector) {
                Ok(()) => removed += 1,
                Err(err) => tracing::debug!(
                    metric = name,
                    error = %err,
                    "metric family was not registered"
                ),
            }
        }

        removed
    }

    pub fn enforce_total(&self) -> &CounterVec {
        &self.enforce_total
    }

    pub fn enforce_duration(&self) -> &HistogramVec {
        &self.enforce_duration
    }

    pub fn policy_ops_total(&self) -> &CounterVec {
        &self.policy_ops_total
    }

    pub fn policy_ops_duration(&self) -> &HistogramVec {
        &self.policy_ops_duration
    }

    pub fn policy_rules_count(&self) -> &GaugeVec {
        &self.policy_rules_count
    }

    pub fn policy_state_count(&self) -> &GaugeVec {
        &self.policy_state_count
    }
}

fn boxed<C>(collector: &C) -> Box<dyn Collector>
where
    C: Collector + Clone + 'static,
{
    Box::new(collector.clone())
}

/// Number of series currently held by `collector`.
pub fn series_count(collector: &dyn Collector) -> usize {
    collector
        .collect()
        .iter()
        .map(|family| family.get_metric().len())
        .sum()
}
