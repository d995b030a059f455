//! casbin-metrics projects authorization events onto Prometheus metrics.
//!
//! Each enforcement or policy operation is wrapped in an [`Entry`] that goes
//! through [`Recorder::on_before`], then [`Recorder::on_after`] once the
//! outcome is known.

#![forbid(unsafe_code)]
#![deny(unused_mut)]

pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod labels;
pub mod metrics;
pub mod recorder;
pub mod registry;
pub mod telemetry;

pub use error::{BoxError, ObserverError, RecorderError};
pub use event::{Entry, EventKind};
pub use filter::EventFilter;
pub use labels::{EnforceLabel, EnforceLabels};
pub use metrics::MetricFamilies;
pub use recorder::{Observer, Recorder, RecorderBuilder};
pub use registry::{Target, default_registry};
