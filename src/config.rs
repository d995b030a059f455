//! Configuration manager for casbin-metrics.

use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event::EventKind;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Related to recorder construction.
    pub metrics: Metrics,
    /// Related to the simulation driver.
    pub simulation: Simulation,
    #[serde(skip)]
    path: PathBuf,
}

/// Recorder configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// Optional enforce labels: `subject`, `object`, `action`.
    /// Other names are ignored.
    pub enforce_labels: Vec<String>,
    /// Kinds of events to record. Empty means every kind.
    pub event_kinds: Vec<EventKind>,
    /// Buckets of duration histograms.
    /// Default is Prometheus default buckets.
    pub buckets: Option<Vec<f64>>,
}

/// Simulation driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Simulation {
    /// Listening address of the `/metrics` endpoint.
    pub address: String,
    /// Time between two simulated requests.
    pub interval_ms: u64,
    /// Chance of a policy change on each iteration.
    pub policy_change_chance: f64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_owned(),
            interval_ms: 100,
            policy_change_chance: 0.01,
        }
    }
}

impl Simulation {
    /// Parsed listening address.
    pub fn address(&self) -> Result<SocketAddr, ConfigError> {
        self.address
            .parse()
            .map_err(|source| ConfigError::Address {
                address: self.address.clone(),
                source,
            })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    fn file_path(&self) -> &Path {
        if self.path.is_file() {
            &self.path
        } else {
            Path::new(DEFAULT_CONFIG_PATH)
        }
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn try_read(self) -> Result<Self, ConfigError> {
        let file = File::open(self.file_path())?;
        let config: Configuration = serde_yaml::from_reader(file)?;

        Ok(Self {
            path: self.path,
            ..config
        })
    }

    /// Same as [`Configuration::try_read`] but falls back to defaults.
    pub fn read(self) -> Self {
        let path = self.file_path().to_path_buf();

        match self.try_read() {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    path = %path.display(),
                    "configuration not loaded, using defaults"
                );
                Self::default()
            },
        }
    }
}
