//! Configuration management for meterbox.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Builder-style programmatic construction
//! - Validation and defaults

use crate::core::{MetricsError, Result};
use crate::metrics::sample::{SampleKind, DEFAULT_ALPHA, DEFAULT_RESERVOIR_SIZE, RESCALE_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Percentiles reported for histograms and timers unless configured otherwise.
pub const DEFAULT_PERCENTILES: [f64; 6] = [0.5, 0.75, 0.95, 0.98, 0.99, 0.999];

/// Complete configuration for meterbox
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry and dispatch configuration
    pub registry: RegistryConfig,
    /// Histogram reservoir configuration
    pub sampling: SamplingConfig,
    /// Reporting configuration
    pub reporting: ReportingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How metric mailboxes execute their messages
    pub dispatch: DispatchMode,
    /// Worker threads for pooled dispatch
    pub workers: usize,
    /// Messages a mailbox drains per turn before yielding its worker
    pub throughput: usize,
}

/// Sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Reservoir flavour for histograms
    pub kind: SampleKind,
    /// Reservoir capacity
    pub reservoir_size: usize,
    /// Forward-decay factor for biased reservoirs
    pub alpha: f64,
    /// Interval between landmark rescales
    #[serde(with = "humantime_serde")]
    pub rescale_interval: Duration,
}

/// Reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Interval between scheduled reports
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Percentiles reported for histograms and timers, in [0, 1]
    pub percentiles: Vec<f64>,
    /// Emit value sets as JSON
    pub structured: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
}

/// Mailbox dispatch modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Producers execute messages on their own thread, one at a time
    Inline,
    /// Producers enqueue and return; a worker pool drains mailboxes
    Pooled,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            registry: RegistryConfig::default(),
            sampling: SamplingConfig::default(),
            reporting: ReportingConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            dispatch: DispatchMode::Inline,
            workers: 4,
            throughput: 64,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            kind: SampleKind::Biased,
            reservoir_size: DEFAULT_RESERVOIR_SIZE,
            alpha: DEFAULT_ALPHA,
            rescale_interval: RESCALE_THRESHOLD,
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        ReportingConfig {
            interval: Duration::from_secs(10),
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            structured: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        ConfigBuilder::new().from_yaml(&content)?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Registry validation
        if self.registry.workers == 0 {
            return Err(MetricsError::config("workers must be greater than 0"));
        }

        if self.registry.throughput == 0 {
            return Err(MetricsError::config("throughput must be greater than 0"));
        }

        // Sampling validation
        if self.sampling.reservoir_size == 0 {
            return Err(MetricsError::InvalidCapacity(0));
        }

        if !self.sampling.alpha.is_finite() || self.sampling.alpha < 0.0 {
            return Err(MetricsError::config(format!(
                "alpha must be a finite, non-negative number, got {}",
                self.sampling.alpha
            )));
        }

        if self.sampling.rescale_interval.is_zero() {
            return Err(MetricsError::config("rescale_interval must be greater than 0"));
        }

        // Reporting validation
        if self.reporting.interval.is_zero() {
            return Err(MetricsError::config("reporting interval must be greater than 0"));
        }

        for p in &self.reporting.percentiles {
            if !(0.0..=1.0).contains(p) {
                return Err(MetricsError::config(format!(
                    "Percentiles must be between 0 and 1, got {}",
                    p
                )));
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Debug)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)?;
        Ok(self)
    }

    /// Set dispatch mode
    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.config.registry.dispatch = mode;
        self
    }

    /// Set pooled worker count
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.registry.workers = workers;
        self
    }

    /// Set per-turn mailbox throughput
    pub fn throughput(mut self, throughput: usize) -> Self {
        self.config.registry.throughput = throughput;
        self
    }

    /// Set reservoir flavour
    pub fn sample_kind(mut self, kind: SampleKind) -> Self {
        self.config.sampling.kind = kind;
        self
    }

    /// Set reservoir capacity
    pub fn reservoir_size(mut self, size: usize) -> Self {
        self.config.sampling.reservoir_size = size;
        self
    }

    /// Set decay factor
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.sampling.alpha = alpha;
        self
    }

    /// Set reporting interval
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.config.reporting.interval = interval;
        self
    }

    /// Set reported percentiles
    pub fn percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.config.reporting.percentiles = percentiles;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
