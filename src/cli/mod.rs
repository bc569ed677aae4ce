//! Command-line interface for meterbox.
//!
//! Runs a synthetic concurrent workload against every metric kind while a
//! scheduled reporter logs the registry, which makes it easy to see how the
//! dispatch and sampling settings behave.

use crate::core::{Config, DispatchMode, MetricName, MetricsError, Result};
use crate::registry::{AsyncMetricsRegistry, MetricsRegistry};
use crate::reporting::{Reporter, ScheduledReporter, TracingReporter};
use clap::Parser;
use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-process metrics engine demo
#[derive(Parser, Debug)]
#[command(name = "meterbox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (YAML)
    #[arg(short, long, env = "METERBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "METERBOX_DEBUG")]
    pub debug: bool,

    /// How long to run the workload, in seconds
    #[arg(long, default_value_t = 10)]
    pub duration: u64,

    /// Number of producer threads
    #[arg(long, default_value_t = 4)]
    pub producers: usize,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration: file if given, then command-line overrides.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::new()?,
        };
        config.debug = self.debug;
        Ok(config)
    }

    /// Workload run time.
    pub fn run_time(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        // Determine log level
        let env_log_level = std::env::var("METERBOX_LOG_LEVEL").ok();
        let log_level = if self.debug {
            "debug"
        } else {
            env_log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(self.debug)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| MetricsError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the meterbox command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Dispatch: {:?}", config.registry.dispatch);
        println!("  Workers: {}", config.registry.workers);
        println!("  Reservoir: {:?} x {}", config.sampling.kind, config.sampling.reservoir_size);
        println!("  Report interval: {:?}", config.reporting.interval);
        return Ok(());
    }

    cli.init_logging(&config)?;

    if cli.producers == 0 {
        return Err(MetricsError::config("producers must be greater than 0"));
    }

    // The async registry owns its worker pool and must outlive the workload
    let (registry, pooled) = match config.registry.dispatch {
        DispatchMode::Inline => (Arc::new(MetricsRegistry::from_config(&config)?), None),
        DispatchMode::Pooled => {
            let pooled = AsyncMetricsRegistry::from_config(&config)?;
            (Arc::clone(pooled.registry()), Some(pooled))
        },
    };

    let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter::new(config.reporting.structured));
    let scheduled =
        ScheduledReporter::start(Arc::clone(&registry), reporter, config.reporting.interval);

    tracing::info!(
        "Running workload: {} producers for {:?} ({:?} dispatch)",
        cli.producers,
        cli.run_time(),
        config.registry.dispatch
    );

    let stop = Arc::new(AtomicBool::new(false));
    let producers: Vec<_> = (0..cli.producers)
        .map(|index| {
            let registry = Arc::clone(&registry);
            let stop = Arc::clone(&stop);
            tokio::task::spawn_blocking(move || run_producer(index, &registry, &stop))
        })
        .collect();

    tokio::select! {
        _ = tokio::time::sleep(cli.run_time()) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping...");
        }
    }

    stop.store(true, Ordering::Release);
    let mut operations = 0_u64;
    for producer in producers {
        match producer.await {
            Ok(Ok(count)) => operations += count,
            Ok(Err(e)) => tracing::error!("Producer failed: {} ({})", e, e.category()),
            Err(e) => tracing::error!("Producer task failed: {}", e),
        }
    }

    scheduled.stop().await;
    tracing::info!("Workload finished after {} operations", operations);

    if let Some(pooled) = pooled {
        pooled.shutdown();
    }
    Ok(())
}

fn run_producer(index: usize, registry: &MetricsRegistry, stop: &AtomicBool) -> Result<u64> {
    let requests = registry.counter(MetricName::new("meterbox", "Workload", "requests"))?;
    let payload = registry.histogram(MetricName::new("meterbox", "Workload", "payload_bytes"))?;
    let arrivals = registry.meter(MetricName::new("meterbox", "Workload", "arrivals"))?;
    let latency = registry.timer(MetricName::new("meterbox", "Workload", "latency"))?;
    let in_flight = registry.counter(
        MetricName::new("meterbox", "Workload", "in_flight")
            .with_scope(format!("producer-{index}")),
    )?;

    let mut rng = rand::thread_rng();
    let mut operations = 0_u64;
    while !stop.load(Ordering::Acquire) {
        in_flight.inc();
        requests.inc();
        arrivals.mark_one();
        payload.update(rng.gen_range(64.0..16_384.0));

        let work = Duration::from_micros(rng.gen_range(50..2_000));
        latency.time(|| std::thread::sleep(work));
        in_flight.dec();
        operations += 1;
    }

    Ok(operations)
}
