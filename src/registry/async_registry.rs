use crate::core::{default_clock, Clock, Config, Result};
use crate::mailbox::{Dispatch, Executor, PooledExecutor};
use crate::metrics::MetricSettings;
use crate::registry::{settings_from_config, MetricsRegistry};
use std::ops::Deref;
use std::sync::Arc;

/// Registry whose metrics all use pooled dispatch on a supplied executor.
///
/// Producer calls never block beyond a queue append. A read posted after a write
/// from the same thread still observes it; a write is only guaranteed visible to
/// other threads once it has been drained.
///
/// Dereferences to [`MetricsRegistry`] for the whole registry API.
pub struct AsyncMetricsRegistry {
    registry: Arc<MetricsRegistry>,
    // Set when the registry spawned its own workers.
    pool: Option<Arc<PooledExecutor>>,
}

impl AsyncMetricsRegistry {
    /// Use an externally managed `executor`.
    pub fn new(executor: Arc<dyn Executor>, throughput: usize, clock: Arc<dyn Clock>) -> Self {
        let settings = MetricSettings::new(clock).with_dispatch(Dispatch::Pooled {
            executor,
            throughput,
        });
        Self {
            registry: Arc::new(MetricsRegistry::new(settings)),
            pool: None,
        }
    }

    /// Spawn `config.registry.workers` threads and build metrics from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(PooledExecutor::with_name(
            config.registry.workers,
            "meterbox-mailbox",
        )?);
        let executor = Arc::clone(&pool) as Arc<dyn Executor>;
        let settings =
            settings_from_config(config, default_clock()).with_dispatch(Dispatch::Pooled {
                executor,
                throughput: config.registry.throughput,
            });

        Ok(Self {
            registry: Arc::new(MetricsRegistry::new(settings)),
            pool: Some(pool),
        })
    }

    /// Shared handle to the underlying registry.
    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    /// Stop the workers this registry spawned. Metric updates after this are
    /// dropped and blocking reads fail with `ReplyLost`.
    pub fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown();
        }
    }
}

impl Deref for AsyncMetricsRegistry {
    type Target = MetricsRegistry;

    fn deref(&self) -> &MetricsRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for AsyncMetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncMetricsRegistry")
            .field("registry", &self.registry)
            .field("owns_pool", &self.pool.is_some())
            .finish()
    }
}
