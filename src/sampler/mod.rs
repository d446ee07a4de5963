pub mod gauges;

pub use gauges::{GaugeSource, MemoryUsage, SysinfoGauges};

use crate::bootstrap::{CPU_METRIC, MEMORY_METRIC, ResourceBootstrap};
use crate::datamodel::ResourceMetrics;
use crate::error::{Error, Result};
use crate::identity::IdentityProvider;
use crate::store::MeasureStore;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// One reading of the host gauges, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub cpu: f64,
    pub memory: f64,
}

/// Periodically pushes the host gauges to their metrics.
pub struct Sampler {
    store: Arc<dyn MeasureStore>,
    gauges: Box<dyn GaugeSource>,
    cpu_metric_id: String,
    memory_metric_id: String,
    interval: Duration,
}

impl Sampler {
    pub fn new(
        store: Arc<dyn MeasureStore>,
        gauges: Box<dyn GaugeSource>,
        metrics: &ResourceMetrics,
        interval: Duration,
    ) -> Result<Self> {
        let metric_id = |name: &str| {
            metrics
                .get(name)
                .cloned()
                .ok_or_else(|| Error::configuration(format!("Missing {} metric", name)))
        };
        if interval.is_zero() {
            return Err(Error::configuration("The sampling interval cannot be zero"));
        }

        Ok(Self {
            store,
            gauges,
            cpu_metric_id: metric_id(CPU_METRIC)?,
            memory_metric_id: metric_id(MEMORY_METRIC)?,
            interval,
        })
    }

    /// Reads both gauges and pushes them. Fails on the first failed push.
    pub async fn sample_once(&mut self) -> Result<Sample> {
        let sample = Sample {
            cpu: self.gauges.cpu_percent(),
            memory: self.gauges.memory().percent(),
        };

        self.store.push_value(&self.cpu_metric_id, sample.cpu).await?;
        self.store
            .push_value(&self.memory_metric_id, sample.memory)
            .await?;

        debug!(
            "Pushed new measurement. CPU: {:.2}% Memory: {:.2}%",
            sample.cpu, sample.memory
        );
        Ok(sample)
    }

    /// Samples forever, one cycle per interval, starting immediately.
    /// Only returns on failure.
    pub async fn run(mut self) -> Result<Infallible> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.interval, "Sampling started");
        loop {
            ticker.tick().await;
            self.sample_once().await?;
        }
    }
}

/// Bootstraps the host resource, then samples until something fails.
///
/// Bootstrap is attempted once: its errors end the run like any push error.
pub async fn produce(
    store: Arc<dyn MeasureStore>,
    identity: &dyn IdentityProvider,
    gauges: Box<dyn GaugeSource>,
    interval: Duration,
) -> Result<Infallible> {
    let identity = identity.machine_identity()?;
    info!(%identity, "Machine identity");

    let metrics = ResourceBootstrap::new(store.clone())
        .ensure(&identity)
        .await?;

    Sampler::new(store, gauges, &metrics, interval)?.run().await
}
