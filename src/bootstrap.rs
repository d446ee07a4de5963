use crate::datamodel::{MetricSpec, ResourceMetrics};
use crate::error::{Error, Result};
use crate::identity::MachineIdentity;
use crate::store::MeasureStore;
use std::sync::Arc;
use tracing::info;

pub const CPU_METRIC: &str = "cpu";
pub const MEMORY_METRIC: &str = "memory";
pub const DEFAULT_ARCHIVE_POLICY: &str = "high";

/// Metrics every sampled host carries.
pub fn host_metric_specs() -> Vec<MetricSpec> {
    vec![
        MetricSpec::new(CPU_METRIC, DEFAULT_ARCHIVE_POLICY),
        MetricSpec::new(MEMORY_METRIC, DEFAULT_ARCHIVE_POLICY),
    ]
}

/// Makes sure the resource of a host exists before anything is pushed to it.
#[derive(Debug, Clone)]
pub struct ResourceBootstrap {
    store: Arc<dyn MeasureStore>,
    metric_specs: Vec<MetricSpec>,
}

impl ResourceBootstrap {
    pub fn new(store: Arc<dyn MeasureStore>) -> Self {
        Self {
            store,
            metric_specs: host_metric_specs(),
        }
    }

    /// Returns the metric name to id mapping of the host, creating the
    /// resource on first use. Store errors are returned unchanged.
    pub async fn ensure(&self, identity: &MachineIdentity) -> Result<ResourceMetrics> {
        let resource = self
            .store
            .create_or_get_resource(identity.as_str(), &self.metric_specs)
            .await?;

        for spec in &self.metric_specs {
            if resource.metric_id(&spec.name).is_none() {
                return Err(Error::configuration(format!(
                    "Resource {} has no {} metric",
                    identity, spec.name
                )));
            }
        }

        info!(resource_id = %identity, metrics = ?resource.metrics, "Resource ready");
        Ok(resource.metrics)
    }
}
