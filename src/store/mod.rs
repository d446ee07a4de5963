pub mod gnocchi;
pub mod query;

pub use gnocchi::{AuthScheme, GnocchiClient, StoreSettings};
pub use query::{Aggregation, MeasuresQuery, Resample};

use crate::datamodel::measure_datetime::now;
use crate::datamodel::{Measurement, MetricSpec, Resource};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Typed operations against the measurement store.
///
/// Implementations classify every failure into [`crate::Error`] and never
/// retry: retry policy belongs to the caller.
#[async_trait]
pub trait MeasureStore: Send + Sync + Debug {
    /// Returns `None` when the store does not know the resource.
    async fn get_resource(&self, id: &str) -> Result<Option<Resource>>;

    /// Returns the resource, creating it with the given metrics if absent.
    async fn create_or_get_resource(&self, id: &str, metric_specs: &[MetricSpec])
    -> Result<Resource>;

    async fn push_measurement(&self, metric_id: &str, measurement: &Measurement) -> Result<()>;

    /// Pushes a value timestamped with the current time.
    async fn push_value(&self, metric_id: &str, value: f64) -> Result<()> {
        let measurement = Measurement::new(now()?, value);
        self.push_measurement(metric_id, &measurement).await
    }

    async fn query_measurements(
        &self,
        metric_id: &str,
        query: &MeasuresQuery,
    ) -> Result<Vec<Measurement>>;

    async fn list_resources(&self) -> Result<Vec<Resource>>;
}
