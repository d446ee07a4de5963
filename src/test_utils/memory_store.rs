use crate::datamodel::measure_datetime::MeasureDateTimeExt;
use crate::datamodel::{Measurement, MetricSpec, Resource, ResourceMetrics};
use crate::error::{Error, Result};
use crate::store::{MeasureStore, MeasuresQuery};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// In-memory [`MeasureStore`] with failure injection and call counters.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    resources: BTreeMap<String, Resource>,
    measures: HashMap<String, Vec<Measurement>>,
    credential_expired: bool,
    create_calls: usize,
    push_calls: usize,
    query_calls: usize,
    push_failure: Option<(usize, u16)>,
    query_failure: Option<(usize, u16)>,
    failing_metrics: HashMap<String, u16>,
    last_query: Option<MeasuresQuery>,
}

fn injected(operation: &'static str, status: u16) -> Error {
    if status == 401 {
        Error::CredentialExpired
    } else {
        Error::StoreOperationFailed {
            operation,
            status,
            body: "injected failure".to_string(),
        }
    }
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn insert_resource(&self, id: &str, metrics: &[(&str, &str)]) {
        let resource = Resource {
            id: id.to_string(),
            original_resource_id: Some(id.to_string()),
            metrics: metrics
                .iter()
                .map(|(name, metric_id)| (name.to_string(), metric_id.to_string()))
                .collect(),
        };
        self.state().resources.insert(id.to_string(), resource);
    }

    pub fn insert_measures(&self, metric_id: &str, measurements: &[Measurement]) {
        self.state()
            .measures
            .entry(metric_id.to_string())
            .or_default()
            .extend_from_slice(measurements);
    }

    pub fn resource(&self, id: &str) -> Option<Resource> {
        self.state().resources.get(id).cloned()
    }

    pub fn measures(&self, metric_id: &str) -> Vec<Measurement> {
        self.state()
            .measures
            .get(metric_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every following call answers as if the token had expired.
    pub fn expire_credential(&self) {
        self.state().credential_expired = true;
    }

    /// Pushes after the first `successes` ones fail with `status`.
    pub fn fail_pushes_after(&self, successes: usize, status: u16) {
        self.state().push_failure = Some((successes, status));
    }

    /// Queries after the first `successes` ones fail with `status`.
    pub fn fail_queries_after(&self, successes: usize, status: u16) {
        self.state().query_failure = Some((successes, status));
    }

    /// Every push or query on this metric fails with `status`.
    pub fn fail_metric(&self, metric_id: &str, status: u16) {
        self.state()
            .failing_metrics
            .insert(metric_id.to_string(), status);
    }

    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    pub fn push_calls(&self) -> usize {
        self.state().push_calls
    }

    pub fn query_calls(&self) -> usize {
        self.state().query_calls
    }

    pub fn last_query(&self) -> Option<MeasuresQuery> {
        self.state().last_query.clone()
    }
}

#[async_trait]
impl MeasureStore for MemoryStore {
    async fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        let state = self.state();
        if state.credential_expired {
            return Err(Error::CredentialExpired);
        }
        Ok(state.resources.get(id).cloned())
    }

    async fn create_or_get_resource(
        &self,
        id: &str,
        metric_specs: &[MetricSpec],
    ) -> Result<Resource> {
        let mut state = self.state();
        if state.credential_expired {
            return Err(Error::CredentialExpired);
        }
        if let Some(resource) = state.resources.get(id) {
            return Ok(resource.clone());
        }

        state.create_calls += 1;
        let metrics: ResourceMetrics = metric_specs
            .iter()
            .map(|spec| (spec.name.clone(), Uuid::new_v4().to_string()))
            .collect();
        let resource = Resource {
            id: id.to_string(),
            original_resource_id: Some(id.to_string()),
            metrics,
        };
        state.resources.insert(id.to_string(), resource.clone());
        Ok(resource)
    }

    async fn push_measurement(&self, metric_id: &str, measurement: &Measurement) -> Result<()> {
        let mut state = self.state();
        state.push_calls += 1;
        if state.credential_expired {
            return Err(Error::CredentialExpired);
        }
        if let Some((successes, status)) = state.push_failure {
            if state.push_calls > successes {
                return Err(injected("push_measurement", status));
            }
        }
        if let Some(status) = state.failing_metrics.get(metric_id) {
            return Err(injected("push_measurement", *status));
        }

        state
            .measures
            .entry(metric_id.to_string())
            .or_default()
            .push(*measurement);
        Ok(())
    }

    async fn query_measurements(
        &self,
        metric_id: &str,
        query: &MeasuresQuery,
    ) -> Result<Vec<Measurement>> {
        let mut state = self.state();
        state.query_calls += 1;
        state.last_query = Some(query.clone());
        if state.credential_expired {
            return Err(Error::CredentialExpired);
        }
        if let Some((successes, status)) = state.query_failure {
            if state.query_calls > successes {
                return Err(injected("query_measurements", status));
            }
        }
        if let Some(status) = state.failing_metrics.get(metric_id) {
            return Err(injected("query_measurements", *status));
        }

        let start = query.start.map(|start| start.to_unix_microseconds_i64());
        let stop = query.stop.map(|stop| stop.to_unix_microseconds_i64());
        let mut measurements: Vec<Measurement> = state
            .measures
            .get(metric_id)
            .map(|measures| {
                measures
                    .iter()
                    .filter(|m| {
                        let timestamp = m.timestamp.to_unix_microseconds_i64();
                        start.is_none_or(|start| timestamp >= start)
                            && stop.is_none_or(|stop| timestamp < stop)
                    })
                    .map(|m| Measurement {
                        granularity: query.granularity,
                        ..*m
                    })
                    .collect()
            })
            .unwrap_or_default();
        measurements.sort_by_key(|m| m.timestamp.to_unix_microseconds_i64());
        Ok(measurements)
    }

    async fn list_resources(&self) -> Result<Vec<Resource>> {
        let state = self.state();
        if state.credential_expired {
            return Err(Error::CredentialExpired);
        }
        Ok(state.resources.values().cloned().collect())
    }
}
