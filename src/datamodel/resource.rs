use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric name to metric identifier, as assigned by the store.
pub type ResourceMetrics = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Resource {
    pub id: String,
    /// Gnocchi rewrites non-UUID identifiers and keeps the given one here.
    #[serde(default)]
    pub original_resource_id: Option<String>,
    #[serde(default)]
    pub metrics: ResourceMetrics,
}

impl Resource {
    /// The identifier the resource was created with.
    pub fn display_id(&self) -> &str {
        self.original_resource_id.as_deref().unwrap_or(&self.id)
    }

    pub fn metric_id(&self, name: &str) -> Option<&str> {
        self.metrics.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpec {
    pub name: String,
    pub archive_policy_name: String,
}

impl MetricSpec {
    pub fn new(name: &str, archive_policy_name: &str) -> Self {
        Self {
            name: name.to_string(),
            archive_policy_name: archive_policy_name.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MetricDefinition<'a> {
    archive_policy_name: &'a str,
}

/// Body of `POST /v1/resource/generic`.
#[derive(Debug, Serialize)]
pub struct CreateResourceRequest<'a> {
    id: &'a str,
    project_id: &'a str,
    user_id: &'a str,
    metrics: BTreeMap<&'a str, MetricDefinition<'a>>,
}

impl<'a> CreateResourceRequest<'a> {
    pub fn new(
        id: &'a str,
        project_id: &'a str,
        user_id: &'a str,
        metric_specs: &'a [MetricSpec],
    ) -> Self {
        Self {
            id,
            project_id,
            user_id,
            metrics: metric_specs
                .iter()
                .map(|spec| {
                    (
                        spec.name.as_str(),
                        MetricDefinition {
                            archive_policy_name: &spec.archive_policy_name,
                        },
                    )
                })
                .collect(),
        }
    }
}
