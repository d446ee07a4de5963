use crate::datamodel::MeasureDateTime;
use crate::datamodel::measure_datetime::MeasureDateTimeExt;
use crate::store::{AuthScheme, StoreSettings};
use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

pub const FAKE_TOKEN: &str = "fake-token";

#[derive(Debug, Default)]
struct FakeState {
    token: String,
    expired: bool,
    failure: Option<u16>,
    corrupt_measures: bool,
    preset_metric_ids: HashMap<String, String>,
    resources: BTreeMap<String, Value>,
    // metric id -> (unix seconds, value)
    measures: HashMap<String, Vec<(f64, f64)>>,
    create_calls: usize,
    last_query: Vec<(String, String)>,
}

type SharedState = Arc<Mutex<FakeState>>;

/// Gnocchi REST API served in memory on an ephemeral local port.
pub struct FakeGnocchi {
    base_url: Url,
    state: SharedState,
    handle: JoinHandle<()>,
}

impl FakeGnocchi {
    pub async fn start() -> Result<Self> {
        let state = Arc::new(Mutex::new(FakeState {
            token: FAKE_TOKEN.to_string(),
            ..Default::default()
        }));

        let app = Router::new()
            .route(
                "/v1/resource/generic",
                get(list_resources).post(create_resource),
            )
            .route("/v1/resource/generic/{id}", get(get_resource))
            .route(
                "/v1/metric/{metric_id}/measures",
                get(get_measures).post(post_measures),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: Url::parse(&format!("http://{}/", address))?,
            state,
            handle,
        })
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Client settings matching this server.
    pub fn settings(&self) -> StoreSettings {
        StoreSettings {
            url: self.base_url.clone(),
            token: FAKE_TOKEN.to_string(),
            auth_scheme: AuthScheme::Keystone,
            project_id: "fake-project".to_string(),
            user_id: "fake-user".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Identifiers given to metrics created from now on, by metric name.
    pub fn preset_metric_ids(&self, ids: &[(&str, &str)]) {
        self.state().preset_metric_ids = ids
            .iter()
            .map(|(name, id)| (name.to_string(), id.to_string()))
            .collect();
    }

    pub fn expire_token(&self) {
        self.state().expired = true;
    }

    /// Every request is answered with `status`.
    pub fn fail_with(&self, status: u16) {
        self.state().failure = Some(status);
    }

    /// Measures are answered with a body that is not a list of rows.
    pub fn corrupt_measures(&self) {
        self.state().corrupt_measures = true;
    }

    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    pub fn resource(&self, id: &str) -> Option<Value> {
        self.state().resources.get(id).cloned()
    }

    /// Pushed measures of a metric, as `(unix seconds, value)`.
    pub fn measures(&self, metric_id: &str) -> Vec<(f64, f64)> {
        self.state()
            .measures
            .get(metric_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn last_query(&self) -> Vec<(String, String)> {
        self.state().last_query.clone()
    }
}

impl Drop for FakeGnocchi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Authentication and injected failures, shared by every handler.
fn check(state: &FakeState, headers: &HeaderMap) -> Option<Response> {
    let presented = headers
        .get("x-auth-token")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::to_string)
        });

    if state.expired || presented.as_deref() != Some(state.token.as_str()) {
        return Some((StatusCode::UNAUTHORIZED, "The request you have made requires authentication.").into_response());
    }
    if let Some(status) = state.failure {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return Some((status, "injected failure").into_response());
    }
    None
}

async fn get_resource(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let state = state.lock().unwrap();
    if let Some(response) = check(&state, &headers) {
        return response;
    }
    match state.resources.get(&id) {
        Some(resource) => Json(resource.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"description": format!("Resource {} does not exist", id)})),
        )
            .into_response(),
    }
}

async fn list_resources(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let state = state.lock().unwrap();
    if let Some(response) = check(&state, &headers) {
        return response;
    }
    let resources: Vec<Value> = state.resources.values().cloned().collect();
    Json(resources).into_response()
}

async fn create_resource(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(response) = check(&state, &headers) {
        return response;
    }
    state.create_calls += 1;

    let Some(id) = body["id"].as_str().map(str::to_string) else {
        return (StatusCode::BAD_REQUEST, "missing id").into_response();
    };
    if state.resources.contains_key(&id) {
        return (StatusCode::CONFLICT, "Resource already exists").into_response();
    }

    let mut metrics = serde_json::Map::new();
    if let Some(requested) = body["metrics"].as_object() {
        for (name, definition) in requested {
            if definition["archive_policy_name"].as_str().is_none() {
                return (StatusCode::BAD_REQUEST, "missing archive_policy_name").into_response();
            }
            let metric_id = state
                .preset_metric_ids
                .get(name)
                .cloned()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            metrics.insert(name.clone(), Value::String(metric_id));
        }
    }

    let resource = json!({
        "id": Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string(),
        "original_resource_id": id,
        "type": "generic",
        "project_id": body["project_id"],
        "user_id": body["user_id"],
        "metrics": metrics,
    });
    state.resources.insert(id, resource.clone());
    (StatusCode::CREATED, Json(resource)).into_response()
}

fn known_metric(state: &FakeState, metric_id: &str) -> bool {
    state.resources.values().any(|resource| {
        resource["metrics"]
            .as_object()
            .is_some_and(|metrics| metrics.values().any(|id| id == metric_id))
    })
}

async fn post_measures(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(metric_id): Path<String>,
    Json(body): Json<Vec<Value>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(response) = check(&state, &headers) {
        return response;
    }
    if !known_metric(&state, &metric_id) {
        return (StatusCode::NOT_FOUND, "Metric not found").into_response();
    }

    let mut accepted = Vec::with_capacity(body.len());
    for measure in &body {
        let timestamp = match &measure["timestamp"] {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => MeasureDateTime::from_iso8601(text)
                .ok()
                .map(|epoch| epoch.to_unix_seconds()),
            _ => None,
        };
        match (timestamp, measure["value"].as_f64()) {
            (Some(timestamp), Some(value)) => accepted.push((timestamp, value)),
            _ => return (StatusCode::BAD_REQUEST, "invalid measure").into_response(),
        }
    }
    state.measures.entry(metric_id).or_default().extend(accepted);
    StatusCode::ACCEPTED.into_response()
}

async fn get_measures(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(metric_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.last_query = params.clone();
    if let Some(response) = check(&state, &headers) {
        return response;
    }
    if !known_metric(&state, &metric_id) {
        return (StatusCode::NOT_FOUND, "Metric not found").into_response();
    }
    if state.corrupt_measures {
        return Json(json!({"measures": "unavailable"})).into_response();
    }

    let param = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.parse::<f64>().ok())
    };
    let start = param("start");
    let granularity = param("resample").or(param("granularity")).unwrap_or(1.0);

    let mut rows: Vec<(f64, f64)> = state
        .measures
        .get(&metric_id)
        .map(|measures| {
            measures
                .iter()
                .filter(|(timestamp, _)| start.is_none_or(|start| *timestamp >= start))
                .copied()
                .collect()
        })
        .unwrap_or_default();
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));

    let body: Vec<Value> = rows
        .into_iter()
        .map(|(timestamp, value)| {
            let micros = (timestamp * 1_000_000.0).round() as i64;
            json!([
                MeasureDateTime::from_unix_microseconds_i64(micros).to_iso8601_utc(),
                granularity,
                value
            ])
        })
        .collect();
    Json(body).into_response()
}
