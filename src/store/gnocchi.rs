use super::{MeasureStore, MeasuresQuery};
use crate::datamodel::measurement::MeasurePayload;
use crate::datamodel::resource::CreateResourceRequest;
use crate::datamodel::{Measurement, MetricSpec, Resource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// How the credential is presented to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `X-Auth-Token: <token>`, as issued by Keystone.
    #[default]
    Keystone,
    /// `Authorization: Bearer <token>`.
    Bearer,
}

impl FromStr for AuthScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keystone" | "x-auth-token" => Ok(AuthScheme::Keystone),
            "bearer" => Ok(AuthScheme::Bearer),
            _ => Err(Error::configuration(format!("Invalid auth scheme: {}", s))),
        }
    }
}

/// Everything needed to build a [`GnocchiClient`].
#[derive(Clone)]
pub struct StoreSettings {
    pub url: Url,
    pub token: String,
    pub auth_scheme: AuthScheme,
    pub project_id: String,
    pub user_id: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("url", &self.url.as_str())
            .field("token", &"<redacted>")
            .field("auth_scheme", &self.auth_scheme)
            .field("project_id", &self.project_id)
            .field("user_id", &self.user_id)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Client for the Gnocchi REST API.
#[derive(Debug, Clone)]
pub struct GnocchiClient {
    http: reqwest::Client,
    base_url: Url,
    project_id: String,
    user_id: String,
}

impl GnocchiClient {
    pub fn new(settings: StoreSettings) -> Result<Self> {
        let StoreSettings {
            url,
            token,
            auth_scheme,
            project_id,
            user_id,
            request_timeout,
        } = settings;

        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "Invalid store URL: {}",
                url.as_str()
            )));
        }

        let (header_name, header_value) = match auth_scheme {
            AuthScheme::Keystone => (HeaderName::from_static("x-auth-token"), token),
            AuthScheme::Bearer => (header::AUTHORIZATION, format!("Bearer {}", token)),
        };
        let mut header_value = HeaderValue::from_str(&header_value)
            .map_err(|_| Error::configuration("The token contains invalid characters"))?;
        header_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header_name, header_value);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::configuration(format!("Unable to build the HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: url,
            project_id,
            user_id,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in new(): the base URL is http(s), so it has path segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|source| Error::Network { operation, source })
    }

    async fn fetch_resource(&self, id: &str) -> Result<Option<Resource>> {
        let url = self.endpoint(&["v1", "resource", "generic", id]);
        debug!(%url, "Fetching resource");
        let response = self.send("get_resource", self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = classify("get_resource", response).await?;
        decode("get_resource", response).await.map(Some)
    }
}

/// Maps a response status onto the error taxonomy.
async fn classify(operation: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::CredentialExpired);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::StoreOperationFailed {
            operation,
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|source| Error::Network { operation, source })?;
    serde_json::from_slice(&bytes).map_err(|e| Error::InvalidResponse {
        operation,
        details: e.to_string(),
    })
}

#[async_trait]
impl MeasureStore for GnocchiClient {
    async fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        self.fetch_resource(id).await
    }

    async fn create_or_get_resource(
        &self,
        id: &str,
        metric_specs: &[MetricSpec],
    ) -> Result<Resource> {
        if let Some(resource) = self.fetch_resource(id).await? {
            return Ok(resource);
        }

        info!(resource_id = id, "Creating resource");
        let body = CreateResourceRequest::new(id, &self.project_id, &self.user_id, metric_specs);
        let url = self.endpoint(&["v1", "resource", "generic"]);
        let response = self
            .send("create_resource", self.http.post(url).json(&body))
            .await?;

        // Someone else created it between our GET and POST
        if response.status() == StatusCode::CONFLICT {
            return self.fetch_resource(id).await?.ok_or_else(|| {
                Error::InvalidResponse {
                    operation: "create_resource",
                    details: format!("resource {} conflicts but cannot be found", id),
                }
            });
        }

        let response = classify("create_resource", response).await?;
        decode("create_resource", response).await
    }

    async fn push_measurement(&self, metric_id: &str, measurement: &Measurement) -> Result<()> {
        let url = self.endpoint(&["v1", "metric", metric_id, "measures"]);
        let body = [MeasurePayload::from(measurement)];
        let response = self
            .send("push_measurement", self.http.post(url).json(&body))
            .await?;
        classify("push_measurement", response).await?;
        Ok(())
    }

    async fn query_measurements(
        &self,
        metric_id: &str,
        query: &MeasuresQuery,
    ) -> Result<Vec<Measurement>> {
        let url = self.endpoint(&["v1", "metric", metric_id, "measures"]);
        let params = query.to_query_params();
        debug!(%url, ?params, "Querying measures");
        let response = self
            .send("query_measurements", self.http.get(url).query(&params))
            .await?;
        let response = classify("query_measurements", response).await?;
        let rows: Vec<(String, f64, f64)> = decode("query_measurements", response).await?;

        rows.iter()
            .map(|row| {
                Measurement::from_row(row).map_err(|e| Error::InvalidResponse {
                    operation: "query_measurements",
                    details: e.to_string(),
                })
            })
            .collect()
    }

    async fn list_resources(&self) -> Result<Vec<Resource>> {
        let url = self.endpoint(&["v1", "resource", "generic"]);
        let response = self.send("list_resources", self.http.get(url)).await?;
        let response = classify("list_resources", response).await?;
        decode("list_resources", response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> StoreSettings {
        StoreSettings {
            url: Url::parse(url).unwrap(),
            token: "secret-token".to_string(),
            auth_scheme: AuthScheme::Keystone,
            project_id: "project".to_string(),
            user_id: "user".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_auth_scheme_from_str() {
        assert_eq!("keystone".parse::<AuthScheme>().unwrap(), AuthScheme::Keystone);
        assert_eq!("Bearer".parse::<AuthScheme>().unwrap(), AuthScheme::Bearer);
        assert!("basic".parse::<AuthScheme>().is_err());
    }

    #[test]
    fn test_endpoint() {
        let client = GnocchiClient::new(settings("http://127.0.0.1:8041/")).unwrap();
        assert_eq!(
            client.endpoint(&["v1", "metric", "c-uuid", "measures"]).as_str(),
            "http://127.0.0.1:8041/v1/metric/c-uuid/measures"
        );

        let client = GnocchiClient::new(settings("http://example.com/gnocchi")).unwrap();
        assert_eq!(
            client.endpoint(&["v1", "resource", "generic", "a b"]).as_str(),
            "http://example.com/gnocchi/v1/resource/generic/a%20b"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            GnocchiClient::new(settings("mailto:admin@example.com")),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            GnocchiClient::new(settings("ftp://example.com/")),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_token() {
        let mut settings = settings("http://127.0.0.1:8041/");
        settings.token = "line\nbreak".to_string();
        assert!(matches!(
            GnocchiClient::new(settings),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_settings_debug_hides_token() {
        let debug = format!("{:?}", settings("http://127.0.0.1:8041/"));
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }
}
