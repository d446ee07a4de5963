mod common;

use anyhow::Result;
use common::TestStore;
use hostmetrics::Error;
use hostmetrics::bootstrap::host_metric_specs;
use hostmetrics::datamodel::measure_datetime::MeasureDateTimeExt;
use hostmetrics::datamodel::{MeasureDateTime, Measurement};
use hostmetrics::store::{
    Aggregation, AuthScheme, GnocchiClient, MeasureStore, MeasuresQuery, Resample,
};
use std::time::Duration;

#[tokio::test]
async fn test_create_or_get_resource_creates_once() -> Result<()> {
    // Given: A store that does not know the host
    let test_store = TestStore::start().await?;
    test_store
        .server
        .preset_metric_ids(&[("cpu", "c-uuid"), ("memory", "m-uuid")]);
    let specs = host_metric_specs();

    // When: We ask for the resource twice
    let first = test_store.client.create_or_get_resource("m1", &specs).await?;
    let second = test_store.client.create_or_get_resource("m1", &specs).await?;

    // Then: It was created once, with both metrics at the "high" policy
    assert_eq!(test_store.server.create_calls(), 1);
    assert_eq!(first, second);
    assert_eq!(first.display_id(), "m1");
    assert_eq!(first.metric_id("cpu"), Some("c-uuid"));
    assert_eq!(first.metric_id("memory"), Some("m-uuid"));

    let stored = test_store.server.resource("m1").expect("resource should exist");
    assert_eq!(stored["project_id"], "fake-project");
    assert_eq!(stored["user_id"], "fake-user");

    Ok(())
}

#[tokio::test]
async fn test_get_resource_unknown_is_none() -> Result<()> {
    let test_store = TestStore::start().await?;

    assert!(test_store.client.get_resource("ghost").await?.is_none());
    assert_eq!(test_store.server.create_calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_push_and_query_measurements() -> Result<()> {
    // Given: A host resource
    let test_store = TestStore::start().await?;
    let resource = test_store
        .client
        .create_or_get_resource("m1", &host_metric_specs())
        .await?;
    let cpu_id = resource.metric_id("cpu").unwrap();

    // When: We push two measurements out of order
    let later = MeasureDateTime::from_unix_microseconds_i64(1_704_067_260_000_000);
    let earlier = MeasureDateTime::from_unix_microseconds_i64(1_704_067_200_000_000);
    test_store
        .client
        .push_measurement(cpu_id, &Measurement::new(later, 42.0))
        .await?;
    test_store
        .client
        .push_measurement(cpu_id, &Measurement::new(earlier, 12.5))
        .await?;

    // Then: They are stored with Unix epoch timestamps
    assert_eq!(
        test_store.server.measures(cpu_id),
        vec![(1704067260.0, 42.0), (1704067200.0, 12.5)]
    );

    // And: A query returns them in order, with parsed ISO 8601 timestamps
    let query = MeasuresQuery {
        granularity: Some(Duration::from_secs(60)),
        ..Default::default()
    };
    let measurements = test_store.client.query_measurements(cpu_id, &query).await?;
    assert_eq!(measurements.len(), 2);
    assert_eq!(measurements[0].timestamp.to_unix_microseconds_i64(), 1_704_067_200_000_000);
    assert_eq!(measurements[0].value, 12.5);
    assert_eq!(measurements[0].granularity, Some(Duration::from_secs(60)));
    assert_eq!(measurements[1].value, 42.0);

    Ok(())
}

#[tokio::test]
async fn test_query_sends_typed_options() -> Result<()> {
    let test_store = TestStore::start().await?;
    let resource = test_store
        .client
        .create_or_get_resource("m1", &host_metric_specs())
        .await?;
    let cpu_id = resource.metric_id("cpu").unwrap();
    test_store.client.push_value(cpu_id, 10.0).await?;

    let query = MeasuresQuery {
        granularity: Some(Duration::from_secs(1)),
        resample: Some(Resample {
            interval: Duration::from_secs(300),
            aggregation: Aggregation::Max,
        }),
        start: Some(MeasureDateTime::from_unix_microseconds_i64(1_704_067_200_000_000)),
        stop: None,
        refresh: true,
    };
    let measurements = test_store.client.query_measurements(cpu_id, &query).await?;
    assert_eq!(measurements.len(), 1);

    let params = test_store.server.last_query();
    let param = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };
    assert_eq!(param("granularity"), Some("1"));
    assert_eq!(param("resample"), Some("300"));
    assert_eq!(param("aggregation"), Some("max"));
    assert_eq!(param("start"), Some("1704067200"));
    assert_eq!(param("refresh"), Some("true"));
    assert_eq!(param("stop"), None);

    Ok(())
}

#[tokio::test]
async fn test_list_resources() -> Result<()> {
    let test_store = TestStore::start().await?;
    let specs = host_metric_specs();
    test_store.client.create_or_get_resource("m1", &specs).await?;
    test_store.client.create_or_get_resource("m2", &specs).await?;

    let resources = test_store.client.list_resources().await?;
    let mut ids: Vec<&str> = resources.iter().map(|r| r.display_id()).collect();
    ids.sort();
    assert_eq!(ids, vec!["m1", "m2"]);
    assert!(resources.iter().all(|r| r.metrics.len() == 2));

    Ok(())
}

#[tokio::test]
async fn test_unauthorized_is_credential_expired_everywhere() -> Result<()> {
    // Given: A store whose token has expired
    let test_store = TestStore::start().await?;
    let resource = test_store
        .client
        .create_or_get_resource("m1", &host_metric_specs())
        .await?;
    let cpu_id = resource.metric_id("cpu").unwrap().to_string();
    test_store.server.expire_token();

    // Then: Every operation reports the expiry, and nothing else
    let client = &test_store.client;
    assert!(matches!(
        client.get_resource("m1").await,
        Err(Error::CredentialExpired)
    ));
    assert!(matches!(
        client.create_or_get_resource("m2", &host_metric_specs()).await,
        Err(Error::CredentialExpired)
    ));
    assert!(matches!(
        client.push_value(&cpu_id, 1.0).await,
        Err(Error::CredentialExpired)
    ));
    assert!(matches!(
        client
            .query_measurements(&cpu_id, &MeasuresQuery::default())
            .await,
        Err(Error::CredentialExpired)
    ));
    assert!(matches!(
        client.list_resources().await,
        Err(Error::CredentialExpired)
    ));

    Ok(())
}

#[tokio::test]
async fn test_wrong_token_is_credential_expired() -> Result<()> {
    let test_store = TestStore::start().await?;
    let mut settings = test_store.server.settings();
    settings.token = "stale-token".to_string();
    let client = GnocchiClient::new(settings)?;

    assert!(matches!(
        client.list_resources().await,
        Err(Error::CredentialExpired)
    ));

    Ok(())
}

#[tokio::test]
async fn test_bearer_scheme() -> Result<()> {
    let test_store = TestStore::start().await?;
    let mut settings = test_store.server.settings();
    settings.auth_scheme = AuthScheme::Bearer;
    let client = GnocchiClient::new(settings)?;

    assert!(client.list_resources().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_failure_status_is_store_operation_failed() -> Result<()> {
    let test_store = TestStore::start().await?;
    test_store.server.fail_with(503);

    match test_store.client.list_resources().await {
        Err(Error::StoreOperationFailed {
            operation,
            status,
            body,
        }) => {
            assert_eq!(operation, "list_resources");
            assert_eq!(status, 503);
            assert_eq!(body, "injected failure");
        }
        other => panic!("Expected a store operation failure, got {:?}", other),
    }

    // A failed lookup never turns into a create
    assert!(matches!(
        test_store
            .client
            .create_or_get_resource("m1", &host_metric_specs())
            .await,
        Err(Error::StoreOperationFailed { status: 503, .. })
    ));
    assert_eq!(test_store.server.create_calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_push_to_unknown_metric_fails() -> Result<()> {
    let test_store = TestStore::start().await?;

    assert!(matches!(
        test_store.client.push_value("no-such-metric", 1.0).await,
        Err(Error::StoreOperationFailed { status: 404, .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_undecodable_measures_are_invalid_response() -> Result<()> {
    // Given: A metric whose measures come back in an unknown layout
    let test_store = TestStore::start().await?;
    test_store
        .server
        .preset_metric_ids(&[("cpu", "c-uuid"), ("memory", "m-uuid")]);
    test_store
        .client
        .create_or_get_resource("m1", &host_metric_specs())
        .await?;
    test_store.server.corrupt_measures();

    // When: Querying them
    let result = test_store
        .client
        .query_measurements("c-uuid", &MeasuresQuery::default())
        .await;

    // Then: The body is reported as invalid, naming the operation
    assert!(matches!(
        result,
        Err(Error::InvalidResponse {
            operation: "query_measurements",
            ..
        })
    ));

    Ok(())
}

#[tokio::test]
async fn test_unreachable_store_is_network_failure() -> Result<()> {
    // Given: A port nobody listens on anymore
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let address = listener.local_addr()?;
    drop(listener);

    let test_store = TestStore::start().await?;
    let mut settings = test_store.server.settings();
    settings.url = url::Url::parse(&format!("http://{}/", address))?;
    let client = GnocchiClient::new(settings)?;

    // Then: The failure is classified as a network one
    assert!(matches!(
        client.list_resources().await,
        Err(Error::Network {
            operation: "list_resources",
            ..
        })
    ));

    Ok(())
}
