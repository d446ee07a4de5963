pub mod series;

pub use series::{DEFAULT_WINDOW, Series, SeriesShape, SeriesSummary};

use crate::datamodel::MeasureDateTime;
use crate::datamodel::measure_datetime::now;
use crate::error::{Error, Result};
use crate::store::{MeasureStore, MeasuresQuery};
use hifitime::Unit;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Keeps series up to date by fetching only what is new since their
/// last point.
#[derive(Debug, Clone)]
pub struct SeriesWatcher {
    store: Arc<dyn MeasureStore>,
}

impl SeriesWatcher {
    pub fn new(store: Arc<dyn MeasureStore>) -> Self {
        Self { store }
    }

    /// Resolves the metric of a host. Nothing is fetched yet, and the
    /// resource is never created: unknown hosts and metrics are
    /// configuration errors.
    pub async fn open(
        &self,
        host: &str,
        metric: &str,
        shape: SeriesShape,
        window: usize,
    ) -> Result<Series> {
        let resource = self
            .store
            .get_resource(host)
            .await?
            .ok_or_else(|| Error::configuration(format!("Unknown host {}", host)))?;

        let metric_id = resource.metric_id(metric).ok_or_else(|| {
            Error::configuration(format!("Unavailable metric {} for host {}", metric, host))
        })?;

        Series::new(host, metric, metric_id, shape, window)
    }

    /// Lower bound of the next fetch: the last known point, or one window
    /// back in time for an empty series.
    pub fn start_for(series: &Series, now: MeasureDateTime) -> MeasureDateTime {
        match series.last_timestamp() {
            Some(last) => last,
            None => {
                let lookback = series.shape().effective_interval().as_micros()
                    * series.window() as u128;
                now - Unit::Microsecond * i64::try_from(lookback).unwrap_or(i64::MAX)
            }
        }
    }

    /// Fetches the new measurements of the series and merges them.
    /// Returns the number of measurements received.
    pub async fn refresh(&self, series: &mut Series) -> Result<usize> {
        let shape = *series.shape();
        let query = MeasuresQuery {
            granularity: Some(shape.granularity),
            resample: shape.resample,
            start: Some(Self::start_for(series, now()?)),
            stop: None,
            refresh: true,
        };

        let measurements = self
            .store
            .query_measurements(series.metric_id(), &query)
            .await?;
        debug!(
            host = series.host(),
            metric = series.metric(),
            received = measurements.len(),
            "Series refreshed"
        );
        series.merge(&measurements);
        Ok(measurements.len())
    }
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub hosts: Vec<String>,
    pub metric: String,
    pub shape: SeriesShape,
    pub window: usize,
    /// Defaults to the spacing of the series.
    pub every: Option<Duration>,
}

/// Follows one metric on several hosts, calling `on_refresh` after each
/// successful refresh.
///
/// Every series is opened before the first fetch. An expired credential
/// ends the watch, other failures skip the host until the next cycle.
pub async fn watch<F>(
    store: Arc<dyn MeasureStore>,
    options: WatchOptions,
    mut on_refresh: F,
) -> Result<Infallible>
where
    F: FnMut(&Series),
{
    if options.hosts.is_empty() {
        return Err(Error::configuration("No host to watch"));
    }

    let watcher = SeriesWatcher::new(store);
    let mut all_series = Vec::with_capacity(options.hosts.len());
    for host in &options.hosts {
        all_series.push(
            watcher
                .open(host, &options.metric, options.shape, options.window)
                .await?,
        );
    }

    let every = options
        .every
        .unwrap_or_else(|| options.shape.effective_interval());
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        for series in all_series.iter_mut() {
            match watcher.refresh(series).await {
                Ok(_) => on_refresh(series),
                Err(Error::CredentialExpired) => return Err(Error::CredentialExpired),
                Err(error) => {
                    warn!(host = series.host(), %error, "Refresh failed, retrying next cycle");
                }
            }
        }
    }
}
