use crate::datamodel::measure_datetime::{MeasureDateTime, MeasureDateTimeExt};
use crate::datamodel::Measurement;
use crate::error::{Error, Result};
use crate::store::Resample;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_WINDOW: usize = 60;

/// What a series is made of. Fixed for the lifetime of a series:
/// mixing granularities or aggregations in one series would mix
/// measurements that mean different things.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesShape {
    pub granularity: Duration,
    pub resample: Option<Resample>,
}

impl SeriesShape {
    pub fn new(granularity: Duration) -> Self {
        Self {
            granularity,
            resample: None,
        }
    }

    pub fn with_resample(mut self, resample: Resample) -> Self {
        self.resample = Some(resample);
        self
    }

    /// Spacing between two points of the series.
    pub fn effective_interval(&self) -> Duration {
        self.resample
            .map(|resample| resample.interval)
            .unwrap_or(self.granularity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// The most recent points of one metric of one host, ordered by timestamp.
#[derive(Debug, Clone)]
pub struct Series {
    host: String,
    metric: String,
    metric_id: String,
    shape: SeriesShape,
    window: usize,
    // keyed by Unix microseconds
    points: BTreeMap<i64, f64>,
}

impl Series {
    pub fn new(
        host: &str,
        metric: &str,
        metric_id: &str,
        shape: SeriesShape,
        window: usize,
    ) -> Result<Self> {
        if window == 0 {
            return Err(Error::configuration("The series window cannot be empty"));
        }
        if shape.effective_interval().is_zero() {
            return Err(Error::configuration("The series granularity cannot be zero"));
        }
        Ok(Self {
            host: host.to_string(),
            metric: metric.to_string(),
            metric_id: metric_id.to_string(),
            shape,
            window,
            points: BTreeMap::new(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn metric_id(&self) -> &str {
        &self.metric_id
    }

    pub fn shape(&self) -> &SeriesShape {
        &self.shape
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<MeasureDateTime> {
        self.points
            .last_key_value()
            .map(|(micros, _)| MeasureDateTime::from_unix_microseconds_i64(*micros))
    }

    pub fn latest(&self) -> Option<(MeasureDateTime, f64)> {
        self.points.last_key_value().map(|(micros, value)| {
            (MeasureDateTime::from_unix_microseconds_i64(*micros), *value)
        })
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.values().copied().collect()
    }

    /// Merges measurements by timestamp, the last value winning, then keeps
    /// only the `window` most recent points.
    pub fn merge(&mut self, measurements: &[Measurement]) {
        for measurement in measurements {
            self.points.insert(
                measurement.timestamp.to_unix_microseconds_i64(),
                measurement.value,
            );
        }
        while self.points.len() > self.window {
            self.points.pop_first();
        }
    }

    pub fn summary(&self) -> Option<SeriesSummary> {
        if self.points.is_empty() {
            return None;
        }
        let (min, max, sum) = self.points.values().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), value| (min.min(*value), max.max(*value), sum + value),
        );
        Some(SeriesSummary {
            min,
            max,
            mean: sum / self.points.len() as f64,
        })
    }
}
