use super::measure_datetime::{MeasureDateTime, MeasureDateTimeExt};
use anyhow::{Result, anyhow};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub timestamp: MeasureDateTime,
    pub value: f64,
    /// Only known on measurements read back from the store.
    pub granularity: Option<Duration>,
}

impl Measurement {
    pub fn new(timestamp: MeasureDateTime, value: f64) -> Self {
        Self {
            timestamp,
            value,
            granularity: None,
        }
    }

    /// Parses one `[timestamp, granularity, value]` row of a measures response.
    pub fn from_row(row: &(String, f64, f64)) -> Result<Self> {
        let (timestamp, granularity, value) = row;
        let granularity = Duration::try_from_secs_f64(*granularity)
            .map_err(|e| anyhow!("Invalid granularity {} at {}: {}", granularity, timestamp, e))?;
        Ok(Self {
            timestamp: MeasureDateTime::from_iso8601(timestamp)?,
            value: *value,
            granularity: Some(granularity),
        })
    }
}

/// Body item of a push request. Timestamps are sent as Unix epoch seconds.
#[derive(Debug, Serialize)]
pub struct MeasurePayload {
    pub timestamp: f64,
    pub value: f64,
}

impl From<&Measurement> for MeasurePayload {
    fn from(measurement: &Measurement) -> Self {
        Self {
            timestamp: measurement.timestamp.to_unix_seconds(),
            value: measurement.value,
        }
    }
}
