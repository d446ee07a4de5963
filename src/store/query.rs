use crate::datamodel::MeasureDateTime;
use crate::datamodel::duration::format_seconds;
use crate::error::Error;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Aggregation methods understood by the store when resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    #[default]
    Mean,
    Median,
    Sum,
    Min,
    Max,
    Std,
    Count,
    First,
    Last,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Median => "median",
            Aggregation::Sum => "sum",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Std => "std",
            Aggregation::Count => "count",
            Aggregation::First => "first",
            Aggregation::Last => "last",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Aggregation::Mean),
            "median" => Ok(Aggregation::Median),
            "sum" => Ok(Aggregation::Sum),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "std" => Ok(Aggregation::Std),
            "count" => Ok(Aggregation::Count),
            "first" => Ok(Aggregation::First),
            "last" => Ok(Aggregation::Last),
            _ => Err(Error::configuration(format!("Invalid aggregation: {}", s))),
        }
    }
}

/// Client-side resampling onto a coarser interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resample {
    pub interval: Duration,
    pub aggregation: Aggregation,
}

/// Options of `GET /v1/metric/{id}/measures`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasuresQuery {
    pub granularity: Option<Duration>,
    pub resample: Option<Resample>,
    pub start: Option<MeasureDateTime>,
    pub stop: Option<MeasureDateTime>,
    /// Ask the store to aggregate pending measures before answering.
    pub refresh: bool,
}

impl MeasuresQuery {
    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(granularity) = self.granularity {
            params.push(("granularity", format_seconds(granularity)));
        }
        if let Some(resample) = self.resample {
            params.push(("resample", format_seconds(resample.interval)));
            params.push(("aggregation", resample.aggregation.to_string()));
        }
        if let Some(start) = self.start {
            params.push(("start", format!("{}", start.to_unix_seconds())));
        }
        if let Some(stop) = self.stop {
            params.push(("stop", format!("{}", stop.to_unix_seconds())));
        }
        if self.refresh {
            params.push(("refresh", "true".to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregation_from_str() {
        assert_eq!("mean".parse::<Aggregation>().unwrap(), Aggregation::Mean);
        assert_eq!("MAX".parse::<Aggregation>().unwrap(), Aggregation::Max);
        assert_eq!("last".parse::<Aggregation>().unwrap(), Aggregation::Last);
        assert!(matches!(
            "average".parse::<Aggregation>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_query_has_no_params() {
        assert!(MeasuresQuery::default().to_query_params().is_empty());
    }

    #[test]
    fn test_full_query_params() {
        let query = MeasuresQuery {
            granularity: Some(Duration::from_secs(1)),
            resample: Some(Resample {
                interval: Duration::from_secs(300),
                aggregation: Aggregation::Max,
            }),
            start: Some(MeasureDateTime::from_unix_seconds(1704067200.0)),
            stop: None,
            refresh: true,
        };

        assert_eq!(
            query.to_query_params(),
            vec![
                ("granularity", "1".to_string()),
                ("resample", "300".to_string()),
                ("aggregation", "max".to_string()),
                ("start", "1704067200".to_string()),
                ("refresh", "true".to_string()),
            ]
        );
    }
}
