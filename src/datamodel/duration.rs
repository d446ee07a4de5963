use crate::error::{Error, Result};
use std::time::Duration;

/// Parses `30s`, `5m`, `2h`, `1d` or a bare number of seconds.
pub fn parse_duration(data: &str) -> Result<Duration> {
    let data = data.trim();
    let invalid = || Error::configuration(format!("Invalid time delta format: '{}'", data));

    let (digits, unit_seconds) = match data.char_indices().last() {
        Some((index, 's')) => (&data[..index], 1),
        Some((index, 'm')) => (&data[..index], 60),
        Some((index, 'h')) => (&data[..index], 3600),
        Some((index, 'd')) => (&data[..index], 86400),
        Some(_) => (data, 1),
        None => return Err(invalid()),
    };

    let amount: u64 = digits.trim().parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }
    amount
        .checked_mul(unit_seconds)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Parses a named granularity (`second`, `minute`, `hour`, `day`),
/// or falls back to [`parse_duration`].
pub fn parse_granularity(data: &str) -> Result<Duration> {
    match data.trim().to_lowercase().as_str() {
        "second" => Ok(Duration::from_secs(1)),
        "minute" => Ok(Duration::from_secs(60)),
        "hour" => Ok(Duration::from_secs(3600)),
        "day" => Ok(Duration::from_secs(86400)),
        _ => parse_duration(data)
            .map_err(|_| Error::configuration(format!("Unknown granularity: '{}'", data))),
    }
}

/// Renders a duration the way the store expects timespans in query strings.
pub fn format_seconds(duration: Duration) -> String {
    format!("{}", duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_duration("60").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration(" 10s ").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5w").is_err());
        assert!(parse_duration("-5m").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(matches!(
            parse_duration("soon"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_parse_granularity() {
        assert_eq!(parse_granularity("second").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_granularity("Minute").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_granularity("hour").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_granularity("day").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_granularity("300").unwrap(), Duration::from_secs(300));
        assert!(parse_granularity("fortnight").is_err());
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(Duration::from_secs(60)), "60");
        assert_eq!(format_seconds(Duration::from_millis(1500)), "1.5");
    }
}
