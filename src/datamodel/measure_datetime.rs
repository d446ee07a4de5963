pub type MeasureDateTime = hifitime::Epoch;
use anyhow::{Result, anyhow};
use hifitime::{UNIX_REF_EPOCH, Unit};

pub trait MeasureDateTimeExt: Sized {
    fn from_unix_microseconds_i64(timestamp: i64) -> Self;
    fn to_unix_microseconds_i64(&self) -> i64;
    fn from_iso8601(data: &str) -> Result<Self>;
    fn to_iso8601_utc(&self) -> String;
}

impl MeasureDateTimeExt for MeasureDateTime {
    fn from_unix_microseconds_i64(timestamp: i64) -> Self {
        Self::from_utc_duration(UNIX_REF_EPOCH.to_utc_duration() + timestamp * Unit::Microsecond)
    }

    fn to_unix_microseconds_i64(&self) -> i64 {
        (self.to_unix_seconds() * 1_000_000.0).round() as i64
    }

    fn from_iso8601(data: &str) -> Result<Self> {
        let datetime = iso8601::datetime(data)
            .map_err(|e| anyhow!("Invalid ISO 8601 datetime '{}': {}", data, e))?;
        convert_datetime_from_iso8601_to_hifitime(datetime)
            .map_err(|e| anyhow!("Invalid ISO 8601 datetime '{}': {}", data, e))
    }

    /// Formats as `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`, the layout Gnocchi uses.
    fn to_iso8601_utc(&self) -> String {
        let (year, month, day, hour, minute, second, nanos) = self.to_gregorian_utc();
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}+00:00",
            year,
            month,
            day,
            hour,
            minute,
            second,
            nanos / 1_000
        )
    }
}

/// Current time, as seen by the measurement clients.
pub fn now() -> Result<MeasureDateTime> {
    MeasureDateTime::now().map_err(|e| anyhow!("Unable to read the system clock: {}", e))
}

fn convert_datetime_from_iso8601_to_hifitime(dt: iso8601::DateTime) -> Result<MeasureDateTime> {
    let iso8601::DateTime { date, time } = dt;
    let (year, month, day) = match date {
        iso8601::Date::YMD { year, month, day } => (year, month as u8, day as u8),
        iso8601::Date::Week { .. } | iso8601::Date::Ordinal { .. } => {
            return Err(anyhow!("only calendar dates are supported"));
        }
    };
    let iso8601::Time {
        hour,
        minute,
        second,
        millisecond,
        tz_offset_hours,
        tz_offset_minutes,
    } = time;

    let nanos = millisecond * 1_000_000_u32;
    let mut epoch = MeasureDateTime::maybe_from_gregorian_utc(
        year,
        month,
        day,
        hour as u8,
        minute as u8,
        second as u8,
        nanos,
    )
    .map_err(|e| anyhow!("{}", e))?;

    // A local time at +02:00 is two hours ahead of UTC
    if tz_offset_hours != 0 {
        epoch -= Unit::Hour * tz_offset_hours as i64;
    }
    if tz_offset_minutes != 0 {
        epoch -= Unit::Minute * tz_offset_minutes as i64;
    }

    Ok(epoch)
}
