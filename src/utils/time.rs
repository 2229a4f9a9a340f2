use chrono::{DateTime, NaiveDate, Utc};

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// This is the standard way of turning a moment into a ledger date key. Days are always UTC days.
pub fn date_key(moment: DateTime<Utc>) -> String {
    date_to_key(moment.date_naive())
}

pub fn date_to_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Parses a ledger date key. Keys that don't follow `YYYY-MM-DD` yield [None].
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

/// Formats milliseconds as `HHh MMm`. Seconds are truncated.
pub fn format_duration(ms: f64) -> String {
    let total_seconds = (ms.max(0.) / 1000.).floor() as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    format!("{hours:02}h {minutes:02}m")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn date_key_uses_utc_day() {
        let moment = Utc.with_ymd_and_hms(2026, 1, 1, 23, 59, 59).unwrap();
        assert_eq!(date_key(moment), "2026-01-01");
        assert_eq!(parse_date_key("2026-01-01"), Some(moment.date_naive()));
        assert_eq!(parse_date_key("yesterday"), None);
    }

    #[test]
    fn duration_is_zero_padded() {
        assert_eq!(format_duration(0.), "00h 00m");
        assert_eq!(format_duration(59_999.), "00h 00m");
        assert_eq!(format_duration(3_600_000. + 5. * 60_000.), "01h 05m");
        assert_eq!(format_duration(-10.), "00h 00m");
    }
}
