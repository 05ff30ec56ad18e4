use std::convert::TryFrom;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Converts a date parsed out of a header by `mail_parser`.
///
/// The parser is lenient and hands out whatever fields it found, so out of
/// range values (e.g. `31 Feb` or a leap second) give `None` here.
pub fn from_header(dt: &mail_parser::DateTime) -> Option<DateTime<FixedOffset>> {
    let offset = i32::from(dt.tz_hour) * 3600 + i32::from(dt.tz_minute) * 60;
    let offset = FixedOffset::east_opt(if dt.tz_before_gmt { -offset } else { offset })?;
    let naive = NaiveDate::from_ymd_opt(i32::from(dt.year), dt.month.into(), dt.day.into())?
        .and_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into())?;
    offset.from_local_datetime(&naive).single()
}

/// Converts seconds since the epoch, as found in mbox envelope lines, into a
/// UTC date. Zero is what an envelope without a readable date gives.
pub fn from_unix(secs: u64) -> Option<DateTime<FixedOffset>> {
    if secs == 0 {
        return None;
    }
    let utc = Utc.timestamp_opt(i64::try_from(secs).ok()?, 0).single()?;
    Some(utc.with_timezone(&FixedOffset::east_opt(0)?))
}

/// Parses the date given to `--date`.
///
/// Accepts RFC 3339, RFC 2822, and a few common numeric forms. Values
/// without an offset are taken in local time, and a bare date means its
/// local midnight.
pub fn parse_cutoff(s: &str) -> Option<DateTime<Local>> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Local));
    }
    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Local.from_local_datetime(&naive).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_unix() {
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            from_unix(1_579_089_600),
            Some(utc.with_ymd_and_hms(2020, 1, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(from_unix(0), None);
        assert_eq!(from_unix(u64::MAX), None);
    }

    #[test]
    fn test_parse_cutoff() {
        let local = |y, m, d, h, min, s| Local.with_ymd_and_hms(y, m, d, h, min, s).unwrap();
        assert_eq!(parse_cutoff("2020-03-01"), Some(local(2020, 3, 1, 0, 0, 0)));
        assert_eq!(parse_cutoff("2020/03/01"), Some(local(2020, 3, 1, 0, 0, 0)));
        assert_eq!(
            parse_cutoff("2020-03-01 08:30"),
            Some(local(2020, 3, 1, 8, 30, 0))
        );
        assert_eq!(
            parse_cutoff(" 2020-03-01T08:30:15 "),
            Some(local(2020, 3, 1, 8, 30, 15))
        );

        let utc = FixedOffset::east_opt(0).unwrap();
        let noon = utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_cutoff("2020-03-01T12:00:00Z"), Some(noon.with_timezone(&Local)));
        assert_eq!(
            parse_cutoff("Sun, 1 Mar 2020 12:00:00 +0000"),
            Some(noon.with_timezone(&Local))
        );

        assert_eq!(parse_cutoff("next tuesday"), None);
        assert_eq!(parse_cutoff("2020-13-01"), None);
        assert_eq!(parse_cutoff("31 Feb 2015 10:00:00 +0000"), None);
    }
}
