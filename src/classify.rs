use chrono::{DateTime, Duration, Local};

const SECONDS_PER_DAY: i64 = 86400;

/// Which messages are old enough to be archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    /// Messages dated strictly before this point in time.
    Before(DateTime<Local>),
    /// Messages more than this many days older than the start of the run.
    OlderThanDays(u32),
    /// Every message. This is what you get without `--date` and `--days`.
    Everything,
}

impl Cutoff {
    /// An absolute date always wins over a day count, and a day count of
    /// zero does not restrict anything.
    pub fn new(date: Option<DateTime<Local>>, days: Option<u32>) -> Self {
        match (date, days) {
            (Some(date), _) => Cutoff::Before(date),
            (None, Some(days)) if days > 0 => Cutoff::OlderThanDays(days),
            _ => Cutoff::Everything,
        }
    }

    pub fn includes(&self, timestamp: DateTime<Local>, now: DateTime<Local>) -> bool {
        match *self {
            Cutoff::Before(date) => timestamp < date,
            Cutoff::OlderThanDays(days) => {
                now - timestamp > Duration::seconds(i64::from(days) * SECONDS_PER_DAY)
            }
            Cutoff::Everything => true,
        }
    }
}
