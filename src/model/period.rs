use crate::model::{Error, Result};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime};

/// Period key of the run's grand aggregate.
pub const TOTAL_KEY: &str = "total";
/// Period key used when a date cannot be rendered as a calendar key.
pub const INVALID_DATE_KEY: &str = "invalid date";

const CALENDAR_KEY_FORMAT: &str = "%Y-%m-%d";
const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Which period key a single-day report reads its snapshot from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, clap::ValueEnum)]
pub enum DayKeyPolicy {
    /// The day's own calendar key.
    #[default]
    Calendar,
    /// The sentinel invalid-date key.
    InvalidDate,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Granularity {
    MultiPeriod,
    SingleDay { day: NaiveDate, policy: DayKeyPolicy },
}

impl Granularity {
    /// Period key holding the per-user snapshot shown in the report.
    pub fn snapshot_key(&self) -> String {
        match self {
            Self::MultiPeriod => TOTAL_KEY.to_string(),
            Self::SingleDay { policy: DayKeyPolicy::InvalidDate, .. } => {
                INVALID_DATE_KEY.to_string()
            }
            Self::SingleDay { day, policy: DayKeyPolicy::Calendar } => calendar_key(day),
        }
    }
}

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct ReportPeriod {
    pub since: DateTime<FixedOffset>,
    pub until: DateTime<FixedOffset>,
}

// Create
impl ReportPeriod {
    pub fn parse(since: &str, until: &str) -> Result<Self> {
        let since = parse_day(since)?;
        let until = parse_day(until)?;
        if until < since {
            return Err(Error::Config(format!(
                "Report end {until} is before its start {since}"
            )));
        }
        Ok(Self::from_days(since, until))
    }

    pub fn from_days(since: NaiveDate, until: NaiveDate) -> Self {
        let midnight = |day: NaiveDate| day.and_time(NaiveTime::MIN).and_utc().fixed_offset();
        Self {
            since: midnight(since),
            until: midnight(until),
        }
    }

    pub fn is_single_day(&self) -> bool {
        self.since.date_naive() == self.until.date_naive()
    }

    pub fn granularity(&self, policy: DayKeyPolicy) -> Granularity {
        if self.is_single_day() {
            Granularity::SingleDay {
                day: self.since.date_naive(),
                policy,
            }
        } else {
            Granularity::MultiPeriod
        }
    }

    /// Upper bound for `closed_at` filtering. `until` is a midnight, so the
    /// window is widened to the next one to include the whole end day.
    pub fn effective_until(&self) -> DateTime<FixedOffset> {
        self.until
            .checked_add_days(Days::new(1))
            .unwrap_or(self.until)
    }

    pub fn contains(&self, datetime: &DateTime<FixedOffset>) -> bool {
        *datetime >= self.since && *datetime <= self.effective_until()
    }

    pub fn end_day(&self) -> String {
        self.until.format(INPUT_DATE_FORMAT).to_string()
    }
}

pub fn calendar_key(day: &NaiveDate) -> String {
    day.format(CALENDAR_KEY_FORMAT).to_string()
}

/// Period key for a timestamp, falling back to the sentinel key.
pub fn period_key(datetime: Option<&str>) -> String {
    datetime
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| calendar_key(&value.date_naive()))
        .unwrap_or_else(|| INVALID_DATE_KEY.to_string())
}

fn parse_day(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, INPUT_DATE_FORMAT)
        .map_err(|_| Error::InvalidDate(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_period_reads_total() {
        let period = ReportPeriod::parse("2024-05-01", "2024-05-07").unwrap();
        assert!(!period.is_single_day());
        assert_eq!(period.granularity(DayKeyPolicy::Calendar).snapshot_key(), "total");
        assert_eq!(period.granularity(DayKeyPolicy::InvalidDate).snapshot_key(), "total");
    }

    #[test]
    fn single_day_key_follows_policy() {
        let period = ReportPeriod::parse("2024-05-03", "2024-05-03").unwrap();
        assert_eq!(
            period.granularity(DayKeyPolicy::Calendar).snapshot_key(),
            "2024-05-03"
        );
        assert_eq!(
            period.granularity(DayKeyPolicy::InvalidDate).snapshot_key(),
            INVALID_DATE_KEY
        );
    }

    #[test]
    fn single_day_window_covers_whole_day() {
        let period = ReportPeriod::parse("2024-05-03", "2024-05-03").unwrap();
        let evening = DateTime::parse_from_rfc3339("2024-05-03T21:15:00Z").unwrap();
        let next = DateTime::parse_from_rfc3339("2024-05-04T00:00:01Z").unwrap();
        assert!(period.contains(&evening));
        assert!(!period.contains(&next));
    }

    #[test]
    fn period_key_of_timestamps() {
        assert_eq!(period_key(Some("2024-05-03T10:00:00Z")), "2024-05-03");
        assert_eq!(period_key(Some("yesterday")), INVALID_DATE_KEY);
        assert_eq!(period_key(None), INVALID_DATE_KEY);
    }

    #[test]
    fn rejects_reversed_and_malformed_dates() {
        assert!(ReportPeriod::parse("2024-05-07", "2024-05-01").is_err());
        assert!(matches!(
            ReportPeriod::parse("05/01/2024", "2024-05-01"),
            Err(Error::InvalidDate(_))
        ));
    }
}
