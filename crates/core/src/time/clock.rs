use anyhow::Context;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

/// Calendar view of "now" for one evaluation pass. Day arithmetic happens on local dates in
/// the configured offset, so an update at 23:50 yesterday is one day old at 00:10 today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    today: NaiveDate,
    offset: FixedOffset,
}

impl Clock {
    pub fn new(today: NaiveDate, offset: FixedOffset) -> Self {
        Self { today, offset }
    }

    pub fn utc(today: NaiveDate) -> Self {
        Self::new(today, Utc.fix())
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn tomorrow(&self) -> NaiveDate {
        self.today + Duration::days(1)
    }

    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Whole days between the timestamp's local date and today. Future timestamps give
    /// negative values.
    pub fn days_since(&self, ts: DateTime<Utc>) -> i64 {
        (self.today - self.local_date(ts)).num_days()
    }

    /// Positive for future dates, negative once the date has passed.
    pub fn days_until(&self, date: NaiveDate) -> i64 {
        (date - self.today).num_days()
    }
}

pub fn offset_from_hours(hours: i32) -> anyhow::Result<FixedOffset> {
    anyhow::ensure!(
        (-23..=23).contains(&hours),
        "UTC offset must be -23..=23 hours (got {hours})"
    );
    FixedOffset::east_opt(hours * 3600).context("invalid UTC offset")
}

/// Explicit `YYYY-MM-DD` wins; otherwise today's date in `offset`.
pub fn resolve_today(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
    offset: FixedOffset,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid as_of_date (expected YYYY-MM-DD): {s}"));
    }

    Ok(now_utc.with_timezone(&offset).date_naive())
}
