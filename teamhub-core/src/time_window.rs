//! Time bounds for event lookups.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::constants::DEFAULT_EVENT_WINDOW_HOURS;
use crate::error::{HubError, HubResult};

/// Half-open range `[from, to)` over event start times.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Both bounds given; `from` must be strictly before `to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> HubResult<Self> {
        Self::bounded(Some(from), Some(to))
    }

    pub fn bounded(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> HubResult<Self> {
        if let (Some(f), Some(t)) = (from, to)
            && f >= t
        {
            return Err(HubError::InvalidTimeRange(format!(
                "from ({}) must be before to ({})",
                f.to_rfc3339(),
                t.to_rfc3339()
            )));
        }
        Ok(TimeRange { from, to })
    }

    /// The default lookup window: `at` to `at + 24h`.
    pub fn starting(at: DateTime<Utc>) -> Self {
        TimeRange {
            from: Some(at),
            to: Some(at + Duration::hours(DEFAULT_EVENT_WINDOW_HOURS)),
        }
    }

    /// Everything that started before `to`.
    pub fn until(to: DateTime<Utc>) -> Self {
        TimeRange { from: None, to: Some(to) }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.is_none_or(|f| instant >= f) && self.to.is_none_or(|t| instant < t)
    }
}

/// Anchor two `HH:MM` times to `now`'s calendar date in `tz`.
///
/// Used by time-of-day triggers ("events starting today between 19:00
/// and 21:00"). Rejects malformed times and windows where `from` is not
/// before `to`.
pub fn reminder_window(now: DateTime<Utc>, from: &str, to: &str, tz: Tz) -> HubResult<TimeRange> {
    let from_time = parse_hhmm(from)?;
    let to_time = parse_hhmm(to)?;
    let today = now.with_timezone(&tz).date_naive();

    let anchor = |time: NaiveTime| -> HubResult<DateTime<Utc>> {
        tz.from_local_datetime(&today.and_time(time))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| {
                HubError::InvalidTime(format!("{} does not exist on {today} in {tz}", time.format("%H:%M")))
            })
    };

    TimeRange::new(anchor(from_time)?, anchor(to_time)?)
}

/// Parse `HH:MM` (24h). Single-digit hours are accepted, as in `9:30`.
fn parse_hhmm(s: &str) -> HubResult<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| HubError::InvalidTime(s.to_string()))
}
