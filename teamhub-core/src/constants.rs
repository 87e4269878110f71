/// Timezone the team schedules in, used for time-of-day triggers.
pub const DEFAULT_SERVICE_TIMEZONE: &str = "Asia/Tokyo";

/// How close to an event's start an RSVP change counts as last-minute.
///
/// Historical revisions used 48h flat and a 67h weekday-based cutoff.
/// 48h is the default; override with `last_minute_threshold_hours`.
pub const DEFAULT_LAST_MINUTE_THRESHOLD_HOURS: i64 = 48;

/// Custody older than this is reported as not updated.
pub const DEFAULT_STALE_CUSTODY_DAYS: i64 = 7;

/// Length of the default event lookup window.
pub const DEFAULT_EVENT_WINDOW_HOURS: i64 = 24;

/// Upper bound on events returned by a time-range query.
pub const EVENT_QUERY_LIMIT: usize = 10;

pub const DEFAULT_CHANNEL: &str = "random";
pub const DEFAULT_RSVP_CHANGE_CHANNEL: &str = "practice";

pub const DEFAULT_MEMBER_CACHE_TTL_SECS: u64 = 600;

/// A member cache miss reloads only once the snapshot is at least this old.
pub const MEMBER_CACHE_MISS_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:4096";

/// Equipment whose name starts with one of these needs charging before use.
pub const NEEDS_CHARGE_PREFIXES: &[&str] = &["ビデオ", "Video"];
