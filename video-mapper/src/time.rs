use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// `2017-04-13T10:27:32.353Z`, the timestamp format carried in message
/// headers and in `lastModified`.
pub const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

pub trait TimeSource {
    /// Current time as a header timestamp
    fn current_time(&self) -> String;
}

#[derive(Clone)]
pub struct SystemTime {}

impl TimeSource for SystemTime {
    fn current_time(&self) -> String {
        format_timestamp(OffsetDateTime::now_utc())
    }
}

/// Formats `at`, converted to UTC.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.to_offset(time::UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct FixedTime {
    pub time: String,
}

impl TimeSource for FixedTime {
    fn current_time(&self) -> String {
        self.time.to_string()
    }
}
