use chrono::{DateTime, Utc};
use travelog_core::Clock;

/// Wall clock backed by `Date.now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_millis()).unwrap_or(DateTime::UNIX_EPOCH)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now_millis(&self) -> i64 {
        js_sys::Date::now() as i64
    }
}
