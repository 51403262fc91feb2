//! Time source for ids, durations and local timestamps.

use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};

pub trait Clock {
    /// Seconds since the unix epoch.
    fn now_secs(&self) -> u64;

    /// RFC 3339 rendering of `now_secs`, used in local documents.
    fn now_rfc3339(&self) -> String {
        rfc3339(self.now_secs())
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Clock frozen at a settable instant.
pub struct FixedClock {
    secs: Cell<u64>,
}

impl FixedClock {
    pub fn new(secs: u64) -> Self {
        FixedClock { secs: Cell::new(secs) }
    }

    pub fn set(&self, secs: u64) {
        self.secs.set(secs);
    }

    pub fn advance(&self, secs: u64) {
        self.secs.set(self.secs.get() + secs);
    }
}

impl Clock for FixedClock {
    fn now_secs(&self) -> u64 {
        self.secs.get()
    }
}

impl<T: Clock + ?Sized> Clock for Box<T> {
    fn now_secs(&self) -> u64 {
        (**self).now_secs()
    }
}

pub fn rfc3339(secs: u64) -> String {
    match Utc.timestamp_opt(secs as i64, 0).single() {
        Some(dt) => dt.to_rfc3339(),
        None => String::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_moves_only_when_told() {
        let c = FixedClock::new(1_700_000_000);
        assert_eq!(c.now_secs(), 1_700_000_000);
        c.advance(5);
        assert_eq!(c.now_secs(), 1_700_000_005);
        c.set(10);
        assert_eq!(c.now_secs(), 10);
    }

    #[test]
    fn rfc3339_rendering() {
        assert_eq!(rfc3339(1_700_000_000), "2023-11-14T22:13:20+00:00");
        assert_eq!(FixedClock::new(0).now_rfc3339(), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_secs() > 1_577_836_800);
    }
}
