use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::time::Instant;

/// Wall-clock time for one tick, and whether it came straight from the RTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockReading {
    pub now: NaiveDateTime,
    pub reliable: bool,
}

/// Keeps time moving when the RTC drops out by extrapolating from the last
/// good reading with a monotonic source.
#[derive(Debug, Clone)]
pub struct ClockGuard {
    anchor: Option<(NaiveDateTime, Instant)>,
    start: Option<Instant>,
    drifting: bool,
}

fn earliest_valid() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

impl Default for ClockGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockGuard {
    pub fn new() -> Self {
        ClockGuard {
            anchor: None,
            start: None,
            drifting: false,
        }
    }

    pub fn read(&mut self, rtc: Option<NaiveDateTime>, monotonic: Instant) -> ClockReading {
        let start = *self.start.get_or_insert(monotonic);

        if let Some(now) = rtc.filter(|t| *t >= earliest_valid()) {
            if self.drifting {
                tracing::info!(%now, "real-time clock recovered");
                self.drifting = false;
            }
            self.anchor = Some((now, monotonic));
            return ClockReading { now, reliable: true };
        }

        if !self.drifting {
            tracing::warn!(?rtc, "real-time clock invalid, extrapolating from monotonic time");
            self.drifting = true;
        }
        let (base, since) = self.anchor.unwrap_or((earliest_valid(), start));
        let elapsed = Duration::from_std(monotonic.saturating_duration_since(since))
            .unwrap_or_else(|_| Duration::zero());
        ClockReading {
            now: base + elapsed,
            reliable: false,
        }
    }
}
