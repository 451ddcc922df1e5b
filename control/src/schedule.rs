use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter;

use crate::error::ScheduleError;
use crate::solar::{sun_times, Location, SunTimes};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Sunrise,
    Sunset,
    Clock,
}

/// A configured (time, heat, cool) point of the daily temperature profile.
///
/// For `Clock` the offset is the time of day itself, `hour * 60 + minute`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timepoint {
    pub anchor: Anchor,
    pub offset_minutes: i32,
    pub heat: f64,
    pub cool: f64,
}

impl Timepoint {
    pub fn sunrise(offset_minutes: i32, heat: f64, cool: f64) -> Self {
        Timepoint { anchor: Anchor::Sunrise, offset_minutes, heat, cool }
    }

    pub fn sunset(offset_minutes: i32, heat: f64, cool: f64) -> Self {
        Timepoint { anchor: Anchor::Sunset, offset_minutes, heat, cool }
    }

    pub fn clock(hour: u32, minute: u32, heat: f64, cool: f64) -> Self {
        Timepoint {
            anchor: Anchor::Clock,
            offset_minutes: (hour * 60 + minute) as i32,
            heat,
            cool,
        }
    }

    /// Offset with clock times folded into one day, so 24:00 equals 00:00.
    pub fn fixed_offset(&self) -> i32 {
        match self.anchor {
            Anchor::Clock => self.offset_minutes.rem_euclid(24 * 60),
            Anchor::Sunrise | Anchor::Sunset => self.offset_minutes,
        }
    }

    pub fn resolve(&self, sun: &SunTimes) -> NaiveTime {
        let base = match self.anchor {
            Anchor::Sunrise => sun.sunrise.num_seconds_from_midnight() as i64,
            Anchor::Sunset => sun.sunset.num_seconds_from_midnight() as i64,
            Anchor::Clock => 0,
        };
        let secs = (base + self.offset_minutes as i64 * 60).rem_euclid(SECONDS_PER_DAY);
        NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0).unwrap_or(NaiveTime::MIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setpoints {
    pub heat: f64,
    pub cool: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedTimepoint {
    pub at: NaiveTime,
    pub heat: f64,
    pub cool: f64,
}

/// Resolves every timepoint for one day and sorts them by time of day.
///
/// Timepoints that land on the same second keep only the one listed first in
/// the table.
pub fn resolve_day(
    timepoints: &[Timepoint],
    sun: &SunTimes,
) -> Result<Vec<ResolvedTimepoint>, ScheduleError> {
    if timepoints.is_empty() {
        return Err(ScheduleError::Empty);
    }

    let mut indexed: Vec<(usize, ResolvedTimepoint)> = timepoints
        .iter()
        .enumerate()
        .map(|(i, tp)| {
            (
                i,
                ResolvedTimepoint {
                    at: tp.resolve(sun),
                    heat: tp.heat,
                    cool: tp.cool,
                },
            )
        })
        .collect();
    indexed.sort_by_key(|(i, tp)| (tp.at, *i));
    indexed.dedup_by(|later, kept| {
        let collides = later.1.at == kept.1.at;
        if collides {
            tracing::warn!(
                kept = kept.0,
                dropped = later.0,
                at = %kept.1.at,
                "timepoints resolve to the same time"
            );
        }
        collides
    });

    Ok(indexed.into_iter().map(|(_, tp)| tp).collect())
}

fn linear(val_start: f64, val_end: f64, progress: f64) -> f64 {
    if val_start == val_end {
        return val_start;
    }
    let progress = progress.clamp(0.0, 1.0);
    val_end * progress + val_start * (1.0 - progress)
}

/// Interpolates between the two timepoints bracketing `now`.
///
/// Before today's first timepoint the segment starts at `before`, the previous
/// day's last one; after today's last it ends at `after`, the next day's first.
pub fn interpolate(
    now: NaiveTime,
    before: &ResolvedTimepoint,
    today: &[ResolvedTimepoint],
    after: &ResolvedTimepoint,
) -> Setpoints {
    let seconds = |t: NaiveTime| t.num_seconds_from_midnight() as i64;
    let timeline: Vec<(i64, &ResolvedTimepoint)> =
        iter::once((seconds(before.at) - SECONDS_PER_DAY, before))
            .chain(today.iter().map(|tp| (seconds(tp.at), tp)))
            .chain(iter::once((seconds(after.at) + SECONDS_PER_DAY, after)))
            .collect();

    // `before` is always earlier than `now` and `after` always later.
    let now = seconds(now);
    let a_index = timeline.iter().rposition(|(at, _)| *at <= now).unwrap_or(0);
    let (a_at, a) = timeline[a_index];
    let (b_at, b) = timeline[(a_index + 1).min(timeline.len() - 1)];

    let span = b_at - a_at;
    let progress = if span > 0 {
        (now - a_at) as f64 / span as f64
    } else {
        0.0
    };
    Setpoints {
        heat: linear(a.heat, b.heat, progress),
        cool: linear(a.cool, b.cool, progress),
    }
}

/// Timepoint table bound to a location. Each day is resolved once and kept
/// while it is yesterday, today or tomorrow.
#[derive(Debug, Clone)]
pub struct Scheduler {
    location: Location,
    timepoints: Vec<Timepoint>,
    days: BTreeMap<NaiveDate, Day>,
}

#[derive(Debug, Clone)]
struct Day {
    sun: SunTimes,
    resolved: Result<Vec<ResolvedTimepoint>, ScheduleError>,
}

impl Scheduler {
    pub fn new(location: Location, timepoints: Vec<Timepoint>) -> Self {
        Scheduler {
            location,
            timepoints,
            days: BTreeMap::new(),
        }
    }

    fn day(&mut self, date: NaiveDate) -> &Day {
        let Scheduler { location, timepoints, days } = self;
        days.entry(date).or_insert_with(|| {
            let sun = sun_times(date, location);
            tracing::debug!(%date, sunrise = %sun.sunrise, sunset = %sun.sunset, "resolved sun times");
            let resolved = resolve_day(timepoints, &sun);
            Day { sun, resolved }
        })
    }

    fn resolved(&self, date: Option<NaiveDate>) -> Option<&[ResolvedTimepoint]> {
        match &self.days.get(&date?)?.resolved {
            Ok(resolved) => Some(resolved.as_slice()),
            Err(_) => None,
        }
    }

    pub fn sun_times(&mut self, date: NaiveDate) -> SunTimes {
        self.day(date).sun
    }

    pub fn setpoints(&mut self, date: NaiveDate, now: NaiveTime) -> Result<Setpoints, ScheduleError> {
        let yesterday = date.pred_opt();
        let tomorrow = date.succ_opt();
        for day in [yesterday, Some(date), tomorrow].into_iter().flatten() {
            self.day(day);
        }
        self.days.retain(|day, _| {
            yesterday.map_or(true, |y| *day >= y) && tomorrow.map_or(true, |t| *day <= t)
        });

        let today = match self.days.get(&date).map(|day| &day.resolved) {
            Some(Ok(resolved)) => resolved.as_slice(),
            Some(Err(e)) => return Err(e.clone()),
            None => return Err(ScheduleError::Empty),
        };
        let (Some(first), Some(last)) = (today.first(), today.last()) else {
            return Err(ScheduleError::Empty);
        };
        let before = self.resolved(yesterday).and_then(|r| r.last()).unwrap_or(last);
        let after = self.resolved(tomorrow).and_then(|r| r.first()).unwrap_or(first);
        Ok(interpolate(now, before, today, after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solar::Daylight;

    /// One day's table on its own, wrapping onto itself over midnight.
    fn setpoints(now: NaiveTime, resolved: &[ResolvedTimepoint]) -> Setpoints {
        interpolate(now, resolved.last().unwrap(), resolved, resolved.first().unwrap())
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn fixed_sun() -> SunTimes {
        SunTimes {
            sunrise: hm(7, 0),
            sunset: hm(17, 0),
            daylight: Daylight::Regular,
        }
    }

    fn greenhouse_table() -> Vec<Timepoint> {
        vec![
            Timepoint::sunset(0, 17.0, 19.0),
            Timepoint::clock(12, 30, 20.0, 24.0),
            Timepoint::sunrise(-30, 18.0, 20.0),
            Timepoint::sunrise(0, 18.0, 22.0),
            Timepoint::sunset(-60, 20.0, 24.0),
        ]
    }

    #[test]
    fn resolves_and_sorts_anchors() {
        let resolved = resolve_day(&greenhouse_table(), &fixed_sun()).unwrap();
        let times: Vec<NaiveTime> = resolved.iter().map(|tp| tp.at).collect();
        assert_eq!(times, vec![hm(6, 30), hm(7, 0), hm(12, 30), hm(16, 0), hm(17, 0)]);
    }

    #[test]
    fn negative_offset_wraps_to_previous_evening() {
        let sun = SunTimes { sunrise: hm(0, 20), ..fixed_sun() };
        assert_eq!(Timepoint::sunrise(-30, 0.0, 0.0).resolve(&sun), hm(23, 50));
        assert_eq!(Timepoint::clock(24, 0, 0.0, 0.0).resolve(&sun), NaiveTime::MIN);
    }

    #[test]
    fn interpolates_between_bracketing_points() {
        let resolved = resolve_day(&greenhouse_table(), &fixed_sun()).unwrap();
        // 07:00 (18, 22) .. 12:30 (20, 24); 09:45 is halfway.
        let sp = setpoints(hm(9, 45), &resolved);
        assert!((sp.heat - 19.0).abs() < 1e-9);
        assert!((sp.cool - 23.0).abs() < 1e-9);
    }

    #[test]
    fn exact_match_yields_timepoint_values() {
        let resolved = resolve_day(&greenhouse_table(), &fixed_sun()).unwrap();
        assert_eq!(setpoints(hm(12, 30), &resolved), Setpoints { heat: 20.0, cool: 24.0 });
        assert_eq!(setpoints(hm(6, 30), &resolved), Setpoints { heat: 18.0, cool: 20.0 });
    }

    #[test]
    fn results_stay_on_the_segment() {
        let resolved = resolve_day(&greenhouse_table(), &fixed_sun()).unwrap();
        for minute in 0..1440 {
            let now = hm(minute / 60, minute % 60);
            let sp = setpoints(now, &resolved);
            assert!(sp.heat >= 17.0 && sp.heat <= 20.0, "{} heat {}", now, sp.heat);
            assert!(sp.cool >= 19.0 && sp.cool <= 24.0, "{} cool {}", now, sp.cool);
        }
    }

    #[test]
    fn continuous_across_midnight() {
        let resolved = resolve_day(&greenhouse_table(), &fixed_sun()).unwrap();
        let before = setpoints(NaiveTime::from_hms_opt(23, 59, 59).unwrap(), &resolved);
        let after = setpoints(NaiveTime::from_hms_opt(0, 0, 1).unwrap(), &resolved);
        assert!((before.heat - after.heat).abs() < 0.01);
        assert!((before.cool - after.cool).abs() < 0.01);
        // 17:00 (17, 19) .. 06:30 (18, 20): midnight is 7h into the 13.5h segment.
        let midnight = setpoints(NaiveTime::MIN, &resolved);
        assert!((midnight.heat - (17.0 + 7.0 / 13.5)).abs() < 1e-9);
    }

    #[test]
    fn single_timepoint_is_constant() {
        let resolved = resolve_day(&[Timepoint::clock(8, 0, 15.0, 25.0)], &fixed_sun()).unwrap();
        for h in [0, 8, 13, 23] {
            assert_eq!(setpoints(hm(h, 0), &resolved), Setpoints { heat: 15.0, cool: 25.0 });
        }
    }

    #[test]
    fn colliding_times_keep_the_first_listed() {
        let table = vec![Timepoint::sunrise(0, 16.0, 26.0), Timepoint::clock(7, 0, 15.0, 25.0)];
        let resolved = resolve_day(&table, &fixed_sun()).unwrap();
        assert_eq!(resolved, vec![ResolvedTimepoint { at: hm(7, 0), heat: 16.0, cool: 26.0 }]);

        let reversed: Vec<Timepoint> = table.into_iter().rev().collect();
        let resolved = resolve_day(&reversed, &fixed_sun()).unwrap();
        assert_eq!(resolved, vec![ResolvedTimepoint { at: hm(7, 0), heat: 15.0, cool: 25.0 }]);

        assert_eq!(resolve_day(&[], &fixed_sun()), Err(ScheduleError::Empty));
    }

    #[test]
    fn wrap_segment_uses_neighbouring_days() {
        let location = Location { latitude: 45.5, longitude: -73.56, utc_offset: -5 };
        let mut scheduler = Scheduler::new(location, greenhouse_table());
        let today = NaiveDate::from_ymd_opt(2017, 3, 20).unwrap();
        let yesterday = today.pred_opt().unwrap();
        let tomorrow = today.succ_opt().unwrap();

        let secs = |t: NaiveTime| t.num_seconds_from_midnight() as f64;
        // Yesterday's sunset (17, 19) .. today's sunrise - 30 min (18, 20).
        let sunset = secs(scheduler.sun_times(yesterday).sunset) - 86_400.0;
        let dawn = secs(scheduler.sun_times(today).sunrise) - 1800.0;
        let sp = scheduler.setpoints(today, NaiveTime::MIN).unwrap();
        assert!((sp.heat - (17.0 + (0.0 - sunset) / (dawn - sunset))).abs() < 1e-9);

        // Today's sunset .. tomorrow's sunrise - 30 min.
        let sunset = secs(scheduler.sun_times(today).sunset);
        let dawn = secs(scheduler.sun_times(tomorrow).sunrise) - 1800.0 + 86_400.0;
        let late = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        let sp = scheduler.setpoints(today, late).unwrap();
        assert!((sp.cool - (19.0 + (secs(late) - sunset) / (dawn - sunset))).abs() < 1e-9);

        // The same segment seen from either side of midnight.
        let before = scheduler.setpoints(today, NaiveTime::from_hms_opt(23, 59, 59).unwrap()).unwrap();
        let after = scheduler.setpoints(tomorrow, NaiveTime::MIN).unwrap();
        assert!((before.heat - after.heat).abs() < 1e-4);
    }

    #[test]
    fn scheduler_is_idempotent() {
        let location = Location { latitude: 45.5, longitude: -73.56, utc_offset: -5 };
        let mut scheduler = Scheduler::new(location, greenhouse_table());
        let date = NaiveDate::from_ymd_opt(2017, 12, 8).unwrap();
        let first = scheduler.setpoints(date, hm(10, 0)).unwrap();
        let second = scheduler.setpoints(date, hm(10, 0)).unwrap();
        assert_eq!(first, second);
    }
}
