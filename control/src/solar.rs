//! Sunrise and sunset from date and location (NOAA day-length approximation).

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const MINUTES_PER_DAY: f64 = 1440.0;
// Apparent sunrise: refraction plus the solar disc radius.
const SUNRISE_ZENITH_DEG: f64 = 90.833;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Hours east of UTC, standard time all year.
    pub utc_offset: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Daylight {
    Regular,
    /// Sun never sets; events are clamped to the bounds of the day.
    MidnightSun,
    /// Sun never rises; both events are clamped to solar noon.
    PolarNight,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
    pub daylight: Daylight,
}

pub fn sun_times(date: NaiveDate, location: &Location) -> SunTimes {
    let days_in_year = if date.leap_year() { 366.0 } else { 365.0 };
    let gamma = 2.0 * PI / days_in_year * (date.ordinal() as f64 - 1.0);

    let eq_time = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());
    let declination = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    let lat = location.latitude.to_radians();
    let cos_ha = SUNRISE_ZENITH_DEG.to_radians().cos() / (lat.cos() * declination.cos())
        - lat.tan() * declination.tan();

    let local_offset = location.utc_offset as f64 * 60.0;
    let solar_noon = 720.0 - 4.0 * location.longitude - eq_time + local_offset;

    if cos_ha < -1.0 {
        return SunTimes {
            sunrise: NaiveTime::MIN,
            sunset: time_of_day(MINUTES_PER_DAY - 1.0 / 60.0),
            daylight: Daylight::MidnightSun,
        };
    }
    if cos_ha > 1.0 {
        let noon = time_of_day(solar_noon);
        return SunTimes {
            sunrise: noon,
            sunset: noon,
            daylight: Daylight::PolarNight,
        };
    }

    let ha = cos_ha.acos().to_degrees();
    SunTimes {
        sunrise: time_of_day(solar_noon - 4.0 * ha),
        sunset: time_of_day(solar_noon + 4.0 * ha),
        daylight: Daylight::Regular,
    }
}

/// Wraps fractional minutes since midnight onto a time of day, whole seconds.
fn time_of_day(minutes: f64) -> NaiveTime {
    let secs = (minutes.rem_euclid(MINUTES_PER_DAY) * 60.0).round() as u32 % 86_400;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const MONTREAL: Location = Location {
        latitude: 45.50,
        longitude: -73.56,
        utc_offset: -5,
    };

    fn minutes(t: NaiveTime) -> i64 {
        (t.num_seconds_from_midnight() / 60) as i64
    }

    fn near(t: NaiveTime, h: u32, m: u32, tolerance: i64) -> bool {
        (minutes(t) - (h * 60 + m) as i64).abs() <= tolerance
    }

    #[test]
    fn montreal_early_december() {
        let sun = sun_times(NaiveDate::from_ymd_opt(2017, 12, 8).unwrap(), &MONTREAL);
        assert_eq!(sun.daylight, Daylight::Regular);
        assert!(near(sun.sunrise, 7, 21, 3), "sunrise {}", sun.sunrise);
        assert!(near(sun.sunset, 16, 11, 3), "sunset {}", sun.sunset);
    }

    #[test]
    fn montreal_summer_solstice_in_standard_time() {
        let sun = sun_times(NaiveDate::from_ymd_opt(2017, 6, 21).unwrap(), &MONTREAL);
        assert!(near(sun.sunrise, 4, 5, 3), "sunrise {}", sun.sunrise);
        assert!(near(sun.sunset, 19, 46, 3), "sunset {}", sun.sunset);
    }

    #[test]
    fn equinox_day_is_about_twelve_hours() {
        let sun = sun_times(NaiveDate::from_ymd_opt(2017, 3, 20).unwrap(), &MONTREAL);
        let length = minutes(sun.sunset) - minutes(sun.sunrise);
        assert!((length - 12 * 60).abs() < 15, "day length {}", length);
    }

    #[test]
    fn polar_conditions_are_reported() {
        let svalbard = Location {
            latitude: 78.2,
            longitude: 15.6,
            utc_offset: 1,
        };
        let summer = sun_times(NaiveDate::from_ymd_opt(2017, 6, 21).unwrap(), &svalbard);
        assert_eq!(summer.daylight, Daylight::MidnightSun);
        assert_eq!(summer.sunrise, NaiveTime::MIN);
        assert!(summer.sunset > NaiveTime::from_hms_opt(23, 59, 0).unwrap());

        let winter = sun_times(NaiveDate::from_ymd_opt(2017, 12, 21).unwrap(), &svalbard);
        assert_eq!(winter.daylight, Daylight::PolarNight);
        assert_eq!(winter.sunrise, winter.sunset);
        assert!(near(winter.sunrise, 11, 55, 3));
    }

    #[test]
    fn wraps_past_midnight() {
        assert_eq!(time_of_day(-1.0), NaiveTime::from_hms_opt(23, 59, 0).unwrap());
        assert_eq!(time_of_day(1441.0), NaiveTime::from_hms_opt(0, 1, 0).unwrap());
    }
}
