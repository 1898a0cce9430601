use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// `num_days_from_ce` of 1949-12-31, the day before the first day of 1950.
/// Epoch 1.0 is therefore 1950-01-01 00:00:00 UTC.
const REFERENCE_DAY_FROM_CE: i64 = 711_857;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidDateError {
    #[error("year {0} is outside 1900..=2100")]
    Year(i32),
    #[error("month {0} is outside 1..=12")]
    Month(u32),
    #[error("day {day} does not exist in {year}-{month:02}")]
    Day { year: i32, month: u32, day: u32 },
    #[error("hour {0} is outside 0..=23")]
    Hour(u32),
    #[error("minute {0} is outside 0..=59")]
    Minute(u32),
    #[error("second {0} is outside 0..=59")]
    Second(u32),
    #[error("epoch {0} has no calendar representation")]
    Epoch(f64),
}

/// Fractional days since 1950 Jan 0.0 UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(pub f64);

impl Epoch {
    pub fn days(self) -> f64 {
        self.0
    }

    pub fn advance(self, delta_days: f64) -> Epoch {
        Epoch(self.0 + delta_days)
    }

    /// Days elapsed from `earlier` to `self`.
    pub fn since(self, earlier: Epoch) -> f64 {
        self.0 - earlier.0
    }

    pub fn to_calendar(self) -> Result<Datetime, InvalidDateError> {
        to_calendar(self)
    }
}

/// Civil UTC date and time, whole seconds, no leap seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Datetime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Datetime {
    pub fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        Datetime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    fn validate(&self) -> Result<(NaiveDate, NaiveTime), InvalidDateError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(InvalidDateError::Year(self.year));
        }
        if !(1..=12).contains(&self.month) {
            return Err(InvalidDateError::Month(self.month));
        }
        if self.hour > 23 {
            return Err(InvalidDateError::Hour(self.hour));
        }
        if self.minute > 59 {
            return Err(InvalidDateError::Minute(self.minute));
        }
        if self.second > 59 {
            return Err(InvalidDateError::Second(self.second));
        }
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day).ok_or(
            InvalidDateError::Day {
                year: self.year,
                month: self.month,
                day: self.day,
            },
        )?;
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, self.second)
            .ok_or(InvalidDateError::Second(self.second))?;
        Ok((date, time))
    }
}

impl fmt::Display for Datetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let month = MONTH_NAMES
            .get(self.month.wrapping_sub(1) as usize)
            .copied()
            .unwrap_or("?");
        write!(
            f,
            "{} {}, {} {:02}:{:02}:{:02} UTC",
            month, self.day, self.year, self.hour, self.minute, self.second
        )
    }
}

pub fn from_calendar(datetime: Datetime) -> Result<Epoch, InvalidDateError> {
    let (date, time) = datetime.validate()?;
    let days = i64::from(date.num_days_from_ce()) - REFERENCE_DAY_FROM_CE;
    let seconds = i64::from(time.num_seconds_from_midnight());
    Ok(Epoch(days as f64 + seconds as f64 / SECONDS_PER_DAY))
}

/// Rounds to the nearest whole second before splitting into fields.
pub fn to_calendar(epoch: Epoch) -> Result<Datetime, InvalidDateError> {
    let total = (epoch.0 * SECONDS_PER_DAY).round();
    if !total.is_finite() || total.abs() > i32::MAX as f64 * SECONDS_PER_DAY {
        return Err(InvalidDateError::Epoch(epoch.0));
    }
    let total = total as i64;
    let days = total.div_euclid(86_400) + REFERENCE_DAY_FROM_CE;
    let seconds = total.rem_euclid(86_400) as u32;

    let date = i32::try_from(days)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or(InvalidDateError::Epoch(epoch.0))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
        .ok_or(InvalidDateError::Epoch(epoch.0))?;

    Ok(Datetime {
        year: date.year(),
        month: date.month(),
        day: date.day(),
        hour: time.hour(),
        minute: time.minute(),
        second: time.second(),
    })
}

pub fn advance(epoch: Epoch, delta_days: f64) -> Epoch {
    epoch.advance(delta_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use proptest::prelude::*;

    #[test]
    fn reference_day_is_day_one() {
        let epoch = from_calendar(Datetime::new(1950, 1, 1, 0, 0, 0)).unwrap();
        assert_eq!(epoch, Epoch(1.0));
        let noon = from_calendar(Datetime::new(1950, 1, 1, 12, 0, 0)).unwrap();
        assert_approx_eq!(noon.days(), 1.5, 1e-12);
    }

    #[test]
    fn advancing_one_day_crosses_midnight() {
        let e0 = from_calendar(Datetime::new(2024, 1, 1, 0, 0, 0)).unwrap();
        assert_eq!(e0, Epoch(27_029.0));
        let next = to_calendar(advance(e0, 1.0)).unwrap();
        assert_eq!(next, Datetime::new(2024, 1, 2, 0, 0, 0));
    }

    #[test]
    fn leap_years_follow_gregorian_rules() {
        assert!(from_calendar(Datetime::new(2024, 2, 29, 0, 0, 0)).is_ok());
        assert!(from_calendar(Datetime::new(2000, 2, 29, 0, 0, 0)).is_ok());
        assert_eq!(
            from_calendar(Datetime::new(2023, 2, 29, 0, 0, 0)),
            Err(InvalidDateError::Day {
                year: 2023,
                month: 2,
                day: 29
            })
        );
        assert!(from_calendar(Datetime::new(2100, 2, 29, 0, 0, 0)).is_err());

        let feb28 = from_calendar(Datetime::new(2024, 2, 28, 23, 59, 59)).unwrap();
        let next = to_calendar(feb28.advance(1.0 / SECONDS_PER_DAY)).unwrap();
        assert_eq!(next, Datetime::new(2024, 2, 29, 0, 0, 0));
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let base = Datetime::new(2024, 4, 30, 12, 30, 30);
        assert!(from_calendar(base).is_ok());
        assert_eq!(
            from_calendar(Datetime { month: 13, ..base }),
            Err(InvalidDateError::Month(13))
        );
        assert_eq!(
            from_calendar(Datetime { month: 0, ..base }),
            Err(InvalidDateError::Month(0))
        );
        assert!(matches!(
            from_calendar(Datetime { day: 31, ..base }),
            Err(InvalidDateError::Day { .. })
        ));
        assert!(matches!(
            from_calendar(Datetime { day: 0, ..base }),
            Err(InvalidDateError::Day { .. })
        ));
        assert_eq!(
            from_calendar(Datetime { hour: 24, ..base }),
            Err(InvalidDateError::Hour(24))
        );
        assert_eq!(
            from_calendar(Datetime { minute: 60, ..base }),
            Err(InvalidDateError::Minute(60))
        );
        assert_eq!(
            from_calendar(Datetime { second: 60, ..base }),
            Err(InvalidDateError::Second(60))
        );
        assert_eq!(
            from_calendar(Datetime { year: 1899, ..base }),
            Err(InvalidDateError::Year(1899))
        );
    }

    #[test]
    fn non_finite_epoch_has_no_calendar() {
        assert!(to_calendar(Epoch(f64::NAN)).is_err());
        assert!(to_calendar(Epoch(f64::INFINITY)).is_err());
    }

    #[test]
    fn display_matches_hud_format() {
        let dt = Datetime::new(2024, 1, 2, 3, 4, 5);
        assert_eq!(dt.to_string(), "January 2, 2024 03:04:05 UTC");
    }

    fn days_in_month(year: i32, month: u32) -> u32 {
        let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let first_next = NaiveDate::from_ymd_opt(ny, nm, 1).unwrap();
        first_next.pred_opt().unwrap().day()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_calendar_round_trip(
            year in MIN_YEAR..=MAX_YEAR,
            month in 1u32..=12,
            day_fraction in 0.0f64..1.0,
            hour in 0u32..24,
            minute in 0u32..60,
            second in 0u32..60,
        ) {
            let max_day = days_in_month(year, month);
            let day = 1 + ((day_fraction * max_day as f64) as u32).min(max_day - 1);
            let dt = Datetime::new(year, month, day, hour, minute, second);
            let epoch = from_calendar(dt).unwrap();
            prop_assert_eq!(to_calendar(epoch).unwrap(), dt);
        }
    }
}
