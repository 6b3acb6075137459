//! Month calendar arithmetic: days in month, off days, working days.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, PartialEq)]
pub enum CalendarError {
    #[error("Invalid month {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("Unknown weekday '{0}'")]
    UnknownWeekday(String),
}

/// Working-day breakdown of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthCalendar {
    pub days_in_month: u32,
    pub off_days: u32,
    /// Public holidays that fall on a working weekday.
    pub public_holidays: u32,
    pub working_days: u32,
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, CalendarError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(CalendarError::InvalidMonth { year, month })
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32, CalendarError> {
    let first = first_of_month(year, month)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(CalendarError::InvalidMonth { year, month })?;

    Ok(next.signed_duration_since(first).num_days() as u32)
}

/// First and last date of the month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), CalendarError> {
    let first = first_of_month(year, month)?;
    let days = days_in_month(year, month)?;
    let last = NaiveDate::from_ymd_opt(year, month, days).ok_or(CalendarError::InvalidMonth { year, month })?;
    Ok((first, last))
}

/// Every date of the month, first to last.
pub fn month_dates(year: i32, month: u32) -> Result<Vec<NaiveDate>, CalendarError> {
    let first = first_of_month(year, month)?;
    let days = days_in_month(year, month)?;
    Ok(first.iter_days().take(days as usize).collect())
}

/// Accepts full ("Saturday") or short ("sat") English names, any case.
pub fn parse_weekday(name: &str) -> Result<Weekday, CalendarError> {
    let weekday = match name.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thur" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return Err(CalendarError::UnknownWeekday(name.to_string())),
    };
    Ok(weekday)
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parses a list of weekday names into a de-duplicated set, Monday first.
pub fn parse_off_days<S: AsRef<str>>(names: &[S]) -> Result<Vec<Weekday>, CalendarError> {
    let mut days = names
        .iter()
        .map(|n| parse_weekday(n.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    Ok(days)
}

/// Off days as stored on the user row: comma separated names, blanks ignored.
pub fn parse_off_days_csv(raw: &str) -> Result<Vec<Weekday>, CalendarError> {
    let names: Vec<&str> = raw.split(',').filter(|s| !s.trim().is_empty()).collect();
    parse_off_days(&names)
}

pub fn off_days_to_csv(days: &[Weekday]) -> String {
    days.iter()
        .map(|d| weekday_name(*d))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn is_off_day(date: NaiveDate, off_days: &[Weekday]) -> bool {
    off_days.contains(&date.weekday())
}

pub fn count_off_days(year: i32, month: u32, off_days: &[Weekday]) -> Result<u32, CalendarError> {
    Ok(month_dates(year, month)?
        .into_iter()
        .filter(|d| is_off_day(*d, off_days))
        .count() as u32)
}

/// Builds the working-day breakdown of a month.
///
/// Holidays outside the month or landing on an off day are not counted twice.
pub fn month_calendar(
    year: i32,
    month: u32,
    off_days: &[Weekday],
    public_holidays: &[NaiveDate],
) -> Result<MonthCalendar, CalendarError> {
    let dates = month_dates(year, month)?;
    let days_in_month = dates.len() as u32;

    let mut off = 0;
    let mut holidays = 0;
    for date in &dates {
        if is_off_day(*date, off_days) {
            off += 1;
        } else if public_holidays.contains(date) {
            holidays += 1;
        }
    }

    Ok(MonthCalendar {
        days_in_month,
        off_days: off,
        public_holidays: holidays,
        working_days: days_in_month - off - holidays,
    })
}

/// Dates in `from..=to` that are not off days.
pub fn working_dates_between(from: NaiveDate, to: NaiveDate, off_days: &[Weekday]) -> Vec<NaiveDate> {
    if from > to {
        return Vec::new();
    }
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| !is_off_day(*d, off_days))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2).unwrap(), 29);
        assert_eq!(days_in_month(2023, 2).unwrap(), 28);
        assert_eq!(days_in_month(1900, 2).unwrap(), 28);
        assert_eq!(days_in_month(2000, 2).unwrap(), 29);
        assert_eq!(days_in_month(2024, 12).unwrap(), 31);
        assert_eq!(days_in_month(2024, 4).unwrap(), 30);
    }

    #[test]
    fn bounds_cover_the_month() {
        assert_eq!(month_bounds(2024, 2).unwrap(), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(month_bounds(2023, 12).unwrap(), (date(2023, 12, 1), date(2023, 12, 31)));
    }

    #[test]
    fn rejects_month_thirteen() {
        assert_eq!(
            days_in_month(2024, 13),
            Err(CalendarError::InvalidMonth { year: 2024, month: 13 })
        );
        assert!(days_in_month(2024, 0).is_err());
    }

    #[test]
    fn weekend_count_follows_real_calendar() {
        // 2024-01-01 is a Monday: four Saturdays, four Sundays.
        let weekend = parse_off_days(&["Saturday", "Sunday"]).unwrap();
        assert_eq!(count_off_days(2024, 1, &weekend).unwrap(), 8);

        // March 2024 starts on a Friday: five Fridays, Saturdays and Sundays.
        assert_eq!(count_off_days(2024, 3, &weekend).unwrap(), 10);

        let friday = parse_off_days(&["fri"]).unwrap();
        assert_eq!(count_off_days(2024, 3, &friday).unwrap(), 5);
    }

    #[test]
    fn parses_names_loosely_and_dedups() {
        let days = parse_off_days(&["sunday", " SAT ", "Sun"]).unwrap();
        assert_eq!(days, vec![Weekday::Sat, Weekday::Sun]);
        assert_eq!(
            parse_weekday("Caturday"),
            Err(CalendarError::UnknownWeekday("Caturday".into()))
        );
    }

    #[test]
    fn csv_storage_format() {
        let days = parse_off_days_csv("Sunday,,Saturday").unwrap();
        assert_eq!(off_days_to_csv(&days), "Saturday,Sunday");
        assert!(parse_off_days_csv("").unwrap().is_empty());
    }

    #[test]
    fn month_calendar_skips_holidays_on_off_days() {
        let weekend = parse_off_days(&["Saturday", "Sunday"]).unwrap();
        let holidays = [
            date(2024, 2, 5),  // Monday, counted
            date(2024, 2, 10), // Saturday, already off
            date(2024, 3, 23), // other month
        ];
        let cal = month_calendar(2024, 2, &weekend, &holidays).unwrap();
        assert_eq!(
            cal,
            MonthCalendar {
                days_in_month: 29,
                off_days: 8,
                public_holidays: 1,
                working_days: 20,
            }
        );
    }

    #[test]
    fn working_dates_skip_off_days() {
        let weekend = parse_off_days(&["Saturday", "Sunday"]).unwrap();
        let dates = working_dates_between(date(2024, 1, 5), date(2024, 1, 9), &weekend);
        assert_eq!(dates, vec![date(2024, 1, 5), date(2024, 1, 8), date(2024, 1, 9)]);
        assert!(working_dates_between(date(2024, 1, 9), date(2024, 1, 5), &weekend).is_empty());
    }
}
