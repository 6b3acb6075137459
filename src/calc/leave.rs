//! Leave date validation and day charging.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

use super::calendar::working_dates_between;

#[derive(Debug, Error, PartialEq)]
pub enum LeaveError {
    #[error("From date cannot be after to date")]
    InvertedRange,

    #[error("{0} leave must start and end on the same day")]
    NotSingleDay(&'static str),

    #[error("Selected dates are all off days")]
    NoWorkingDays,

    #[error("Insufficient leave balance: {remaining} day(s) left, {requested} requested")]
    InsufficientBalance { remaining: f64, requested: f64 },
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveType {
    Full,
    Short,
    Half,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveCategory {
    Casual,
    Medical,
    Annual,
    Sick,
    Unpaid,
    Other,
}

impl LeaveCategory {
    /// Unpaid leave is never charged against the yearly allowance.
    pub fn uses_allowance(self) -> bool {
        self != LeaveCategory::Unpaid
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Days charged for a request.
///
/// Full leave counts working days in the range; half leave is 0.5 and short leave
/// 0.25 of a single day.
pub fn leave_days(
    leave_type: LeaveType,
    from: NaiveDate,
    to: NaiveDate,
    off_days: &[Weekday],
) -> Result<f64, LeaveError> {
    if from > to {
        return Err(LeaveError::InvertedRange);
    }

    match leave_type {
        LeaveType::Full => {
            let days = working_dates_between(from, to, off_days).len();
            if days == 0 {
                return Err(LeaveError::NoWorkingDays);
            }
            Ok(days as f64)
        }
        LeaveType::Half if from != to => Err(LeaveError::NotSingleDay("Half day")),
        LeaveType::Short if from != to => Err(LeaveError::NotSingleDay("Short")),
        LeaveType::Half => Ok(0.5),
        LeaveType::Short => Ok(0.25),
    }
}

/// Checks that accepting `requested` days keeps the allowance non-negative.
pub fn check_balance(total: f64, used: f64, requested: f64) -> Result<f64, LeaveError> {
    let remaining = total - used;
    if requested > remaining {
        return Err(LeaveError::InsufficientBalance { remaining, requested });
    }
    Ok(remaining - requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::calendar::parse_off_days;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn full_leave_skips_weekends() {
        let weekend = parse_off_days(&["Saturday", "Sunday"]).unwrap();
        // Fri 5th .. Tue 9th
        assert_eq!(leave_days(LeaveType::Full, date(5), date(9), &weekend), Ok(3.0));
        assert_eq!(leave_days(LeaveType::Full, date(5), date(9), &[]), Ok(5.0));
        assert_eq!(
            leave_days(LeaveType::Full, date(6), date(7), &weekend),
            Err(LeaveError::NoWorkingDays)
        );
    }

    #[test]
    fn partial_days_are_single_day_only() {
        assert_eq!(leave_days(LeaveType::Half, date(8), date(8), &[]), Ok(0.5));
        assert_eq!(leave_days(LeaveType::Short, date(8), date(8), &[]), Ok(0.25));
        assert_eq!(
            leave_days(LeaveType::Half, date(8), date(9), &[]),
            Err(LeaveError::NotSingleDay("Half day"))
        );
    }

    #[test]
    fn inverted_range_fails_first() {
        assert_eq!(
            leave_days(LeaveType::Half, date(9), date(8), &[]),
            Err(LeaveError::InvertedRange)
        );
    }

    #[test]
    fn balance_check() {
        assert_eq!(check_balance(14.0, 10.0, 3.5), Ok(0.5));
        assert_eq!(
            check_balance(14.0, 12.0, 3.0),
            Err(LeaveError::InsufficientBalance {
                remaining: 2.0,
                requested: 3.0
            })
        );
    }

    #[test]
    fn enum_text_matches_storage() {
        assert_eq!(LeaveCategory::Unpaid.to_string(), "unpaid");
        assert_eq!("accepted".parse::<LeaveStatus>(), Ok(LeaveStatus::Accepted));
        assert!(!LeaveCategory::Unpaid.uses_allowance());
        assert!(LeaveCategory::Sick.uses_allowance());
    }
}
