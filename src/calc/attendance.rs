//! Attendance mark validation and monthly bucketing.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

use super::calendar::MonthCalendar;

#[derive(Debug, Error, PartialEq)]
pub enum AttendanceError {
    #[error("Sub-status is only valid for leave")]
    SubStatusWithoutLeave,

    #[error("Paid/unpaid action is only valid for leave")]
    ActionWithoutLeave,

    #[error("Check-in time is only recorded for present, late or partial leave days")]
    TimesNotAllowed,

    #[error("Check-out needs a check-in")]
    CheckOutWithoutCheckIn,

    #[error("Check-out must be after check-in")]
    CheckOutBeforeCheckIn,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
    Late,
    OfficialOff,
    PublicHoliday,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubStatus {
    ShortLeave,
    HalfDay,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceAction {
    Paid,
    Unpaid,
}

/// Minutes between check-in and check-out, `None` unless both exist in order.
pub fn worked_minutes(check_in: Option<NaiveTime>, check_out: Option<NaiveTime>) -> Option<i64> {
    match (check_in, check_out) {
        (Some(start), Some(end)) if end > start => {
            Some(end.signed_duration_since(start).num_minutes())
        }
        _ => None,
    }
}

pub fn validate_mark(
    status: AttendanceStatus,
    sub_status: Option<SubStatus>,
    action: Option<AttendanceAction>,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
) -> Result<(), AttendanceError> {
    let is_leave = status == AttendanceStatus::Leave;

    if sub_status.is_some() && !is_leave {
        return Err(AttendanceError::SubStatusWithoutLeave);
    }
    if action.is_some() && !is_leave {
        return Err(AttendanceError::ActionWithoutLeave);
    }

    let times_allowed = matches!(status, AttendanceStatus::Present | AttendanceStatus::Late)
        || (is_leave && sub_status.is_some());
    if (check_in.is_some() || check_out.is_some()) && !times_allowed {
        return Err(AttendanceError::TimesNotAllowed);
    }

    match (check_in, check_out) {
        (None, Some(_)) => Err(AttendanceError::CheckOutWithoutCheckIn),
        (Some(start), Some(end)) if end <= start => Err(AttendanceError::CheckOutBeforeCheckIn),
        _ => Ok(()),
    }
}

/// Fraction of a day one leave mark represents.
pub fn leave_fraction(sub_status: Option<SubStatus>) -> f64 {
    match sub_status {
        None => 1.0,
        Some(SubStatus::HalfDay) => 0.5,
        Some(SubStatus::ShortLeave) => 0.25,
    }
}

/// The slice of a stored record the monthly summary needs.
#[derive(Debug, Clone)]
pub struct DayMark {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub sub_status: Option<SubStatus>,
    pub action: Option<AttendanceAction>,
    pub worked_minutes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAttendanceSummary {
    pub user_id: u64,
    pub year: i32,
    pub month: u32,
    pub present: u32,
    pub late: u32,
    pub absent: u32,
    pub leave: u32,
    pub official_off: u32,
    pub public_holiday: u32,
    pub unpaid_leave_days: f64,
    pub total_worked_minutes: i64,
    pub marked_days: u32,
    pub calendar: MonthCalendar,
}

pub fn summarize_month(
    user_id: u64,
    year: i32,
    month: u32,
    calendar: MonthCalendar,
    marks: &[DayMark],
) -> MonthlyAttendanceSummary {
    let mut summary = MonthlyAttendanceSummary {
        user_id,
        year,
        month,
        present: 0,
        late: 0,
        absent: 0,
        leave: 0,
        official_off: 0,
        public_holiday: 0,
        unpaid_leave_days: 0.0,
        total_worked_minutes: 0,
        marked_days: 0,
        calendar,
    };

    for mark in marks {
        summary.marked_days += 1;
        summary.total_worked_minutes += mark.worked_minutes.unwrap_or(0);

        match mark.status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Late => summary.late += 1,
            AttendanceStatus::Absent => summary.absent += 1,
            AttendanceStatus::OfficialOff => summary.official_off += 1,
            AttendanceStatus::PublicHoliday => summary.public_holiday += 1,
            AttendanceStatus::Leave => {
                summary.leave += 1;
                if mark.action == Some(AttendanceAction::Unpaid) {
                    summary.unpaid_leave_days += leave_fraction(mark.sub_status);
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::calendar::{month_calendar, parse_off_days};

    fn t(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    fn mark(
        day: u32,
        status: AttendanceStatus,
        sub_status: Option<SubStatus>,
        action: Option<AttendanceAction>,
        worked: Option<i64>,
    ) -> DayMark {
        DayMark {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            status,
            sub_status,
            action,
            worked_minutes: worked,
        }
    }

    #[test]
    fn worked_minutes_needs_both_times_in_order() {
        assert_eq!(worked_minutes(t(9, 0), t(17, 30)), Some(510));
        assert_eq!(worked_minutes(t(9, 0), None), None);
        assert_eq!(worked_minutes(t(17, 0), t(9, 0)), None);
    }

    #[test]
    fn leave_qualifiers_need_leave_status() {
        use AttendanceStatus::*;

        assert_eq!(
            validate_mark(Present, Some(SubStatus::HalfDay), None, None, None),
            Err(AttendanceError::SubStatusWithoutLeave)
        );
        assert_eq!(
            validate_mark(Absent, None, Some(AttendanceAction::Unpaid), None, None),
            Err(AttendanceError::ActionWithoutLeave)
        );
        assert_eq!(
            validate_mark(
                Leave,
                Some(SubStatus::ShortLeave),
                Some(AttendanceAction::Paid),
                t(9, 0),
                t(11, 0)
            ),
            Ok(())
        );
    }

    #[test]
    fn times_only_on_working_marks() {
        use AttendanceStatus::*;

        assert_eq!(validate_mark(Late, None, None, t(9, 40), None), Ok(()));
        assert_eq!(
            validate_mark(PublicHoliday, None, None, t(9, 0), None),
            Err(AttendanceError::TimesNotAllowed)
        );
        assert_eq!(
            validate_mark(Leave, None, None, t(9, 0), None),
            Err(AttendanceError::TimesNotAllowed)
        );
        assert_eq!(
            validate_mark(Present, None, None, None, t(17, 0)),
            Err(AttendanceError::CheckOutWithoutCheckIn)
        );
        assert_eq!(
            validate_mark(Present, None, None, t(17, 0), t(17, 0)),
            Err(AttendanceError::CheckOutBeforeCheckIn)
        );
    }

    #[test]
    fn buckets_a_month() {
        use AttendanceStatus::*;

        let weekend = parse_off_days(&["Saturday", "Sunday"]).unwrap();
        let calendar = month_calendar(2024, 1, &weekend, &[]).unwrap();
        let marks = vec![
            mark(1, Present, None, None, Some(480)),
            mark(2, Late, None, None, Some(420)),
            mark(3, Absent, None, None, None),
            mark(4, Leave, None, Some(AttendanceAction::Unpaid), None),
            mark(5, Leave, Some(SubStatus::HalfDay), Some(AttendanceAction::Unpaid), Some(240)),
            mark(8, Leave, None, Some(AttendanceAction::Paid), None),
            mark(9, PublicHoliday, None, None, None),
        ];

        let summary = summarize_month(7, 2024, 1, calendar.clone(), &marks);

        assert_eq!(summary.present, 1);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.leave, 3);
        assert_eq!(summary.public_holiday, 1);
        assert_eq!(summary.unpaid_leave_days, 1.5);
        assert_eq!(summary.total_worked_minutes, 1140);
        assert_eq!(summary.marked_days, 7);
        assert_eq!(summary.calendar, calendar);
        assert_eq!(summary.calendar.working_days, 23);
    }

    #[test]
    fn status_text_matches_storage() {
        assert_eq!(AttendanceStatus::OfficialOff.to_string(), "official_off");
        assert_eq!(
            "public_holiday".parse::<AttendanceStatus>(),
            Ok(AttendanceStatus::PublicHoliday)
        );
        assert_eq!(SubStatus::ShortLeave.to_string(), "short_leave");
    }
}
