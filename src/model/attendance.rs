use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::calc::attendance::{DayMark, worked_minutes};

pub const ATTENDANCE_COLUMNS: &str =
    "id, user_id, date, status, sub_status, action, check_in, check_out, note, worked_minutes";

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    #[schema(example = "present")]
    pub status: String,
    #[schema(example = "half_day", nullable = true)]
    pub sub_status: Option<String>,
    #[schema(example = "paid", nullable = true)]
    pub action: Option<String>,
    #[serde(with = "crate::utils::hhmm")]
    #[schema(value_type = Option<String>, example = "09:00")]
    pub check_in: Option<NaiveTime>,
    #[serde(with = "crate::utils::hhmm")]
    #[schema(value_type = Option<String>, example = "17:30")]
    pub check_out: Option<NaiveTime>,
    pub note: Option<String>,
    pub worked_minutes: Option<i64>,
}

impl Attendance {
    /// Derived minutes win over the stored value.
    pub fn with_derived_minutes(mut self) -> Self {
        if let Some(m) = worked_minutes(self.check_in, self.check_out) {
            self.worked_minutes = Some(m);
        }
        self
    }

    /// `None` when the stored status text is not one we know.
    pub fn to_day_mark(&self) -> Option<DayMark> {
        Some(DayMark {
            date: self.date,
            status: self.status.parse().ok()?,
            sub_status: self.sub_status.as_deref().and_then(|s| s.parse().ok()),
            action: self.action.as_deref().and_then(|s| s.parse().ok()),
            worked_minutes: self.worked_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::attendance::{AttendanceAction, AttendanceStatus, SubStatus};

    fn row() -> Attendance {
        Attendance {
            id: 1,
            user_id: 4,
            date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            status: "leave".into(),
            sub_status: Some("half_day".into()),
            action: Some("unpaid".into()),
            check_in: NaiveTime::from_hms_opt(9, 0, 0),
            check_out: NaiveTime::from_hms_opt(13, 15, 0),
            note: None,
            worked_minutes: Some(10),
        }
    }

    #[test]
    fn derives_minutes_and_marks() {
        let rec = row().with_derived_minutes();
        assert_eq!(rec.worked_minutes, Some(255));

        let mark = rec.to_day_mark().unwrap();
        assert_eq!(mark.status, AttendanceStatus::Leave);
        assert_eq!(mark.sub_status, Some(SubStatus::HalfDay));
        assert_eq!(mark.action, Some(AttendanceAction::Unpaid));
    }

    #[test]
    fn serializes_camel_case_with_short_times() {
        let json = serde_json::to_value(row()).unwrap();
        assert_eq!(json["userId"], 4);
        assert_eq!(json["checkIn"], "09:00");
        assert_eq!(json["subStatus"], "half_day");
        assert_eq!(json["date"], "2024-01-08");
    }

    #[test]
    fn unknown_status_is_skipped() {
        let mut rec = row();
        rec.status = "sabbatical".into();
        assert!(rec.to_day_mark().is_none());
    }
}
