use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::calc::{
    overtime::{OvertimePayoutInput, calc_overtime_payout},
    round_currency,
    time_slots::TimeSlot,
};

pub const CLAIM_COLUMNS: &str =
    "id, instructor_id, date, total_duration_minutes, salary, verified, verified_by, notes, created_at";

#[derive(Debug, Clone, FromRow)]
pub struct OvertimeClaimRow {
    pub id: u64,
    pub instructor_id: u64,
    pub date: NaiveDate,
    pub total_duration_minutes: i64,
    pub salary: Option<f64>,
    pub verified: bool,
    pub verified_by: Option<u64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OvertimeSlotRow {
    pub claim_id: u64,
    pub slot_from: NaiveDateTime,
    pub slot_to: NaiveDateTime,
    pub duration_minutes: i64,
}

impl From<OvertimeSlotRow> for TimeSlot {
    fn from(row: OvertimeSlotRow) -> Self {
        TimeSlot {
            from: row.slot_from,
            to: row.slot_to,
            duration_minutes: row.duration_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OvertimeClaim {
    pub id: u64,
    pub instructor_id: u64,
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
    pub total_duration_minutes: i64,
    /// Monthly salary captured when the claim was submitted.
    pub salary: Option<f64>,
    pub verified: bool,
    pub verified_by: Option<u64>,
    pub notes: Option<String>,
    /// `null` when the salary snapshot is missing.
    pub payout: Option<f64>,
    pub created_at: DateTime<Utc>,
}

pub fn claim_payout(salary: Option<f64>, minutes: i64, date: NaiveDate) -> Option<f64> {
    let date = date.format("%Y-%m-%d").to_string();
    calc_overtime_payout(&OvertimePayoutInput {
        salary,
        total_duration_minutes: Some(minutes as f64),
        date: &date,
    })
    .map(round_currency)
}

impl OvertimeClaim {
    pub fn from_parts(row: OvertimeClaimRow, slots: Vec<TimeSlot>) -> Self {
        OvertimeClaim {
            payout: claim_payout(row.salary, row.total_duration_minutes, row.date),
            id: row.id,
            instructor_id: row.instructor_id,
            date: row.date,
            slots,
            total_duration_minutes: row.total_duration_minutes,
            salary: row.salary,
            verified: row.verified,
            verified_by: row.verified_by,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_is_rounded_and_optional() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert_eq!(claim_payout(Some(30_000.0), 100, date), Some(191.57));
        assert_eq!(claim_payout(None, 100, date), None);
    }
}
