use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

pub const LEAVE_COLUMNS: &str = "id, user_id, from_date, to_date, leave_type, leave_category, status, \
     reason, approver_remarks, days, decided_by, created_at";

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "userId": 12,
    "fromDate": "2026-01-05",
    "toDate": "2026-01-07",
    "leaveType": "full",
    "leaveCategory": "casual",
    "status": "pending",
    "reason": "Family event",
    "approverRemarks": null,
    "days": 3.0,
    "decidedBy": null,
    "createdAt": "2026-01-01T00:00:00Z"
}))]
pub struct LeaveEntry {
    pub id: u64,
    pub user_id: u64,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub leave_type: String,
    pub leave_category: String,
    pub status: String,
    pub reason: Option<String>,
    pub approver_remarks: Option<String>,
    /// Days charged against the allowance.
    pub days: f64,
    pub decided_by: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AllowanceRow {
    pub user_id: u64,
    pub year: i32,
    pub total_days: f64,
    pub used_days: f64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveAllowance {
    pub user_id: u64,
    pub year: i32,
    pub total_days: f64,
    pub used_days: f64,
    pub remaining_days: f64,
}

impl From<AllowanceRow> for LeaveAllowance {
    fn from(row: AllowanceRow) -> Self {
        LeaveAllowance {
            user_id: row.user_id,
            year: row.year,
            total_days: row.total_days,
            used_days: row.used_days,
            remaining_days: row.total_days - row.used_days,
        }
    }
}
