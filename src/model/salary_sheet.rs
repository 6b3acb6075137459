use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Column list shared by inserts, updates and selects, in struct order after `id`.
pub const SALARY_SHEET_FIELDS: &[&str] = &[
    "user_id",
    "year",
    "month",
    "employee_name",
    "designation",
    "department",
    "gross_salary",
    "basic_salary",
    "house_rent",
    "utilities",
    "medical_allowance",
    "conveyance_allowance",
    "other_allowance",
    "overtime_amount",
    "arrears",
    "days_in_month",
    "off_days",
    "public_holidays",
    "working_days",
    "absent_days",
    "unpaid_leave_days",
    "per_day_salary",
    "unpaid_days_deduction",
    "advance_deduction",
    "loan_deduction",
    "eobi_deduction",
    "other_deduction",
    "income_tax",
    "total_earnings",
    "total_deductions",
    "net_payable",
    "off_day_names",
    "holiday_dates",
    "bank_name",
    "account_title",
    "account_number",
    "remarks",
    "created_at",
];

pub fn select_columns() -> String {
    let mut cols = vec!["id"];
    cols.extend(SALARY_SHEET_FIELDS.iter().copied());
    cols.join(", ")
}

/// Columns written by INSERT / UPDATE (no id, no created_at).
pub fn writable_columns() -> Vec<&'static str> {
    SALARY_SHEET_FIELDS
        .iter()
        .copied()
        .filter(|c| *c != "created_at")
        .collect()
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalarySheet {
    pub id: u64,
    pub user_id: u64,
    pub year: i32,
    pub month: u32,
    pub employee_name: String,
    pub designation: Option<String>,
    pub department: Option<String>,

    pub gross_salary: f64,
    pub basic_salary: f64,
    pub house_rent: f64,
    pub utilities: f64,
    pub medical_allowance: f64,
    pub conveyance_allowance: f64,
    pub other_allowance: f64,
    pub overtime_amount: f64,
    pub arrears: f64,

    pub days_in_month: u32,
    pub off_days: u32,
    pub public_holidays: u32,
    pub working_days: u32,
    pub absent_days: f64,
    pub unpaid_leave_days: f64,

    pub per_day_salary: f64,
    pub unpaid_days_deduction: f64,
    pub advance_deduction: f64,
    pub loan_deduction: f64,
    pub eobi_deduction: f64,
    pub other_deduction: f64,
    pub income_tax: f64,

    pub total_earnings: f64,
    pub total_deductions: f64,
    pub net_payable: f64,

    /// Comma separated weekday names used for the calendar block.
    pub off_day_names: String,
    /// Comma separated `YYYY-MM-DD` public holidays.
    pub holiday_dates: Option<String>,

    pub bank_name: Option<String>,
    pub account_title: Option<String>,
    pub account_number: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}
