use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::calc::round_currency;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequisitionStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, FromRow)]
pub struct FuelRequisitionRow {
    pub id: u64,
    pub user_id: u64,
    pub year: i32,
    pub month: u32,
    pub status: String,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FuelItem {
    pub id: u64,
    #[serde(skip)]
    pub requisition_id: u64,
    pub sr_no: u32,
    pub description: String,
    pub km: f64,
    pub rate: f64,
    pub amount: f64,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FuelRequisition {
    pub id: u64,
    pub user_id: u64,
    pub year: i32,
    pub month: u32,
    pub status: String,
    pub remarks: Option<String>,
    pub items: Vec<FuelItem>,
    pub total_km: f64,
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
}

impl FuelRequisition {
    pub fn from_parts(row: FuelRequisitionRow, items: Vec<FuelItem>) -> Self {
        let total_km = round_currency(items.iter().map(|i| i.km).sum());
        let total_amount = round_currency(items.iter().map(|i| i.amount).sum());

        FuelRequisition {
            id: row.id,
            user_id: row.user_id,
            year: row.year,
            month: row.month,
            status: row.status,
            remarks: row.remarks,
            items,
            total_km,
            total_amount,
            created_at: row.created_at,
        }
    }
}

/// Amount of one line: km driven times the per-km rate.
pub fn line_amount(km: f64, rate: f64) -> f64 {
    round_currency(km * rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sr_no: u32, km: f64, rate: f64) -> FuelItem {
        FuelItem {
            id: u64::from(sr_no),
            requisition_id: 1,
            sr_no,
            description: format!("Trip {sr_no}"),
            km,
            rate,
            amount: line_amount(km, rate),
            verified: false,
        }
    }

    #[test]
    fn totals_sum_the_lines() {
        let row = FuelRequisitionRow {
            id: 1,
            user_id: 3,
            year: 2024,
            month: 5,
            status: RequisitionStatus::Pending.to_string(),
            remarks: None,
            created_at: Utc::now(),
        };
        let req = FuelRequisition::from_parts(row, vec![item(1, 42.5, 28.0), item(2, 17.2, 28.0)]);

        assert_eq!(req.items[0].amount, 1_190.0);
        assert_eq!(req.items[1].amount, 481.6);
        assert_eq!(req.total_km, 59.7);
        assert_eq!(req.total_amount, 1_671.6);
        assert_eq!(req.status, "pending");
    }
}
