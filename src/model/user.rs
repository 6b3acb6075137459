use chrono::{DateTime, Utc, Weekday};
use serde::Serialize;
use sqlx::{FromRow, MySqlPool};
use utoipa::ToSchema;

use crate::calc::calendar::{CalendarError, parse_off_days_csv, weekday_name};
use crate::model::role::Role;

pub const USER_COLUMNS: &str = "id, username, role_id, full_name, email, designation, department, \
     salary, off_days, bank_name, account_title, account_number, is_active, created_at";

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub role_id: u8,
    pub full_name: String,
    pub email: Option<String>,
    pub designation: Option<String>,
    pub department: Option<String>,
    /// Monthly gross salary.
    pub salary: Option<f64>,
    /// Comma separated weekday names.
    pub off_days: String,
    pub bank_name: Option<String>,
    pub account_title: Option<String>,
    pub account_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        Role::from_id(self.role_id)
    }

    pub fn off_days(&self) -> Result<Vec<Weekday>, CalendarError> {
        parse_off_days_csv(&self.off_days)
    }

    pub async fn find(pool: &MySqlPool, id: u64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_active(pool: &MySqlPool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_active = TRUE ORDER BY id"
        ))
        .fetch_all(pool)
        .await
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 12,
    "username": "amina.k",
    "role": "instructor",
    "fullName": "Amina Khan",
    "email": "amina@example.com",
    "designation": "Flight Instructor",
    "department": "Training",
    "salary": 180000.0,
    "offDays": ["Saturday", "Sunday"],
    "bankName": "HBL",
    "accountTitle": "Amina Khan",
    "accountNumber": "0123456789",
    "isActive": true,
    "createdAt": "2026-01-01T00:00:00Z"
}))]
pub struct UserResponse {
    pub id: u64,
    pub username: String,
    pub role: String,
    pub full_name: String,
    pub email: Option<String>,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub salary: Option<f64>,
    pub off_days: Vec<String>,
    pub bank_name: Option<String>,
    pub account_title: Option<String>,
    pub account_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        // stored values were validated on write; fall back to the raw text if not
        let off_days = match u.off_days() {
            Ok(days) => days.into_iter().map(|d| weekday_name(d).to_string()).collect(),
            Err(_) => u
                .off_days
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
                .collect(),
        };

        UserResponse {
            role: u.role().map_or_else(|| "unknown".to_string(), |r| r.to_string()),
            off_days,
            id: u.id,
            username: u.username,
            full_name: u.full_name,
            email: u.email,
            designation: u.designation,
            department: u.department,
            salary: u.salary,
            bank_name: u.bank_name,
            account_title: u.account_title,
            account_number: u.account_number,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(off_days: &str) -> User {
        User {
            id: 1,
            username: "sana".into(),
            role_id: 3,
            full_name: "Sana Malik".into(),
            email: None,
            designation: None,
            department: None,
            salary: Some(90_000.0),
            off_days: off_days.into(),
            bank_name: None,
            account_title: None,
            account_number: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn response_normalises_off_days() {
        let resp = UserResponse::from(user("sun,Sat"));
        assert_eq!(resp.off_days, vec!["Saturday", "Sunday"]);
        assert_eq!(resp.role, "employee");
    }

    #[test]
    fn response_keeps_unparseable_off_days_verbatim() {
        let resp = UserResponse::from(user("Sunday, Someday"));
        assert_eq!(resp.off_days, vec!["Sunday", "Someday"]);
    }
}
