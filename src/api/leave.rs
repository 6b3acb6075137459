use crate::auth::auth::AuthUser;
use crate::calc::attendance::{AttendanceAction, AttendanceStatus, SubStatus};
use crate::calc::calendar::working_dates_between;
use crate::calc::leave::{
    LeaveCategory, LeaveError, LeaveStatus, LeaveType, check_balance, leave_days,
};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::model::leave::{AllowanceRow, LEAVE_COLUMNS, LeaveAllowance, LeaveEntry};
use crate::model::user::User;
use crate::utils::pagination::{FilterValue, Filters, Pagination, bind_filters};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyLeave {
    /// Staff may apply on behalf of someone else
    pub user_id: Option<u64>,
    #[schema(example = "2026-01-05")]
    pub from_date: NaiveDate,
    #[schema(example = "2026-01-07")]
    pub to_date: NaiveDate,
    pub leave_type: LeaveType,
    pub leave_category: LeaveCategory,
    #[schema(example = "Family event")]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecideLeave {
    /// `accepted` or `rejected`
    pub status: LeaveStatus,
    #[schema(example = "Approved, enjoy")]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetAllowance {
    pub user_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 14.0)]
    pub total_days: f64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LeaveQuery {
    /// Filter by user (ignored for non-staff callers)
    pub user_id: Option<u64>,
    pub status: Option<LeaveStatus>,
    pub category: Option<LeaveCategory>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AllowanceQuery {
    pub user_id: Option<u64>,
    /// Defaults to the current year
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveListResponse {
    pub data: Vec<LeaveEntry>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

async fn fetch_leave(pool: &MySqlPool, id: u64) -> Result<Option<LeaveEntry>, sqlx::Error> {
    sqlx::query_as::<_, LeaveEntry>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Locks the allowance row for the year, creating it with the default quota if missing.
async fn lock_allowance(
    conn: &mut MySqlConnection,
    user_id: u64,
    year: i32,
    default_total: f64,
) -> Result<AllowanceRow, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT IGNORE INTO leave_allowances (user_id, year, total_days, used_days)
        VALUES (?, ?, ?, 0)
        "#,
    )
    .bind(user_id)
    .bind(year)
    .bind(default_total)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, AllowanceRow>(
        r#"
        SELECT user_id, year, total_days, used_days
        FROM leave_allowances
        WHERE user_id = ? AND year = ?
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .bind(year)
    .fetch_one(&mut *conn)
    .await
}

fn parse_stored<T: std::str::FromStr>(value: &str, what: &str) -> ApiResult<T> {
    value
        .parse()
        .map_err(|_| ApiError::Internal(format!("Stored {what} '{value}' is unknown")))
}

/// Attendance qualifiers written for each day of an accepted leave.
fn attendance_marks_for(
    leave_type: LeaveType,
    category: LeaveCategory,
) -> (Option<SubStatus>, AttendanceAction) {
    let sub_status = match leave_type {
        LeaveType::Full => None,
        LeaveType::Half => Some(SubStatus::HalfDay),
        LeaveType::Short => Some(SubStatus::ShortLeave),
    };
    let action = if category == LeaveCategory::Unpaid {
        AttendanceAction::Unpaid
    } else {
        AttendanceAction::Paid
    };
    (sub_status, action)
}

/// Dates must be in order and inside one calendar year.
fn check_leave_range(from: NaiveDate, to: NaiveDate) -> ApiResult<()> {
    if to < from {
        return Err(LeaveError::InvertedRange.into());
    }
    if from.year() != to.year() {
        return Err(ApiError::bad_request("Leave cannot span two years, split the request"));
    }
    Ok(())
}

/// Apply for leave
#[utoipa::path(
    post,
    path = "/api/leaves",
    request_body = ApplyLeave,
    responses(
        (status = 200, description = "Leave request submitted", body = LeaveEntry),
        (status = 400, description = "Invalid dates", body = Object, example = json!({
            "message": "From date cannot be after to date"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn apply_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ApplyLeave>,
) -> ApiResult<HttpResponse> {
    let user_id = payload.user_id.unwrap_or(auth.user_id);
    auth.require_self_or_staff(user_id)?;

    check_leave_range(payload.from_date, payload.to_date)?;

    let user = User::find(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let days = leave_days(
        payload.leave_type,
        payload.from_date,
        payload.to_date,
        &user.off_days()?,
    )?;

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (user_id, from_date, to_date, leave_type, leave_category, status, reason, days)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(payload.from_date)
    .bind(payload.to_date)
    .bind(payload.leave_type.to_string())
    .bind(payload.leave_category.to_string())
    .bind(LeaveStatus::Pending.to_string())
    .bind(payload.reason.as_deref())
    .bind(days)
    .execute(pool.get_ref())
    .await?;

    let id = result.last_insert_id();
    info!(leave_id = id, user_id, days, "Leave request submitted");

    let saved = fetch_leave(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::Internal("Leave vanished after save".into()))?;

    Ok(HttpResponse::Ok().json(saved))
}

/// List leave requests
#[utoipa::path(
    get,
    path = "/api/leaves",
    params(LeaveQuery),
    responses(
        (status = 200, description = "Paginated leave requests", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveQuery>,
) -> ApiResult<HttpResponse> {
    let paging = Pagination::new(query.page, query.per_page, 20);

    let mut filters = Filters::default();
    if let Some(user_id) = auth.scope_user_filter(query.user_id) {
        filters.push("user_id = ?", FilterValue::U64(user_id));
    }
    if let Some(status) = query.status {
        filters.push("status = ?", FilterValue::Str(status.to_string()));
    }
    if let Some(category) = query.category {
        filters.push("leave_category = ?", FilterValue::Str(category.to_string()));
    }

    let where_sql = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{where_sql}");
    debug!(sql = %count_sql, binds = ?filters.binds, "Counting leave requests");
    let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), &filters.binds)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests{where_sql} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let data = bind_filters!(sqlx::query_as::<_, LeaveEntry>(&data_sql), &filters.binds)
        .bind(paging.per_page)
        .bind(paging.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page: paging.page,
        per_page: paging.per_page,
        total,
    }))
}

/// Get a leave request
#[utoipa::path(
    get,
    path = "/api/leaves/{id}",
    params(("id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Leave request", body = LeaveEntry),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let leave = fetch_leave(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Leave not found"))?;

    auth.require_self_or_staff(leave.user_id)?;

    Ok(HttpResponse::Ok().json(leave))
}

/// Accept or reject a pending leave request.
///
/// Accepting charges the allowance (unless unpaid) and marks every working day of the
/// range as leave in attendance, all in one transaction.
#[utoipa::path(
    patch,
    path = "/api/leaves/{id}/status",
    params(("id" = u64, Path, description = "Leave request ID")),
    request_body = DecideLeave,
    responses(
        (status = 200, description = "Decision recorded", body = LeaveEntry),
        (status = 400, description = "Not pending or insufficient balance", body = Object, example = json!({
            "message": "Insufficient leave balance: 2 day(s) left, 3 requested"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn decide_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<DecideLeave>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    if payload.status == LeaveStatus::Pending {
        return Err(ApiError::bad_request("Decision must be accepted or rejected"));
    }

    let mut tx = pool.begin().await?;

    let leave = sqlx::query_as::<_, LeaveEntry>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Leave not found"))?;

    if leave.status != LeaveStatus::Pending.to_string() {
        return Err(ApiError::bad_request(format!("Leave is already {}", leave.status)));
    }

    if payload.status == LeaveStatus::Accepted {
        let leave_type: LeaveType = parse_stored(&leave.leave_type, "leave type")?;
        let category: LeaveCategory = parse_stored(&leave.leave_category, "leave category")?;

        if category.uses_allowance() {
            let year = leave.from_date.year();
            let allowance =
                lock_allowance(&mut tx, leave.user_id, year, config.default_leave_allowance).await?;
            check_balance(allowance.total_days, allowance.used_days, leave.days)?;

            sqlx::query(
                "UPDATE leave_allowances SET used_days = used_days + ? WHERE user_id = ? AND year = ?",
            )
            .bind(leave.days)
            .bind(leave.user_id)
            .bind(year)
            .execute(&mut *tx)
            .await?;
        }

        let user = User::find(pool.get_ref(), leave.user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        let (sub_status, action) = attendance_marks_for(leave_type, category);

        for date in working_dates_between(leave.from_date, leave.to_date, &user.off_days()?) {
            sqlx::query(
                r#"
                INSERT INTO attendance (user_id, date, status, sub_status, action)
                VALUES (?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    status = VALUES(status),
                    sub_status = VALUES(sub_status),
                    action = VALUES(action),
                    check_in = IF(VALUES(sub_status) IS NULL, NULL, check_in),
                    check_out = IF(VALUES(sub_status) IS NULL, NULL, check_out),
                    worked_minutes = IF(VALUES(sub_status) IS NULL, NULL, worked_minutes)
                "#,
            )
            .bind(leave.user_id)
            .bind(date)
            .bind(AttendanceStatus::Leave.to_string())
            .bind(sub_status.map(|s| s.to_string()))
            .bind(action.to_string())
            .execute(&mut *tx)
            .await?;
        }
    }

    sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, approver_remarks = ?, decided_by = ?, decided_at = NOW()
        WHERE id = ?
        "#,
    )
    .bind(payload.status.to_string())
    .bind(payload.remarks.as_deref())
    .bind(auth.user_id)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(leave_id = id, status = %payload.status, decided_by = auth.user_id, "Leave decided");

    let saved = fetch_leave(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave not found"))?;

    Ok(HttpResponse::Ok().json(saved))
}

/// Cancel a pending leave request
#[utoipa::path(
    delete,
    path = "/api/leaves/{id}",
    params(("id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Leave cancelled", body = Object, example = json!({
            "message": "Leave request cancelled"
        })),
        (status = 400, description = "Only pending requests can be cancelled"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();

    let leave = fetch_leave(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave not found"))?;
    auth.require_self_or_staff(leave.user_id)?;

    let result = sqlx::query("DELETE FROM leave_requests WHERE id = ? AND status = ?")
        .bind(id)
        .bind(LeaveStatus::Pending.to_string())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Only pending requests can be cancelled"));
    }

    info!(leave_id = id, by = auth.user_id, "Leave request cancelled");

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave request cancelled" })))
}

/// Leave allowance for a user and year
#[utoipa::path(
    get,
    path = "/api/leaves/allowance",
    params(AllowanceQuery),
    responses(
        (status = 200, description = "Allowance with remaining balance", body = LeaveAllowance),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_allowance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<AllowanceQuery>,
) -> ApiResult<HttpResponse> {
    let user_id = query.user_id.unwrap_or(auth.user_id);
    auth.require_self_or_staff(user_id)?;
    let year = query.year.unwrap_or_else(|| chrono::Local::now().year());

    let row = sqlx::query_as::<_, AllowanceRow>(
        "SELECT user_id, year, total_days, used_days FROM leave_allowances WHERE user_id = ? AND year = ?",
    )
    .bind(user_id)
    .bind(year)
    .fetch_optional(pool.get_ref())
    .await?
    .unwrap_or(AllowanceRow {
        user_id,
        year,
        total_days: config.default_leave_allowance,
        used_days: 0.0,
    });

    Ok(HttpResponse::Ok().json(LeaveAllowance::from(row)))
}

/// Set a user's yearly leave quota
#[utoipa::path(
    put,
    path = "/api/leaves/allowance",
    request_body = SetAllowance,
    responses(
        (status = 200, description = "Allowance saved", body = LeaveAllowance),
        (status = 400, description = "Quota below days already used"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn set_allowance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SetAllowance>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    if !payload.total_days.is_finite() || payload.total_days < 0.0 {
        return Err(ApiError::bad_request("Total days must be zero or more"));
    }

    // INSERT IGNORE swallows the foreign key failure, so check first
    if User::find(pool.get_ref(), payload.user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let mut tx = pool.begin().await?;
    let current =
        lock_allowance(&mut tx, payload.user_id, payload.year, payload.total_days).await?;

    if payload.total_days < current.used_days {
        warn!(user_id = payload.user_id, used = current.used_days, "Allowance below usage refused");
        return Err(ApiError::bad_request(format!(
            "{} day(s) are already used this year",
            current.used_days
        )));
    }

    sqlx::query("UPDATE leave_allowances SET total_days = ? WHERE user_id = ? AND year = ?")
        .bind(payload.total_days)
        .bind(payload.user_id)
        .bind(payload.year)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(user_id = payload.user_id, year = payload.year, total = payload.total_days, "Allowance set");

    Ok(HttpResponse::Ok().json(LeaveAllowance::from(AllowanceRow {
        total_days: payload.total_days,
        ..current
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn inverted_range_is_reported_before_year_split() {
        let err = check_leave_range(day(2025, 1, 2), day(2024, 12, 30)).unwrap_err();
        assert_eq!(err.to_string(), "From date cannot be after to date");

        let err = check_leave_range(day(2024, 12, 30), day(2025, 1, 2)).unwrap_err();
        assert_eq!(err.to_string(), "Leave cannot span two years, split the request");

        assert!(check_leave_range(day(2024, 3, 4), day(2024, 3, 4)).is_ok());
    }

    #[test]
    fn accepted_leave_attendance_qualifiers() {
        assert_eq!(
            attendance_marks_for(LeaveType::Full, LeaveCategory::Sick),
            (None, AttendanceAction::Paid)
        );
        assert_eq!(
            attendance_marks_for(LeaveType::Half, LeaveCategory::Unpaid),
            (Some(SubStatus::HalfDay), AttendanceAction::Unpaid)
        );
        assert_eq!(
            attendance_marks_for(LeaveType::Short, LeaveCategory::Casual),
            (Some(SubStatus::ShortLeave), AttendanceAction::Paid)
        );
    }

    #[test]
    fn apply_payload_uses_snake_case_enums() {
        let req: ApplyLeave = serde_json::from_value(json!({
            "fromDate": "2026-01-05",
            "toDate": "2026-01-05",
            "leaveType": "half",
            "leaveCategory": "medical"
        }))
        .unwrap();
        assert_eq!(req.leave_type, LeaveType::Half);
        assert_eq!(req.leave_category, LeaveCategory::Medical);
        assert!(req.user_id.is_none());
    }

    #[test]
    fn stored_text_parses_or_is_internal() {
        let ok: LeaveType = parse_stored("short", "leave type").unwrap();
        assert_eq!(ok, LeaveType::Short);
        let err = parse_stored::<LeaveType>("weekly", "leave type").unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
