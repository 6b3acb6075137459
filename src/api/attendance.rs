use crate::auth::auth::AuthUser;
use crate::calc::attendance::{
    AttendanceAction, AttendanceStatus, DayMark, MonthlyAttendanceSummary, SubStatus,
    summarize_month, validate_mark, worked_minutes,
};
use crate::calc::calendar::{month_bounds, month_calendar};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::model::attendance::{ATTENDANCE_COLUMNS, Attendance};
use crate::model::user::User;
use crate::utils::pagination::{FilterValue, Filters, Pagination, bind_filters};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

/// Fields of one attendance mark, shared by single and bulk marking.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkFields {
    pub status: AttendanceStatus,
    pub sub_status: Option<SubStatus>,
    pub action: Option<AttendanceAction>,
    #[serde(with = "crate::utils::hhmm", default)]
    #[schema(value_type = Option<String>, example = "09:00")]
    pub check_in: Option<NaiveTime>,
    #[serde(with = "crate::utils::hhmm", default)]
    #[schema(value_type = Option<String>, example = "17:30")]
    pub check_out: Option<NaiveTime>,
    pub note: Option<String>,
}

impl MarkFields {
    /// Validates the combination and returns the derived worked minutes.
    fn checked(&self) -> ApiResult<Option<i64>> {
        validate_mark(
            self.status,
            self.sub_status,
            self.action,
            self.check_in,
            self.check_out,
        )?;
        Ok(worked_minutes(self.check_in, self.check_out))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendance {
    #[schema(example = 12)]
    pub user_id: u64,
    #[schema(example = "2024-02-15")]
    pub date: Option<NaiveDate>,
    #[serde(flatten)]
    pub fields: MarkFields,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkMarkEntry {
    pub user_id: u64,
    #[serde(flatten)]
    pub fields: MarkFields,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkMarkAttendance {
    #[schema(example = "2024-02-15")]
    pub date: Option<NaiveDate>,
    pub records: Vec<BulkMarkEntry>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendance {
    pub status: Option<AttendanceStatus>,
    pub sub_status: Option<SubStatus>,
    pub action: Option<AttendanceAction>,
    #[serde(with = "crate::utils::hhmm", default)]
    #[schema(value_type = Option<String>, example = "09:00")]
    pub check_in: Option<NaiveTime>,
    #[serde(with = "crate::utils::hhmm", default)]
    #[schema(value_type = Option<String>, example = "17:30")]
    pub check_out: Option<NaiveTime>,
    pub note: Option<String>,
    /// Drop sub-status, action and both times before applying the rest.
    #[serde(default)]
    pub clear_details: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Filter by user (ignored for non-staff callers)
    pub user_id: Option<u64>,
    /// Exact date
    pub date: Option<NaiveDate>,
    /// Month 1-12, needs `year`
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub status: Option<AttendanceStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    pub user_id: Option<u64>,
    pub year: i32,
    pub month: u32,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceListResponse {
    pub data: Vec<Attendance>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

async fn upsert_mark(
    conn: &mut MySqlConnection,
    user_id: u64,
    date: NaiveDate,
    fields: &MarkFields,
    worked: Option<i64>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO attendance
            (user_id, date, status, sub_status, action, check_in, check_out, note, worked_minutes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            status = VALUES(status),
            sub_status = VALUES(sub_status),
            action = VALUES(action),
            check_in = VALUES(check_in),
            check_out = VALUES(check_out),
            note = VALUES(note),
            worked_minutes = VALUES(worked_minutes)
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(fields.status.to_string())
    .bind(fields.sub_status.map(|s| s.to_string()))
    .bind(fields.action.map(|a| a.to_string()))
    .bind(fields.check_in)
    .bind(fields.check_out)
    .bind(fields.note.as_deref())
    .bind(worked)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Today's date and the current wall-clock time truncated to the minute.
fn local_minute() -> (NaiveDate, NaiveTime) {
    let now = Local::now().naive_local();
    let time = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now.time());
    (now.date(), time)
}

/// How a self check-in lands on today's record.
#[derive(Debug, PartialEq)]
enum CheckInTarget {
    NewRecord,
    /// Accepted half-day or short leave without times yet; keeps the leave status.
    PartialLeave(u64),
}

fn check_in_target(existing: Option<&Attendance>) -> ApiResult<CheckInTarget> {
    let Some(row) = existing else {
        return Ok(CheckInTarget::NewRecord);
    };
    let partial_leave =
        row.status == AttendanceStatus::Leave.to_string() && row.sub_status.is_some();
    if partial_leave && row.check_in.is_none() {
        Ok(CheckInTarget::PartialLeave(row.id))
    } else {
        Err(ApiError::bad_request("Already checked in today"))
    }
}

async fn fetch_by_user_date(
    pool: &MySqlPool,
    user_id: u64,
    date: NaiveDate,
) -> Result<Option<Attendance>, sqlx::Error> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ? AND date = ?"
    ))
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await
}

async fn fetch_by_id(pool: &MySqlPool, id: u64) -> Result<Option<Attendance>, sqlx::Error> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Mark (or re-mark) a user's attendance for a date
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 200, description = "Attendance saved", body = Attendance),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "message": "Pick a date"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<MarkAttendance>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let date = payload.date.ok_or_else(|| ApiError::bad_request("Pick a date"))?;
    let worked = payload.fields.checked()?;

    if User::find(pool.get_ref(), payload.user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let mut conn = pool.acquire().await?;
    upsert_mark(&mut conn, payload.user_id, date, &payload.fields, worked).await?;

    info!(user_id = payload.user_id, %date, status = %payload.fields.status, marked_by = auth.user_id, "Attendance marked");

    let saved = fetch_by_user_date(pool.get_ref(), payload.user_id, date)
        .await?
        .ok_or_else(|| ApiError::Internal("Attendance vanished after save".into()))?;

    Ok(HttpResponse::Ok().json(saved.with_derived_minutes()))
}

/// Mark many users for one date in a single transaction
#[utoipa::path(
    post,
    path = "/api/attendance/bulk",
    request_body = BulkMarkAttendance,
    responses(
        (status = 200, description = "All marks saved", body = Object, example = json!({
            "message": "Attendance saved", "count": 2
        })),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn bulk_mark_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<BulkMarkAttendance>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let date = payload.date.ok_or_else(|| ApiError::bad_request("Pick a date"))?;
    if payload.records.is_empty() {
        return Err(ApiError::bad_request("No attendance records provided"));
    }

    // validate everything before writing anything
    let mut worked = Vec::with_capacity(payload.records.len());
    for entry in &payload.records {
        let minutes = entry
            .fields
            .checked()
            .map_err(|e| ApiError::bad_request(format!("User {}: {}", entry.user_id, e)))?;
        worked.push(minutes);
    }

    let mut tx = pool.begin().await?;
    for (entry, minutes) in payload.records.iter().zip(worked) {
        upsert_mark(&mut tx, entry.user_id, date, &entry.fields, minutes)
            .await
            .map_err(|e| ApiError::from_insert(e, "Unknown user in attendance batch"))?;
    }
    tx.commit().await?;

    info!(%date, count = payload.records.len(), marked_by = auth.user_id, "Bulk attendance saved");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance saved",
        "count": payload.records.len()
    })))
}

/// List attendance records
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance", body = AttendanceListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> ApiResult<HttpResponse> {
    let paging = Pagination::new(query.page, query.per_page, 31);

    let mut filters = Filters::default();
    if let Some(user_id) = auth.scope_user_filter(query.user_id) {
        filters.push("user_id = ?", FilterValue::U64(user_id));
    }
    if let Some(date) = query.date {
        filters.push("date = ?", FilterValue::Date(date));
    }
    match (query.year, query.month) {
        (Some(year), Some(month)) => {
            let (first, last) = month_bounds(year, month)?;
            filters.push_many(
                "date BETWEEN ? AND ?",
                [FilterValue::Date(first), FilterValue::Date(last)],
            );
        }
        (None, Some(_)) => return Err(ApiError::bad_request("month needs a year")),
        _ => {}
    }
    if let Some(status) = query.status {
        filters.push("status = ?", FilterValue::Str(status.to_string()));
    }

    let where_sql = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM attendance{where_sql}");
    debug!(sql = %count_sql, binds = ?filters.binds, "Counting attendance");
    let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), &filters.binds)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance{where_sql} ORDER BY date DESC, user_id LIMIT ? OFFSET ?"
    );
    let rows = bind_filters!(sqlx::query_as::<_, Attendance>(&data_sql), &filters.binds)
        .bind(paging.per_page)
        .bind(paging.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data: rows.into_iter().map(Attendance::with_derived_minutes).collect(),
        page: paging.page,
        per_page: paging.per_page,
        total,
    }))
}

/// Get one attendance record
#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Attendance record", body = Attendance),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let record = fetch_by_id(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;

    auth.require_self_or_staff(record.user_id)?;

    Ok(HttpResponse::Ok().json(record.with_derived_minutes()))
}

/// Patch an attendance record; worked minutes are recomputed
#[utoipa::path(
    patch,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record ID")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Attendance updated", body = Attendance),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let current = fetch_by_id(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;

    let keep = !payload.clear_details;
    let fields = MarkFields {
        status: match payload.status {
            Some(s) => s,
            None => current
                .status
                .parse()
                .map_err(|_| ApiError::Internal(format!("Stored status '{}' is unknown", current.status)))?,
        },
        sub_status: payload.sub_status.or_else(|| {
            keep.then(|| current.sub_status.as_deref().and_then(|s| s.parse().ok()))
                .flatten()
        }),
        action: payload.action.or_else(|| {
            keep.then(|| current.action.as_deref().and_then(|s| s.parse().ok()))
                .flatten()
        }),
        check_in: payload.check_in.or(if keep { current.check_in } else { None }),
        check_out: payload.check_out.or(if keep { current.check_out } else { None }),
        note: payload.note.clone().or(current.note),
    };
    let worked = fields.checked()?;

    let mut conn = pool.acquire().await?;
    upsert_mark(&mut conn, current.user_id, current.date, &fields, worked).await?;

    let saved = fetch_by_id(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;

    Ok(HttpResponse::Ok().json(saved.with_derived_minutes()))
}

/// Delete an attendance record
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({
            "message": "Attendance deleted"
        })),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Attendance record not found"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Attendance deleted" })))
}

/// Self check-in for today; late after the configured time
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = Attendance),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let (today, time) = local_minute();

    let existing = fetch_by_user_date(pool.get_ref(), auth.user_id, today).await?;
    if let CheckInTarget::PartialLeave(id) = check_in_target(existing.as_ref())? {
        let result = sqlx::query("UPDATE attendance SET check_in = ? WHERE id = ? AND check_in IS NULL")
            .bind(time)
            .bind(id)
            .execute(pool.get_ref())
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::bad_request("Already checked in today"));
        }

        info!(user_id = auth.user_id, "Checked in on a partial leave day");

        let saved = fetch_by_id(pool.get_ref(), id)
            .await?
            .ok_or_else(|| ApiError::Internal("Check-in vanished after save".into()))?;
        return Ok(HttpResponse::Ok().json(saved));
    }

    let status = if time > config.late_after {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    };

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (user_id, date, status, check_in)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(today)
    .bind(status.to_string())
    .bind(time)
    .execute(pool.get_ref())
    .await;

    if let Err(e) = result {
        // one record per user and day
        return Err(match ApiError::from_insert(e, "Already checked in today") {
            ApiError::Conflict(msg) => ApiError::BadRequest(msg),
            other => other,
        });
    }

    info!(user_id = auth.user_id, %status, "Checked in");

    let saved = fetch_by_user_date(pool.get_ref(), auth.user_id, today)
        .await?
        .ok_or_else(|| ApiError::Internal("Check-in vanished after save".into()))?;

    Ok(HttpResponse::Ok().json(saved))
}

/// Self check-out for today
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = Attendance),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let (today, time) = local_minute();

    let open = fetch_by_user_date(pool.get_ref(), auth.user_id, today)
        .await?
        .filter(|r| r.check_in.is_some() && r.check_out.is_none())
        .ok_or_else(|| ApiError::bad_request("No active check-in found for today"))?;

    let worked = worked_minutes(open.check_in, Some(time))
        .ok_or_else(|| ApiError::bad_request("Check-out must be after check-in"))?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?, worked_minutes = ?
        WHERE id = ?
        AND check_out IS NULL
        "#,
    )
    .bind(time)
    .bind(worked)
    .bind(open.id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("No active check-in found for today"));
    }

    info!(user_id = auth.user_id, worked, "Checked out");

    let saved = fetch_by_id(pool.get_ref(), open.id)
        .await?
        .ok_or_else(|| ApiError::Internal("Check-out vanished after save".into()))?;

    Ok(HttpResponse::Ok().json(saved))
}

/// Marks of one user in a month, oldest first. Unknown stored statuses are skipped.
pub async fn month_marks(
    pool: &MySqlPool,
    user_id: u64,
    year: i32,
    month: u32,
) -> ApiResult<Vec<DayMark>> {
    let (first, last) = month_bounds(year, month)?;

    let rows = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ? AND date BETWEEN ? AND ? ORDER BY date"
    ))
    .bind(user_id)
    .bind(first)
    .bind(last)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(Attendance::with_derived_minutes)
        .filter_map(|r| r.to_day_mark())
        .collect())
}

/// Dates marked as public holiday.
pub fn holidays_in(marks: &[DayMark]) -> Vec<NaiveDate> {
    marks
        .iter()
        .filter(|m| m.status == AttendanceStatus::PublicHoliday)
        .map(|m| m.date)
        .collect()
}

/// Build a user's monthly summary from stored marks
pub async fn monthly_summary_for(
    pool: &MySqlPool,
    user: &User,
    year: i32,
    month: u32,
) -> ApiResult<MonthlyAttendanceSummary> {
    let off_days = user.off_days()?;
    let marks = month_marks(pool, user.id, year, month).await?;
    let calendar = month_calendar(year, month, &off_days, &holidays_in(&marks))?;
    Ok(summarize_month(user.id, year, month, calendar, &marks))
}

/// Monthly attendance summary for one user
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Monthly summary", body = MonthlyAttendanceSummary),
        (status = 400, description = "Invalid month"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn monthly_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> ApiResult<HttpResponse> {
    let user_id = query.user_id.unwrap_or(auth.user_id);
    auth.require_self_or_staff(user_id)?;

    let user = User::find(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let summary = monthly_summary_for(pool.get_ref(), &user, query.year, query.month).await?;
    Ok(HttpResponse::Ok().json(summary))
}
