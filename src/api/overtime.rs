use crate::auth::auth::AuthUser;
use crate::calc::calendar::month_bounds;
use crate::calc::round_currency;
use crate::calc::time_slots::{SlotInput, TimeSlot, build_slots, ensure_disjoint, total_duration};
use crate::error::{ApiError, ApiResult};
use crate::model::overtime::{CLAIM_COLUMNS, OvertimeClaim, OvertimeClaimRow, OvertimeSlotRow};
use crate::model::user::User;
use crate::utils::pagination::{FilterValue, Filters, Pagination, bind_filters};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlConnection, MySqlPool, QueryBuilder};
use std::collections::HashMap;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOvertime {
    #[schema(example = "2024-02-15")]
    pub date: Option<NaiveDate>,
    pub slots: Vec<SlotInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOvertimeSlots {
    pub slots: Vec<SlotInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OvertimeQuery {
    /// Filter by instructor (ignored for non-staff callers)
    pub instructor_id: Option<u64>,
    pub year: Option<i32>,
    /// Month 1-12, needs `year`
    pub month: Option<u32>,
    pub verified: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OvertimeSummaryQuery {
    pub instructor_id: Option<u64>,
    pub year: i32,
    pub month: u32,
    /// Only count verified claims (default true)
    pub verified_only: Option<bool>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OvertimeListResponse {
    pub data: Vec<OvertimeClaim>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OvertimeMonthSummary {
    pub instructor_id: u64,
    pub year: i32,
    pub month: u32,
    pub claims: u32,
    pub total_minutes: i64,
    pub total_payout: f64,
    /// Claims skipped from the payout because their salary snapshot is missing.
    pub unpriced_claims: u32,
}

fn summarize_claims(
    instructor_id: u64,
    year: i32,
    month: u32,
    claims: &[OvertimeClaim],
) -> OvertimeMonthSummary {
    let mut summary = OvertimeMonthSummary {
        instructor_id,
        year,
        month,
        claims: 0,
        total_minutes: 0,
        total_payout: 0.0,
        unpriced_claims: 0,
    };
    for claim in claims {
        summary.claims += 1;
        summary.total_minutes += claim.total_duration_minutes;
        match claim.payout {
            Some(p) => summary.total_payout += p,
            None => summary.unpriced_claims += 1,
        }
    }
    summary.total_payout = round_currency(summary.total_payout);
    summary
}

async fn insert_slots(
    conn: &mut MySqlConnection,
    claim_id: u64,
    slots: &[TimeSlot],
) -> Result<(), sqlx::Error> {
    let mut builder = QueryBuilder::<MySql>::new(
        "INSERT INTO overtime_slots (claim_id, slot_from, slot_to, duration_minutes) ",
    );
    builder.push_values(slots, |mut row, slot| {
        row.push_bind(claim_id)
            .push_bind(slot.from)
            .push_bind(slot.to)
            .push_bind(slot.duration_minutes);
    });
    builder.build().execute(&mut *conn).await?;
    Ok(())
}

/// Checks `slots` against the instructor's other claims on `date`.
///
/// The instructor's user row is locked first so two submissions for the same
/// day cannot both pass the check.
async fn ensure_free_on_date(
    conn: &mut MySqlConnection,
    instructor_id: u64,
    date: NaiveDate,
    skip_claim: Option<u64>,
    slots: &[TimeSlot],
) -> ApiResult<()> {
    sqlx::query("SELECT id FROM users WHERE id = ? FOR UPDATE")
        .bind(instructor_id)
        .fetch_optional(&mut *conn)
        .await?;

    let recorded = sqlx::query_as::<_, OvertimeSlotRow>(
        r#"
        SELECT s.claim_id, s.slot_from, s.slot_to, s.duration_minutes
        FROM overtime_slots s
        JOIN overtime_claims c ON c.id = s.claim_id
        WHERE c.instructor_id = ? AND c.date = ? AND c.id <> ?
        FOR UPDATE
        "#,
    )
    .bind(instructor_id)
    .bind(date)
    .bind(skip_claim.unwrap_or(0))
    .fetch_all(&mut *conn)
    .await?;

    let recorded: Vec<TimeSlot> = recorded.into_iter().map(TimeSlot::from).collect();
    ensure_disjoint(slots, &recorded)?;
    Ok(())
}

/// Loads claims and their slots in two queries.
async fn attach_slots(
    pool: &MySqlPool,
    rows: Vec<OvertimeClaimRow>,
) -> Result<Vec<OvertimeClaim>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<MySql>::new(
        "SELECT claim_id, slot_from, slot_to, duration_minutes FROM overtime_slots WHERE claim_id IN (",
    );
    let mut ids = builder.separated(", ");
    for row in &rows {
        ids.push_bind(row.id);
    }
    builder.push(") ORDER BY slot_from");

    let slot_rows = builder
        .build_query_as::<OvertimeSlotRow>()
        .fetch_all(pool)
        .await?;

    let mut by_claim: HashMap<u64, Vec<TimeSlot>> = HashMap::new();
    for slot in slot_rows {
        by_claim.entry(slot.claim_id).or_default().push(slot.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let slots = by_claim.remove(&row.id).unwrap_or_default();
            OvertimeClaim::from_parts(row, slots)
        })
        .collect())
}

async fn fetch_claim_row(pool: &MySqlPool, id: u64) -> Result<Option<OvertimeClaimRow>, sqlx::Error> {
    sqlx::query_as::<_, OvertimeClaimRow>(&format!(
        "SELECT {CLAIM_COLUMNS} FROM overtime_claims WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

async fn fetch_claim(pool: &MySqlPool, id: u64) -> ApiResult<OvertimeClaim> {
    let row = fetch_claim_row(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Overtime claim not found"))?;
    let mut claims = attach_slots(pool, vec![row]).await?;
    claims
        .pop()
        .ok_or_else(|| ApiError::not_found("Overtime claim not found"))
}

/// Submit an overtime claim for a day
#[utoipa::path(
    post,
    path = "/api/instructor-overtime",
    request_body = SubmitOvertime,
    responses(
        (status = 200, description = "Claim submitted", body = OvertimeClaim),
        (status = 400, description = "Invalid slots or slots already claimed that day", body = Object, example = json!({
            "message": "Each slot must end after it starts"
        })),
        (status = 403, description = "Instructors only")
    ),
    security(("bearer_auth" = [])),
    tag = "Instructor Overtime"
)]
pub async fn submit_claim(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SubmitOvertime>,
) -> ApiResult<HttpResponse> {
    auth.require_instructor()?;

    let date = payload.date.ok_or_else(|| ApiError::bad_request("Pick a date"))?;
    let slots = build_slots(date, &payload.slots)?;
    let total = total_duration(&slots);

    let instructor = User::find(pool.get_ref(), auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut tx = pool.begin().await?;
    ensure_free_on_date(&mut tx, auth.user_id, date, None, &slots).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO overtime_claims (instructor_id, date, total_duration_minutes, salary, notes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(date)
    .bind(total)
    .bind(instructor.salary)
    .bind(payload.notes.as_deref())
    .execute(&mut *tx)
    .await?;

    let claim_id = result.last_insert_id();
    insert_slots(&mut tx, claim_id, &slots).await?;
    tx.commit().await?;

    info!(claim_id, instructor_id = auth.user_id, %date, minutes = total, "Overtime claim submitted");

    Ok(HttpResponse::Ok().json(fetch_claim(pool.get_ref(), claim_id).await?))
}

/// List overtime claims
#[utoipa::path(
    get,
    path = "/api/instructor-overtime",
    params(OvertimeQuery),
    responses(
        (status = 200, description = "Paginated claims", body = OvertimeListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Instructor Overtime"
)]
pub async fn list_claims(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OvertimeQuery>,
) -> ApiResult<HttpResponse> {
    let paging = Pagination::new(query.page, query.per_page, 20);

    let mut filters = Filters::default();
    if let Some(id) = auth.scope_user_filter(query.instructor_id) {
        filters.push("instructor_id = ?", FilterValue::U64(id));
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
    if let Some(verified) = query.verified {
        filters.push("verified = ?", FilterValue::Bool(verified));
    }

    let where_sql = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM overtime_claims{where_sql}");
    debug!(sql = %count_sql, binds = ?filters.binds, "Counting overtime claims");
    let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), &filters.binds)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {CLAIM_COLUMNS} FROM overtime_claims{where_sql} ORDER BY date DESC, id DESC LIMIT ? OFFSET ?"
    );
    let rows = bind_filters!(sqlx::query_as::<_, OvertimeClaimRow>(&data_sql), &filters.binds)
        .bind(paging.per_page)
        .bind(paging.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(OvertimeListResponse {
        data: attach_slots(pool.get_ref(), rows).await?,
        page: paging.page,
        per_page: paging.per_page,
        total,
    }))
}

/// Get an overtime claim with its slots
#[utoipa::path(
    get,
    path = "/api/instructor-overtime/{id}",
    params(("id" = u64, Path, description = "Claim ID")),
    responses(
        (status = 200, description = "Claim", body = OvertimeClaim),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Overtime claim not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Instructor Overtime"
)]
pub async fn get_claim(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let claim = fetch_claim(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_staff(claim.instructor_id)?;
    Ok(HttpResponse::Ok().json(claim))
}

/// Replace the slots of an unverified claim
#[utoipa::path(
    put,
    path = "/api/instructor-overtime/{id}",
    params(("id" = u64, Path, description = "Claim ID")),
    request_body = UpdateOvertimeSlots,
    responses(
        (status = 200, description = "Claim updated", body = OvertimeClaim),
        (status = 400, description = "Invalid slots or claim already verified"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Overtime claim not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Instructor Overtime"
)]
pub async fn update_claim(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateOvertimeSlots>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let row = fetch_claim_row(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Overtime claim not found"))?;

    if row.instructor_id != auth.user_id {
        return Err(ApiError::forbidden("Only the instructor can edit their claim"));
    }
    if row.verified {
        return Err(ApiError::bad_request("Verified claims cannot be edited"));
    }

    let slots = build_slots(row.date, &payload.slots)?;
    let total = total_duration(&slots);

    let mut tx = pool.begin().await?;
    ensure_free_on_date(&mut tx, row.instructor_id, row.date, Some(id), &slots).await?;

    let result = sqlx::query(
        r#"
        UPDATE overtime_claims
        SET total_duration_minutes = ?, notes = COALESCE(?, notes)
        WHERE id = ? AND verified = FALSE
        "#,
    )
    .bind(total)
    .bind(payload.notes.as_deref())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Verified claims cannot be edited"));
    }

    sqlx::query("DELETE FROM overtime_slots WHERE claim_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_slots(&mut tx, id, &slots).await?;
    tx.commit().await?;

    info!(claim_id = id, minutes = total, "Overtime claim updated");

    Ok(HttpResponse::Ok().json(fetch_claim(pool.get_ref(), id).await?))
}

/// Verify a claim so it counts toward payroll
#[utoipa::path(
    patch,
    path = "/api/instructor-overtime/{id}/verify",
    params(("id" = u64, Path, description = "Claim ID")),
    responses(
        (status = 200, description = "Claim verified", body = OvertimeClaim),
        (status = 400, description = "Claim already verified"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Overtime claim not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Instructor Overtime"
)]
pub async fn verify_claim(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    if fetch_claim_row(pool.get_ref(), id).await?.is_none() {
        return Err(ApiError::not_found("Overtime claim not found"));
    }

    let result = sqlx::query(
        "UPDATE overtime_claims SET verified = TRUE, verified_by = ? WHERE id = ? AND verified = FALSE",
    )
    .bind(auth.user_id)
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Claim already verified"));
    }

    info!(claim_id = id, verified_by = auth.user_id, "Overtime claim verified");

    Ok(HttpResponse::Ok().json(fetch_claim(pool.get_ref(), id).await?))
}

/// Delete a claim (owner while unverified, staff any time)
#[utoipa::path(
    delete,
    path = "/api/instructor-overtime/{id}",
    params(("id" = u64, Path, description = "Claim ID")),
    responses(
        (status = 200, description = "Claim deleted", body = Object, example = json!({
            "message": "Overtime claim deleted"
        })),
        (status = 400, description = "Verified claims cannot be deleted by the instructor"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Overtime claim not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Instructor Overtime"
)]
pub async fn delete_claim(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let row = fetch_claim_row(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Overtime claim not found"))?;

    if !auth.is_staff() {
        if row.instructor_id != auth.user_id {
            return Err(ApiError::forbidden("Only the instructor can delete their claim"));
        }
        if row.verified {
            return Err(ApiError::bad_request(
                "Verified claims cannot be deleted by the instructor",
            ));
        }
    }

    // slots go with the claim (ON DELETE CASCADE)
    sqlx::query("DELETE FROM overtime_claims WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(claim_id = id, by = auth.user_id, "Overtime claim deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Overtime claim deleted" })))
}

/// Claims of one instructor in a month, verified only unless asked otherwise.
pub async fn month_claims(
    pool: &MySqlPool,
    instructor_id: u64,
    year: i32,
    month: u32,
    verified_only: bool,
) -> ApiResult<Vec<OvertimeClaim>> {
    let (first, last) = month_bounds(year, month)?;
    let verified_sql = if verified_only { " AND verified = TRUE" } else { "" };

    let rows = sqlx::query_as::<_, OvertimeClaimRow>(&format!(
        "SELECT {CLAIM_COLUMNS} FROM overtime_claims \
         WHERE instructor_id = ? AND date BETWEEN ? AND ?{verified_sql} ORDER BY date"
    ))
    .bind(instructor_id)
    .bind(first)
    .bind(last)
    .fetch_all(pool)
    .await?;

    Ok(attach_slots(pool, rows).await?)
}

/// Verified overtime payout of an instructor for a month, rounded.
pub async fn month_payout(
    pool: &MySqlPool,
    instructor_id: u64,
    year: i32,
    month: u32,
) -> ApiResult<f64> {
    let claims = month_claims(pool, instructor_id, year, month, true).await?;
    Ok(summarize_claims(instructor_id, year, month, &claims).total_payout)
}

/// Monthly overtime totals for an instructor
#[utoipa::path(
    get,
    path = "/api/instructor-overtime/summary",
    params(OvertimeSummaryQuery),
    responses(
        (status = 200, description = "Monthly totals", body = OvertimeMonthSummary),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Instructor Overtime"
)]
pub async fn monthly_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OvertimeSummaryQuery>,
) -> ApiResult<HttpResponse> {
    let instructor_id = query.instructor_id.unwrap_or(auth.user_id);
    auth.require_self_or_staff(instructor_id)?;

    let claims = month_claims(
        pool.get_ref(),
        instructor_id,
        query.year,
        query.month,
        query.verified_only.unwrap_or(true),
    )
    .await?;

    Ok(HttpResponse::Ok().json(summarize_claims(
        instructor_id,
        query.year,
        query.month,
        &claims,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claim(minutes: i64, salary: Option<f64>) -> OvertimeClaim {
        let row = OvertimeClaimRow {
            id: 1,
            instructor_id: 9,
            date: NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            total_duration_minutes: minutes,
            salary,
            verified: true,
            verified_by: Some(1),
            notes: None,
            created_at: Utc::now(),
        };
        OvertimeClaim::from_parts(row, Vec::new())
    }

    #[test]
    fn summary_adds_priced_claims_only() {
        let claims = [
            claim(60, Some(30_000.0)),
            claim(100, Some(30_000.0)),
            claim(45, None),
        ];
        let summary = summarize_claims(9, 2024, 2, &claims);

        assert_eq!(summary.claims, 3);
        assert_eq!(summary.total_minutes, 205);
        assert_eq!(summary.unpriced_claims, 1);
        assert_eq!(summary.total_payout, 306.51);
    }

    #[test]
    fn empty_month_is_zero() {
        let summary = summarize_claims(9, 2024, 2, &[]);
        assert_eq!(summary.total_payout, 0.0);
        assert_eq!(summary.claims, 0);
    }

    #[test]
    fn submit_payload_shape() {
        let req: SubmitOvertime = serde_json::from_value(json!({
            "date": "2024-02-15",
            "slots": [{"start": "17:00", "end": "18:00"}]
        }))
        .unwrap();
        assert_eq!(req.slots.len(), 1);
        assert!(req.notes.is_none());
    }
}
