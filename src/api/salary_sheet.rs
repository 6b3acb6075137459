use crate::api::attendance::{holidays_in, month_marks};
use crate::api::overtime::month_payout;
use crate::auth::auth::AuthUser;
use crate::calc::attendance::summarize_month;
use crate::calc::calendar::{
    month_bounds, month_calendar, off_days_to_csv, parse_off_days, parse_off_days_csv,
};
use crate::calc::salary::{SalaryInputs, SalaryTotals, compute_salary};
use crate::error::{ApiError, ApiResult};
use crate::model::salary_sheet::{SalarySheet, select_columns, writable_columns};
use crate::model::user::User;
use crate::utils::pagination::{FilterValue, Filters, Pagination, bind_filters};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::mysql::MySqlArguments;
use sqlx::query::Query as SqlQuery;
use sqlx::{MySql, MySqlPool};
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

/// Sheet request. Omitted numbers are filled from the user profile, attendance and
/// verified overtime of the month.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalarySheetInput {
    pub user_id: u64,
    #[schema(example = 2024)]
    pub year: i32,
    #[schema(example = 2)]
    pub month: u32,
    /// Defaults to the user's salary
    pub gross_salary: Option<f64>,
    #[serde(default)]
    pub basic_salary: f64,
    #[serde(default)]
    pub house_rent: f64,
    #[serde(default)]
    pub utilities: f64,
    #[serde(default)]
    pub medical_allowance: f64,
    #[serde(default)]
    pub conveyance_allowance: f64,
    #[serde(default)]
    pub other_allowance: f64,
    /// Defaults to the verified overtime payout of the month
    pub overtime_amount: Option<f64>,
    #[serde(default)]
    pub arrears: f64,
    /// Defaults to the month's absent marks
    pub absent_days: Option<f64>,
    /// Defaults to the month's unpaid leave marks
    pub unpaid_leave_days: Option<f64>,
    #[serde(default)]
    pub advance_deduction: f64,
    #[serde(default)]
    pub loan_deduction: f64,
    #[serde(default)]
    pub eobi_deduction: f64,
    #[serde(default)]
    pub other_deduction: f64,
    /// Defaults to the user's off days
    pub off_days: Option<Vec<String>>,
    /// Defaults to dates marked public holiday in attendance
    #[schema(value_type = Option<Vec<String>>, example = json!(["2024-02-05"]))]
    pub public_holidays: Option<Vec<NaiveDate>>,
    pub remarks: Option<String>,
}

/// Fields that may be changed on a saved sheet; totals are recomputed.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SalarySheetPatch {
    pub gross_salary: Option<f64>,
    pub basic_salary: Option<f64>,
    pub house_rent: Option<f64>,
    pub utilities: Option<f64>,
    pub medical_allowance: Option<f64>,
    pub conveyance_allowance: Option<f64>,
    pub other_allowance: Option<f64>,
    pub overtime_amount: Option<f64>,
    pub arrears: Option<f64>,
    pub absent_days: Option<f64>,
    pub unpaid_leave_days: Option<f64>,
    pub advance_deduction: Option<f64>,
    pub loan_deduction: Option<f64>,
    pub eobi_deduction: Option<f64>,
    pub other_deduction: Option<f64>,
    pub off_days: Option<Vec<String>>,
    #[schema(value_type = Option<Vec<String>>)]
    pub public_holidays: Option<Vec<NaiveDate>>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSheets {
    #[schema(example = 2024)]
    pub year: i32,
    #[schema(example = 2)]
    pub month: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSheet {
    pub user_id: u64,
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResult {
    /// Ids of the sheets created by this run
    pub created: Vec<u64>,
    pub skipped: Vec<SkippedSheet>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SalarySheetQuery {
    /// Filter by user (ignored for non-staff callers)
    pub user_id: Option<u64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalarySheetListResponse {
    pub data: Vec<SalarySheet>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

fn holidays_to_csv(dates: &[NaiveDate]) -> Option<String> {
    if dates.is_empty() {
        return None;
    }
    Some(
        dates
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect::<Vec<_>>()
            .join(","),
    )
}

fn holidays_from_csv(raw: Option<&str>) -> ApiResult<Vec<NaiveDate>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ApiError::Internal(format!("Stored holiday '{s}' is not a date")))
        })
        .collect()
}

/// Copies computed totals onto the sheet.
fn apply_totals(sheet: &mut SalarySheet, totals: &SalaryTotals) {
    sheet.days_in_month = totals.calendar.days_in_month;
    sheet.off_days = totals.calendar.off_days;
    sheet.public_holidays = totals.calendar.public_holidays;
    sheet.working_days = totals.calendar.working_days;
    sheet.per_day_salary = totals.per_day_salary;
    sheet.unpaid_days_deduction = totals.unpaid_days_deduction;
    sheet.income_tax = totals.income_tax;
    sheet.total_earnings = totals.total_earnings;
    sheet.total_deductions = totals.total_deductions;
    sheet.net_payable = totals.net_payable;
}

/// Calculator inputs carried by a saved sheet.
fn inputs_from_sheet(sheet: &SalarySheet) -> ApiResult<SalaryInputs> {
    Ok(SalaryInputs {
        year: sheet.year,
        month: sheet.month,
        gross_salary: sheet.gross_salary,
        basic_salary: sheet.basic_salary,
        house_rent: sheet.house_rent,
        utilities: sheet.utilities,
        medical_allowance: sheet.medical_allowance,
        conveyance_allowance: sheet.conveyance_allowance,
        other_allowance: sheet.other_allowance,
        overtime_amount: sheet.overtime_amount,
        arrears: sheet.arrears,
        absent_days: sheet.absent_days,
        unpaid_leave_days: sheet.unpaid_leave_days,
        advance_deduction: sheet.advance_deduction,
        loan_deduction: sheet.loan_deduction,
        eobi_deduction: sheet.eobi_deduction,
        other_deduction: sheet.other_deduction,
        off_days: parse_off_days_csv(&sheet.off_day_names)?,
        public_holidays: holidays_from_csv(sheet.holiday_dates.as_deref())?,
    })
}

/// Builds an unsaved sheet (id 0) for `user` from resolved inputs.
fn draft_sheet(user: &User, inputs: &SalaryInputs, remarks: Option<String>) -> ApiResult<SalarySheet> {
    let totals = compute_salary(inputs)?;

    let mut sheet = SalarySheet {
        id: 0,
        user_id: user.id,
        year: inputs.year,
        month: inputs.month,
        employee_name: user.full_name.clone(),
        designation: user.designation.clone(),
        department: user.department.clone(),
        gross_salary: inputs.gross_salary,
        basic_salary: inputs.basic_salary,
        house_rent: inputs.house_rent,
        utilities: inputs.utilities,
        medical_allowance: inputs.medical_allowance,
        conveyance_allowance: inputs.conveyance_allowance,
        other_allowance: inputs.other_allowance,
        overtime_amount: inputs.overtime_amount,
        arrears: inputs.arrears,
        days_in_month: 0,
        off_days: 0,
        public_holidays: 0,
        working_days: 0,
        absent_days: inputs.absent_days,
        unpaid_leave_days: inputs.unpaid_leave_days,
        per_day_salary: 0.0,
        unpaid_days_deduction: 0.0,
        advance_deduction: inputs.advance_deduction,
        loan_deduction: inputs.loan_deduction,
        eobi_deduction: inputs.eobi_deduction,
        other_deduction: inputs.other_deduction,
        income_tax: 0.0,
        total_earnings: 0.0,
        total_deductions: 0.0,
        net_payable: 0.0,
        off_day_names: off_days_to_csv(&inputs.off_days),
        holiday_dates: holidays_to_csv(&inputs.public_holidays),
        bank_name: user.bank_name.clone(),
        account_title: user.account_title.clone(),
        account_number: user.account_number.clone(),
        remarks,
        created_at: Utc::now(),
    };
    apply_totals(&mut sheet, &totals);
    Ok(sheet)
}

/// Fills the gaps of a request from the user profile and the month's records.
async fn resolve_inputs(
    pool: &MySqlPool,
    user: &User,
    input: &SalarySheetInput,
) -> ApiResult<SalaryInputs> {
    let gross_salary = input
        .gross_salary
        .or(user.salary)
        .ok_or_else(|| ApiError::bad_request("No gross salary given and none on the profile"))?;

    let off_days = match &input.off_days {
        Some(names) => parse_off_days(names)?,
        None => user.off_days()?,
    };

    let marks = month_marks(pool, user.id, input.year, input.month).await?;
    let public_holidays = match &input.public_holidays {
        Some(dates) => dates.clone(),
        None => holidays_in(&marks),
    };

    let (absent_days, unpaid_leave_days) = match (input.absent_days, input.unpaid_leave_days) {
        (Some(absent), Some(unpaid)) => (absent, unpaid),
        (absent, unpaid) => {
            let calendar = month_calendar(input.year, input.month, &off_days, &public_holidays)?;
            let summary = summarize_month(user.id, input.year, input.month, calendar, &marks);
            (
                absent.unwrap_or(f64::from(summary.absent)),
                unpaid.unwrap_or(summary.unpaid_leave_days),
            )
        }
    };

    let overtime_amount = match input.overtime_amount {
        Some(amount) => amount,
        None => month_payout(pool, user.id, input.year, input.month).await?,
    };

    Ok(SalaryInputs {
        year: input.year,
        month: input.month,
        gross_salary,
        basic_salary: input.basic_salary,
        house_rent: input.house_rent,
        utilities: input.utilities,
        medical_allowance: input.medical_allowance,
        conveyance_allowance: input.conveyance_allowance,
        other_allowance: input.other_allowance,
        overtime_amount,
        arrears: input.arrears,
        absent_days,
        unpaid_leave_days,
        advance_deduction: input.advance_deduction,
        loan_deduction: input.loan_deduction,
        eobi_deduction: input.eobi_deduction,
        other_deduction: input.other_deduction,
        off_days,
        public_holidays,
    })
}

/// Binds the writable columns in `writable_columns()` order.
fn bind_sheet<'q>(
    query: SqlQuery<'q, MySql, MySqlArguments>,
    sheet: &'q SalarySheet,
) -> SqlQuery<'q, MySql, MySqlArguments> {
    query
        .bind(sheet.user_id)
        .bind(sheet.year)
        .bind(sheet.month)
        .bind(sheet.employee_name.as_str())
        .bind(sheet.designation.as_deref())
        .bind(sheet.department.as_deref())
        .bind(sheet.gross_salary)
        .bind(sheet.basic_salary)
        .bind(sheet.house_rent)
        .bind(sheet.utilities)
        .bind(sheet.medical_allowance)
        .bind(sheet.conveyance_allowance)
        .bind(sheet.other_allowance)
        .bind(sheet.overtime_amount)
        .bind(sheet.arrears)
        .bind(sheet.days_in_month)
        .bind(sheet.off_days)
        .bind(sheet.public_holidays)
        .bind(sheet.working_days)
        .bind(sheet.absent_days)
        .bind(sheet.unpaid_leave_days)
        .bind(sheet.per_day_salary)
        .bind(sheet.unpaid_days_deduction)
        .bind(sheet.advance_deduction)
        .bind(sheet.loan_deduction)
        .bind(sheet.eobi_deduction)
        .bind(sheet.other_deduction)
        .bind(sheet.income_tax)
        .bind(sheet.total_earnings)
        .bind(sheet.total_deductions)
        .bind(sheet.net_payable)
        .bind(sheet.off_day_names.as_str())
        .bind(sheet.holiday_dates.as_deref())
        .bind(sheet.bank_name.as_deref())
        .bind(sheet.account_title.as_deref())
        .bind(sheet.account_number.as_deref())
        .bind(sheet.remarks.as_deref())
}

fn insert_sql() -> String {
    let cols = writable_columns();
    let marks = vec!["?"; cols.len()].join(", ");
    format!("INSERT INTO salary_sheets ({}) VALUES ({marks})", cols.join(", "))
}

fn update_sql() -> String {
    let sets = writable_columns()
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE salary_sheets SET {sets} WHERE id = ?")
}

async fn insert_sheet(pool: &MySqlPool, sheet: &SalarySheet) -> ApiResult<u64> {
    let sql = insert_sql();
    let result = bind_sheet(sqlx::query(&sql), sheet)
        .execute(pool)
        .await
        .map_err(|e| ApiError::from_insert(e, "Salary sheet already exists for this month"))?;
    Ok(result.last_insert_id())
}

async fn fetch_sheet(pool: &MySqlPool, id: u64) -> ApiResult<SalarySheet> {
    sqlx::query_as::<_, SalarySheet>(&format!(
        "SELECT {} FROM salary_sheets WHERE id = ?",
        select_columns()
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Salary sheet not found"))
}

async fn find_user(pool: &MySqlPool, id: u64) -> ApiResult<User> {
    User::find(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Compute a sheet without saving it
#[utoipa::path(
    post,
    path = "/api/salary-sheets/preview",
    request_body = SalarySheetInput,
    responses(
        (status = 200, description = "Computed sheet, id is 0", body = SalarySheet),
        (status = 400, description = "Invalid amounts", body = Object, example = json!({
            "message": "Salary breakdown (160000) exceeds gross salary (150000)"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Sheets"
)]
pub async fn preview_sheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SalarySheetInput>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let user = find_user(pool.get_ref(), payload.user_id).await?;
    let inputs = resolve_inputs(pool.get_ref(), &user, &payload).await?;
    let sheet = draft_sheet(&user, &inputs, payload.remarks.clone())?;

    Ok(HttpResponse::Ok().json(sheet))
}

/// Create a salary sheet
#[utoipa::path(
    post,
    path = "/api/salary-sheets",
    request_body = SalarySheetInput,
    responses(
        (status = 201, description = "Sheet created", body = SalarySheet),
        (status = 400, description = "Invalid amounts"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Sheet exists", body = Object, example = json!({
            "message": "Salary sheet already exists for this month"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Sheets"
)]
pub async fn create_sheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SalarySheetInput>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let user = find_user(pool.get_ref(), payload.user_id).await?;
    let inputs = resolve_inputs(pool.get_ref(), &user, &payload).await?;
    let sheet = draft_sheet(&user, &inputs, payload.remarks.clone())?;

    let id = insert_sheet(pool.get_ref(), &sheet).await?;
    info!(sheet_id = id, user_id = user.id, year = sheet.year, month = sheet.month, net = sheet.net_payable, "Salary sheet created");

    Ok(HttpResponse::Created().json(fetch_sheet(pool.get_ref(), id).await?))
}

/// Generate sheets for every active user with a salary
#[utoipa::path(
    post,
    path = "/api/salary-sheets/generate",
    request_body = GenerateSheets,
    responses(
        (status = 200, description = "Run report", body = GenerateResult),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Sheets"
)]
pub async fn generate_sheets(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<GenerateSheets>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    month_bounds(payload.year, payload.month)?;

    let existing =
        sqlx::query_scalar::<_, u64>("SELECT user_id FROM salary_sheets WHERE year = ? AND month = ?")
            .bind(payload.year)
            .bind(payload.month)
            .fetch_all(pool.get_ref())
            .await?;

    let mut report = GenerateResult {
        created: Vec::new(),
        skipped: Vec::new(),
    };

    for user in User::list_active(pool.get_ref()).await? {
        let skip = |reason: &str| SkippedSheet {
            user_id: user.id,
            reason: reason.to_string(),
        };

        if existing.contains(&user.id) {
            report.skipped.push(skip("Sheet already exists"));
            continue;
        }
        if user.salary.is_none() {
            report.skipped.push(skip("No salary on profile"));
            continue;
        }

        let input = SalarySheetInput {
            user_id: user.id,
            year: payload.year,
            month: payload.month,
            ..SalarySheetInput::default()
        };

        let outcome = async {
            let inputs = resolve_inputs(pool.get_ref(), &user, &input).await?;
            let sheet = draft_sheet(&user, &inputs, None)?;
            insert_sheet(pool.get_ref(), &sheet).await
        }
        .await;

        match outcome {
            Ok(id) => report.created.push(id),
            Err(e @ (ApiError::BadRequest(_) | ApiError::Conflict(_))) => {
                warn!(user_id = user.id, error = %e, "Salary sheet skipped");
                report.skipped.push(skip(&e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        year = payload.year,
        month = payload.month,
        created = report.created.len(),
        skipped = report.skipped.len(),
        "Salary sheets generated"
    );

    Ok(HttpResponse::Ok().json(report))
}

/// List salary sheets
#[utoipa::path(
    get,
    path = "/api/salary-sheets",
    params(SalarySheetQuery),
    responses(
        (status = 200, description = "Paginated sheets", body = SalarySheetListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Sheets"
)]
pub async fn list_sheets(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SalarySheetQuery>,
) -> ApiResult<HttpResponse> {
    let paging = Pagination::new(query.page, query.per_page, 20);

    let mut filters = Filters::default();
    if let Some(user_id) = auth.scope_user_filter(query.user_id) {
        filters.push("user_id = ?", FilterValue::U64(user_id));
    }
    if let Some(year) = query.year {
        filters.push("year = ?", FilterValue::I64(i64::from(year)));
    }
    if let Some(month) = query.month {
        filters.push("month = ?", FilterValue::U64(u64::from(month)));
    }

    let where_sql = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM salary_sheets{where_sql}");
    debug!(sql = %count_sql, binds = ?filters.binds, "Counting salary sheets");
    let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), &filters.binds)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {} FROM salary_sheets{where_sql} ORDER BY year DESC, month DESC, employee_name LIMIT ? OFFSET ?",
        select_columns()
    );
    let data = bind_filters!(sqlx::query_as::<_, SalarySheet>(&data_sql), &filters.binds)
        .bind(paging.per_page)
        .bind(paging.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(SalarySheetListResponse {
        data,
        page: paging.page,
        per_page: paging.per_page,
        total,
    }))
}

/// Get a salary sheet
#[utoipa::path(
    get,
    path = "/api/salary-sheets/{id}",
    params(("id" = u64, Path, description = "Salary sheet ID")),
    responses(
        (status = 200, description = "Sheet", body = SalarySheet),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Salary sheet not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Sheets"
)]
pub async fn get_sheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let sheet = fetch_sheet(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_staff(sheet.user_id)?;
    Ok(HttpResponse::Ok().json(sheet))
}

/// Apply a patch to a saved sheet and recompute its totals.
fn patch_sheet(mut sheet: SalarySheet, patch: SalarySheetPatch) -> ApiResult<SalarySheet> {
    macro_rules! merge {
        ($($field:ident),* $(,)?) => {
            $(if let Some(v) = patch.$field { sheet.$field = v; })*
        };
    }
    merge!(
        gross_salary,
        basic_salary,
        house_rent,
        utilities,
        medical_allowance,
        conveyance_allowance,
        other_allowance,
        overtime_amount,
        arrears,
        absent_days,
        unpaid_leave_days,
        advance_deduction,
        loan_deduction,
        eobi_deduction,
        other_deduction,
    );

    if let Some(names) = patch.off_days {
        sheet.off_day_names = off_days_to_csv(&parse_off_days(&names)?);
    }
    if let Some(dates) = patch.public_holidays {
        sheet.holiday_dates = holidays_to_csv(&dates);
    }
    if patch.remarks.is_some() {
        sheet.remarks = patch.remarks;
    }

    let totals = compute_salary(&inputs_from_sheet(&sheet)?)?;
    apply_totals(&mut sheet, &totals);
    Ok(sheet)
}

/// Patch a salary sheet; totals are recomputed
#[utoipa::path(
    patch,
    path = "/api/salary-sheets/{id}",
    params(("id" = u64, Path, description = "Salary sheet ID")),
    request_body = SalarySheetPatch,
    responses(
        (status = 200, description = "Sheet updated", body = SalarySheet),
        (status = 400, description = "Invalid amounts"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Salary sheet not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Sheets"
)]
pub async fn update_sheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<SalarySheetPatch>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let current = fetch_sheet(pool.get_ref(), id).await?;
    let sheet = patch_sheet(current, payload.into_inner())?;

    let sql = update_sql();
    bind_sheet(sqlx::query(&sql), &sheet)
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(sheet_id = id, by = auth.user_id, net = sheet.net_payable, "Salary sheet updated");

    Ok(HttpResponse::Ok().json(fetch_sheet(pool.get_ref(), id).await?))
}

/// Delete a salary sheet
#[utoipa::path(
    delete,
    path = "/api/salary-sheets/{id}",
    params(("id" = u64, Path, description = "Salary sheet ID")),
    responses(
        (status = 200, description = "Sheet deleted", body = Object, example = json!({
            "message": "Salary sheet deleted"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Salary sheet not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Sheets"
)]
pub async fn delete_sheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM salary_sheets WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Salary sheet not found"));
    }

    info!(sheet_id = id, by = auth.user_id, "Salary sheet deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Salary sheet deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            username: "bilal".into(),
            role_id: 3,
            full_name: "Bilal Ahmed".into(),
            email: None,
            designation: Some("Accountant".into()),
            department: Some("Finance".into()),
            salary: Some(150_000.0),
            off_days: "Saturday,Sunday".into(),
            bank_name: Some("MCB".into()),
            account_title: Some("Bilal Ahmed".into()),
            account_number: Some("99887766".into()),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn inputs() -> SalaryInputs {
        SalaryInputs {
            year: 2024,
            month: 2,
            gross_salary: 150_000.0,
            basic_salary: 100_000.0,
            house_rent: 40_000.0,
            utilities: 10_000.0,
            off_days: parse_off_days(&["Saturday", "Sunday"]).unwrap(),
            ..SalaryInputs::default()
        }
    }

    #[test]
    fn draft_copies_profile_and_totals() {
        let sheet = draft_sheet(&user(), &inputs(), Some("February".into())).unwrap();

        assert_eq!(sheet.id, 0);
        assert_eq!(sheet.employee_name, "Bilal Ahmed");
        assert_eq!(sheet.bank_name.as_deref(), Some("MCB"));
        assert_eq!(sheet.days_in_month, 29);
        assert_eq!(sheet.off_days, 8);
        assert_eq!(sheet.working_days, 21);
        assert_eq!(sheet.income_tax, 6000.0);
        assert_eq!(sheet.net_payable, 144_000.0);
        assert_eq!(sheet.off_day_names, "Saturday,Sunday");
        assert_eq!(sheet.holiday_dates, None);
    }

    #[test]
    fn patch_recomputes_totals() {
        let sheet = draft_sheet(&user(), &inputs(), None).unwrap();
        let patch = SalarySheetPatch {
            absent_days: Some(2.0),
            public_holidays: Some(vec![NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()]),
            ..SalarySheetPatch::default()
        };

        let patched = patch_sheet(sheet, patch).unwrap();

        // 150000 / 29 * 2
        assert_eq!(patched.unpaid_days_deduction, 10344.83);
        assert_eq!(patched.public_holidays, 1);
        assert_eq!(patched.working_days, 20);
        assert_eq!(patched.holiday_dates.as_deref(), Some("2024-02-05"));
        assert_eq!(patched.net_payable, 133_655.17);
    }

    #[test]
    fn patch_rejects_breakdown_over_gross() {
        let sheet = draft_sheet(&user(), &inputs(), None).unwrap();
        let patch = SalarySheetPatch {
            gross_salary: Some(100_000.0),
            ..SalarySheetPatch::default()
        };
        let err = patch_sheet(sheet, patch).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn stored_holidays_round_trip() {
        let dates = vec![
            NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 14).unwrap(),
        ];
        let csv = holidays_to_csv(&dates);
        assert_eq!(csv.as_deref(), Some("2024-02-05,2024-02-14"));
        assert_eq!(holidays_from_csv(csv.as_deref()).unwrap(), dates);
        assert!(holidays_from_csv(None).unwrap().is_empty());
    }

    #[test]
    fn sql_placeholders_match_columns() {
        let cols = writable_columns().len();
        assert_eq!(insert_sql().matches('?').count(), cols);
        assert_eq!(update_sql().matches('?').count(), cols + 1);
    }

    #[test]
    fn patch_refuses_unknown_fields() {
        let parsed = serde_json::from_value::<SalarySheetPatch>(json!({"netPayable": 1}));
        assert!(parsed.is_err());
    }
}
