use crate::auth::auth::AuthUser;
use crate::calc::calendar::month_bounds;
use crate::error::{ApiError, ApiResult};
use crate::model::fuel_requisition::{
    FuelItem, FuelRequisition, FuelRequisitionRow, RequisitionStatus, line_amount,
};
use crate::utils::pagination::{FilterValue, Filters, Pagination, bind_filters};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use std::collections::HashMap;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const REQUISITION_COLUMNS: &str = "id, user_id, year, month, status, remarks, created_at";
const ITEM_COLUMNS: &str = "id, requisition_id, sr_no, description, km, rate, amount, verified";

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FuelItemInput {
    #[schema(example = "Office to airfield and back")]
    pub description: String,
    #[schema(example = 42.5)]
    pub km: f64,
    #[schema(example = 28.0)]
    pub rate: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFuelRequisition {
    #[schema(example = 2024)]
    pub year: i32,
    #[schema(example = 5)]
    pub month: u32,
    pub items: Vec<FuelItemInput>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecideRequisition {
    /// `approved` or `rejected`
    pub status: RequisitionStatus,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyItem {
    #[serde(default = "default_true")]
    pub verified: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct FuelQuery {
    pub user_id: Option<u64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub status: Option<RequisitionStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FuelListResponse {
    pub data: Vec<FuelRequisition>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Validated line ready for insert: (sr_no, description, km, rate, amount).
type ItemLine = (u32, String, f64, f64, f64);

fn validate_items(items: &[FuelItemInput]) -> ApiResult<Vec<ItemLine>> {
    if items.is_empty() {
        return Err(ApiError::bad_request("Add at least one item"));
    }

    items
        .iter()
        .zip(1u32..)
        .map(|(item, sr_no)| {
            let description = item.description.trim();
            if description.is_empty() {
                return Err(ApiError::bad_request(format!("Item {sr_no}: description is required")));
            }
            for (name, value) in [("km", item.km), ("rate", item.rate)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(ApiError::bad_request(format!(
                        "Item {sr_no}: {name} must be a non-negative number"
                    )));
                }
            }
            Ok((
                sr_no,
                description.to_string(),
                item.km,
                item.rate,
                line_amount(item.km, item.rate),
            ))
        })
        .collect()
}

async fn attach_items(
    pool: &MySqlPool,
    rows: Vec<FuelRequisitionRow>,
) -> Result<Vec<FuelRequisition>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<MySql>::new(format!(
        "SELECT {ITEM_COLUMNS} FROM fuel_requisition_items WHERE requisition_id IN ("
    ));
    let mut ids = builder.separated(", ");
    for row in &rows {
        ids.push_bind(row.id);
    }
    builder.push(") ORDER BY sr_no");

    let items = builder.build_query_as::<FuelItem>().fetch_all(pool).await?;

    let mut by_requisition: HashMap<u64, Vec<FuelItem>> = HashMap::new();
    for item in items {
        by_requisition.entry(item.requisition_id).or_default().push(item);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let items = by_requisition.remove(&row.id).unwrap_or_default();
            FuelRequisition::from_parts(row, items)
        })
        .collect())
}

async fn fetch_row(pool: &MySqlPool, id: u64) -> ApiResult<FuelRequisitionRow> {
    sqlx::query_as::<_, FuelRequisitionRow>(&format!(
        "SELECT {REQUISITION_COLUMNS} FROM fuel_requisitions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Fuel requisition not found"))
}

async fn fetch_requisition(pool: &MySqlPool, id: u64) -> ApiResult<FuelRequisition> {
    let row = fetch_row(pool, id).await?;
    attach_items(pool, vec![row])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Fuel requisition not found"))
}

/// Submit a monthly fuel requisition
#[utoipa::path(
    post,
    path = "/api/fuel-requisitions",
    request_body = CreateFuelRequisition,
    responses(
        (status = 201, description = "Requisition created", body = FuelRequisition),
        (status = 400, description = "Invalid items", body = Object, example = json!({
            "message": "Add at least one item"
        })),
        (status = 409, description = "Already submitted for this month")
    ),
    security(("bearer_auth" = [])),
    tag = "Fuel Requisitions"
)]
pub async fn create_requisition(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateFuelRequisition>,
) -> ApiResult<HttpResponse> {
    month_bounds(payload.year, payload.month)?;
    let lines = validate_items(&payload.items)?;

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        r#"
        INSERT INTO fuel_requisitions (user_id, year, month, status, remarks)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.year)
    .bind(payload.month)
    .bind(RequisitionStatus::Pending.to_string())
    .bind(payload.remarks.as_deref())
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::from_insert(e, "Fuel requisition already submitted for this month"))?;

    let id = result.last_insert_id();

    let mut builder = QueryBuilder::<MySql>::new(
        "INSERT INTO fuel_requisition_items (requisition_id, sr_no, description, km, rate, amount) ",
    );
    builder.push_values(&lines, |mut row, (sr_no, description, km, rate, amount)| {
        row.push_bind(id)
            .push_bind(*sr_no)
            .push_bind(description.as_str())
            .push_bind(*km)
            .push_bind(*rate)
            .push_bind(*amount);
    });
    builder.build().execute(&mut *tx).await?;
    tx.commit().await?;

    info!(requisition_id = id, user_id = auth.user_id, items = lines.len(), "Fuel requisition created");

    Ok(HttpResponse::Created().json(fetch_requisition(pool.get_ref(), id).await?))
}

/// List fuel requisitions
#[utoipa::path(
    get,
    path = "/api/fuel-requisitions",
    params(FuelQuery),
    responses(
        (status = 200, description = "Paginated requisitions", body = FuelListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Fuel Requisitions"
)]
pub async fn list_requisitions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<FuelQuery>,
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
    if let Some(status) = query.status {
        filters.push("status = ?", FilterValue::Str(status.to_string()));
    }

    let where_sql = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM fuel_requisitions{where_sql}");
    debug!(sql = %count_sql, binds = ?filters.binds, "Counting fuel requisitions");
    let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), &filters.binds)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {REQUISITION_COLUMNS} FROM fuel_requisitions{where_sql} ORDER BY year DESC, month DESC, id DESC LIMIT ? OFFSET ?"
    );
    let rows = bind_filters!(sqlx::query_as::<_, FuelRequisitionRow>(&data_sql), &filters.binds)
        .bind(paging.per_page)
        .bind(paging.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(FuelListResponse {
        data: attach_items(pool.get_ref(), rows).await?,
        page: paging.page,
        per_page: paging.per_page,
        total,
    }))
}

/// Get a fuel requisition with its items
#[utoipa::path(
    get,
    path = "/api/fuel-requisitions/{id}",
    params(("id" = u64, Path, description = "Requisition ID")),
    responses(
        (status = 200, description = "Requisition", body = FuelRequisition),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Fuel requisition not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Fuel Requisitions"
)]
pub async fn get_requisition(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let requisition = fetch_requisition(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_staff(requisition.user_id)?;
    Ok(HttpResponse::Ok().json(requisition))
}

/// A guarded decision that touched no row lost a race with another decision.
fn decision_applied(rows_affected: u64) -> ApiResult<()> {
    if rows_affected == 0 {
        return Err(ApiError::bad_request("Requisition already decided"));
    }
    Ok(())
}

/// Approve or reject a pending requisition
#[utoipa::path(
    patch,
    path = "/api/fuel-requisitions/{id}/status",
    params(("id" = u64, Path, description = "Requisition ID")),
    request_body = DecideRequisition,
    responses(
        (status = 200, description = "Decision recorded", body = FuelRequisition),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Fuel requisition not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Fuel Requisitions"
)]
pub async fn decide_requisition(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<DecideRequisition>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    if payload.status == RequisitionStatus::Pending {
        return Err(ApiError::bad_request("Decision must be approved or rejected"));
    }

    let row = fetch_row(pool.get_ref(), id).await?;
    if row.status != RequisitionStatus::Pending.to_string() {
        return Err(ApiError::bad_request(format!("Requisition is already {}", row.status)));
    }

    let result = sqlx::query(
        r#"
        UPDATE fuel_requisitions
        SET status = ?, remarks = COALESCE(?, remarks)
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(payload.status.to_string())
    .bind(payload.remarks.as_deref())
    .bind(id)
    .bind(RequisitionStatus::Pending.to_string())
    .execute(pool.get_ref())
    .await?;
    decision_applied(result.rows_affected())?;

    info!(requisition_id = id, status = %payload.status, by = auth.user_id, "Fuel requisition decided");

    Ok(HttpResponse::Ok().json(fetch_requisition(pool.get_ref(), id).await?))
}

/// Mark one line as checked against the log book
#[utoipa::path(
    patch,
    path = "/api/fuel-requisitions/{id}/items/{item_id}/verify",
    params(
        ("id" = u64, Path, description = "Requisition ID"),
        ("item_id" = u64, Path, description = "Item ID")
    ),
    request_body = VerifyItem,
    responses(
        (status = 200, description = "Item updated", body = FuelRequisition),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Fuel Requisitions"
)]
pub async fn verify_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
    payload: web::Json<VerifyItem>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let (id, item_id) = path.into_inner();

    let result = sqlx::query(
        "UPDATE fuel_requisition_items SET verified = ? WHERE id = ? AND requisition_id = ?",
    )
    .bind(payload.verified)
    .bind(item_id)
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        // MySQL reports 0 when the value is unchanged, so tell the cases apart
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM fuel_requisition_items WHERE id = ? AND requisition_id = ?",
        )
        .bind(item_id)
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;
        if found == 0 {
            return Err(ApiError::not_found("Item not found"));
        }
    }

    Ok(HttpResponse::Ok().json(fetch_requisition(pool.get_ref(), id).await?))
}

/// Delete a pending requisition
#[utoipa::path(
    delete,
    path = "/api/fuel-requisitions/{id}",
    params(("id" = u64, Path, description = "Requisition ID")),
    responses(
        (status = 200, description = "Requisition deleted", body = Object, example = json!({
            "message": "Fuel requisition deleted"
        })),
        (status = 400, description = "Only pending requisitions can be deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Fuel requisition not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Fuel Requisitions"
)]
pub async fn delete_requisition(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let row = fetch_row(pool.get_ref(), id).await?;
    auth.require_self_or_staff(row.user_id)?;

    let result = sqlx::query("DELETE FROM fuel_requisitions WHERE id = ? AND status = ?")
        .bind(id)
        .bind(RequisitionStatus::Pending.to_string())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Only pending requisitions can be deleted"));
    }

    info!(requisition_id = id, by = auth.user_id, "Fuel requisition deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Fuel requisition deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(description: &str, km: f64, rate: f64) -> FuelItemInput {
        FuelItemInput {
            description: description.into(),
            km,
            rate,
        }
    }

    #[test]
    fn items_are_numbered_and_priced() {
        let lines = validate_items(&[input(" Site visit ", 42.5, 28.0), input("Bank", 17.2, 28.0)])
            .unwrap();

        assert_eq!(lines[0], (1, "Site visit".to_string(), 42.5, 28.0, 1190.0));
        assert_eq!(lines[1].0, 2);
        assert_eq!(lines[1].4, 481.6);
    }

    #[test]
    fn rejects_empty_and_negative_items() {
        assert_eq!(
            validate_items(&[]).unwrap_err().to_string(),
            "Add at least one item"
        );
        assert_eq!(
            validate_items(&[input("Trip", -1.0, 28.0)]).unwrap_err().to_string(),
            "Item 1: km must be a non-negative number"
        );
        assert!(validate_items(&[input("  ", 1.0, 1.0)]).is_err());
        assert!(validate_items(&[input("Trip", 1.0, f64::NAN)]).is_err());
    }

    #[test]
    fn losing_a_decision_race_is_reported() {
        assert!(decision_applied(1).is_ok());
        let err = decision_applied(0).unwrap_err();
        assert_eq!(err.to_string(), "Requisition already decided");
    }

    #[test]
    fn verify_defaults_to_true() {
        let body: VerifyItem = serde_json::from_value(json!({})).unwrap();
        assert!(body.verified);
    }
}
