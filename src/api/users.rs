use crate::auth::auth::AuthUser;
use crate::calc::calendar::{off_days_to_csv, parse_off_days};
use crate::error::{ApiError, ApiResult};
use crate::model::role::Role;
use crate::model::user::{USER_COLUMNS, User, UserResponse};
use crate::utils::db_utils::{FieldKind, UpdatableField, build_update_sql, execute_update, field};
use crate::utils::pagination::{FilterValue, Filters, Pagination, bind_filters};
use crate::utils::usernames;
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

/// Columns staff may change through PATCH.
const STAFF_FIELDS: &[UpdatableField] = &[
    field("fullName", "full_name", FieldKind::Text),
    field("email", "email", FieldKind::NullableText),
    field("designation", "designation", FieldKind::NullableText),
    field("department", "department", FieldKind::NullableText),
    field("salary", "salary", FieldKind::Money),
    field("offDays", "off_days", FieldKind::Text),
    field("bankName", "bank_name", FieldKind::NullableText),
    field("accountTitle", "account_title", FieldKind::NullableText),
    field("accountNumber", "account_number", FieldKind::NullableText),
    field("isActive", "is_active", FieldKind::Bool),
    field("roleId", "role_id", FieldKind::Id),
];

/// Columns a user may change on their own profile.
const SELF_FIELDS: &[UpdatableField] = &[
    field("fullName", "full_name", FieldKind::Text),
    field("email", "email", FieldKind::NullableText),
    field("bankName", "bank_name", FieldKind::NullableText),
    field("accountTitle", "account_title", FieldKind::NullableText),
    field("accountNumber", "account_number", FieldKind::NullableText),
];

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// admin, hr, employee or instructor
    pub role: Option<String>,
    /// Matches username or full name
    pub search: Option<String>,
    pub active: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub data: Vec<UserResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Rewrites request-level keys into their stored form.
///
/// `offDays` arrives as a list of weekday names and is stored as CSV; `role` arrives
/// as a name and is stored as `roleId`.
fn normalize_patch(mut body: Value) -> ApiResult<Value> {
    let obj = body
        .as_object_mut()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if let Some(raw) = obj.get("offDays") {
        let names: Vec<String> = serde_json::from_value(raw.clone())
            .map_err(|_| ApiError::bad_request("offDays must be a list of weekday names"))?;
        let days = parse_off_days(&names)?;
        obj.insert("offDays".into(), Value::String(off_days_to_csv(&days)));
    }

    if let Some(raw) = obj.remove("role") {
        let role = raw
            .as_str()
            .and_then(|name| name.trim().parse::<Role>().ok())
            .ok_or_else(|| ApiError::bad_request("Unknown role"))?;
        obj.insert("roleId".into(), json!(role.id()));
    }

    if let Some(Value::Number(n)) = obj.get("roleId") {
        let known = n
            .as_u64()
            .and_then(|id| u8::try_from(id).ok())
            .and_then(Role::from_id)
            .is_some();
        if !known {
            return Err(ApiError::bad_request("Unknown role"));
        }
    }

    Ok(body)
}

async fn fetch_user(pool: &MySqlPool, id: u64) -> ApiResult<User> {
    User::find(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// The signed-in user's profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let user = fetch_user(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// List users
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Paginated users", body = UserListResponse),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let paging = Pagination::new(query.page, query.per_page, 20);

    let mut filters = Filters::default();
    if let Some(name) = query.role.as_deref() {
        let role = name
            .trim()
            .parse::<Role>()
            .map_err(|_| ApiError::bad_request("Unknown role"))?;
        filters.push("role_id = ?", FilterValue::U64(u64::from(role.id())));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        filters.push_many(
            "(username LIKE ? OR full_name LIKE ?)",
            [FilterValue::Str(pattern.clone()), FilterValue::Str(pattern)],
        );
    }
    if let Some(active) = query.active {
        filters.push("is_active = ?", FilterValue::Bool(active));
    }

    let where_sql = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM users{where_sql}");
    debug!(sql = %count_sql, binds = ?filters.binds, "Counting users");
    let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), &filters.binds)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql =
        format!("SELECT {USER_COLUMNS} FROM users{where_sql} ORDER BY full_name, id LIMIT ? OFFSET ?");
    let rows = bind_filters!(sqlx::query_as::<_, User>(&data_sql), &filters.binds)
        .bind(paging.per_page)
        .bind(paging.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(UserListResponse {
        data: rows.into_iter().map(UserResponse::from).collect(),
        page: paging.page,
        per_page: paging.per_page,
        total,
    }))
}

/// Get a user
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found", body = Object, example = json!({
            "message": "User not found"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    auth.require_self_or_staff(id)?;

    let user = fetch_user(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Patch a user profile.
///
/// Staff may change employment fields; everybody may change their own contact and bank
/// details. Changing the role is admin only.
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    request_body(
        content = Object,
        description = "Any subset of fullName, email, designation, department, salary, offDays, bankName, accountTitle, accountNumber, isActive, role",
        example = json!({"designation": "Senior Instructor", "offDays": ["Saturday", "Sunday"]})
    ),
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Field cannot be updated", body = Object, example = json!({
            "message": "Field 'password' cannot be updated"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    auth.require_self_or_staff(id)?;

    if body.get("role").is_some() {
        auth.require_admin()?;
    }
    if body.get("roleId").is_some() {
        return Err(ApiError::bad_request("Field 'roleId' cannot be updated"));
    }

    let allowed = if auth.is_staff() { STAFF_FIELDS } else { SELF_FIELDS };
    let body = normalize_patch(body.into_inner())?;
    let update = build_update_sql("users", &body, allowed, "id", id)?;

    let affected = execute_update(pool.get_ref(), update).await?;
    let user = fetch_user(pool.get_ref(), id).await?;

    info!(user_id = id, by = auth.user_id, affected, "User updated");

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Delete a user and everything they own
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = Object, example = json!({
            "message": "User deleted"
        })),
        (status = 400, description = "Cannot delete yourself"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    if id == auth.user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let user = fetch_user(pool.get_ref(), id).await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    // the filter keeps a stale positive, which only costs one DB lookup later
    usernames::forget(&user.username).await;

    info!(user_id = id, username = %user.username, by = auth.user_id, "User deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "User deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_days_become_csv() {
        let body = normalize_patch(json!({"offDays": ["sun", "Saturday"]})).unwrap();
        assert_eq!(body["offDays"], "Saturday,Sunday");
    }

    #[test]
    fn bad_off_days_are_rejected() {
        let err = normalize_patch(json!({"offDays": ["Caturday"]})).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = normalize_patch(json!({"offDays": "Sunday"})).unwrap_err();
        assert_eq!(err.to_string(), "offDays must be a list of weekday names");
    }

    #[test]
    fn role_name_becomes_role_id() {
        let body = normalize_patch(json!({"role": "instructor"})).unwrap();
        assert_eq!(body["roleId"], 4);
        assert!(body.get("role").is_none());

        assert!(normalize_patch(json!({"role": "captain"})).is_err());
    }

    #[test]
    fn unknown_role_ids_are_rejected() {
        assert!(normalize_patch(json!({"roleId": 2})).is_ok());
        assert!(normalize_patch(json!({"roleId": 9})).is_err());
        assert!(normalize_patch(json!({"roleId": 300})).is_err());
    }

    #[test]
    fn mistyped_values_are_bad_requests() {
        for body in [
            json!({"isActive": "yes"}),
            json!({"fullName": null}),
            json!({"salary": "lots"}),
            json!({"salary": -1}),
        ] {
            let body = normalize_patch(body).unwrap();
            let err = build_update_sql("users", &body, STAFF_FIELDS, "id", 3).unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)), "{err}");
        }
    }

    #[test]
    fn self_service_cannot_touch_salary() {
        let body = normalize_patch(json!({"salary": 1})).unwrap();
        let err = build_update_sql("users", &body, SELF_FIELDS, "id", 3).unwrap_err();
        assert_eq!(err.to_string(), "Field 'salary' cannot be updated");
    }
}
