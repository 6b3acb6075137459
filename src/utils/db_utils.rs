use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::ApiError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    F64(f64),
    Bool(bool),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// JSON shape a PATCH value must have for its column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// String, never null
    Text,
    /// String or null
    NullableText,
    /// Non-negative number or null
    Money,
    Bool,
    /// Unsigned integer
    Id,
}

/// Maps a JSON key of a PATCH body to the column it may update.
pub struct UpdatableField {
    pub key: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

pub const fn field(key: &'static str, column: &'static str, kind: FieldKind) -> UpdatableField {
    UpdatableField { key, column, kind }
}

fn to_sql_value(field: &UpdatableField, value: &Value) -> Result<SqlValue, ApiError> {
    let key = field.key;
    let value = match (field.kind, value) {
        (FieldKind::Text | FieldKind::NullableText, Value::String(s)) => {
            Some(SqlValue::String(s.clone()))
        }
        (FieldKind::NullableText | FieldKind::Money, Value::Null) => Some(SqlValue::Null),
        (FieldKind::Money, Value::Number(n)) => match n.as_f64() {
            Some(v) if v < 0.0 => return Err(ApiError::bad_request(format!("{key} cannot be negative"))),
            Some(v) => Some(SqlValue::F64(v)),
            None => None,
        },
        (FieldKind::Bool, Value::Bool(b)) => Some(SqlValue::Bool(*b)),
        (FieldKind::Id, Value::Number(n)) => n.as_u64().map(SqlValue::U64),
        _ => None,
    };

    value.ok_or_else(|| {
        let expected = match field.kind {
            FieldKind::Text => "a string",
            FieldKind::NullableText => "a string or null",
            FieldKind::Money => "a non-negative number or null",
            FieldKind::Bool => "true or false",
            FieldKind::Id => "a positive integer",
        };
        ApiError::bad_request(format!("{key} must be {expected}"))
    })
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only keys listed in `allowed` may appear in the payload; column names never come
/// from the request.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[UpdatableField],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    let mut sets = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let field = allowed
            .iter()
            .find(|f| f.key == key)
            .ok_or_else(|| ApiError::bad_request(format!("Field '{key}' cannot be updated")))?;

        sets.push(format!("{} = ?", field.column));
        values.push(to_sql_value(field, value)?);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        sets.join(", "),
        id_column
    );

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[UpdatableField] = &[
        field("fullName", "full_name", FieldKind::Text),
        field("email", "email", FieldKind::NullableText),
        field("salary", "salary", FieldKind::Money),
        field("isActive", "is_active", FieldKind::Bool),
        field("roleId", "role_id", FieldKind::Id),
    ];

    fn reject(body: Value) -> String {
        build_update_sql("users", &body, FIELDS, "id", 9)
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn maps_keys_to_columns() {
        let update = build_update_sql(
            "users",
            &json!({"fullName": "Hina Raza", "salary": 120000.5}),
            FIELDS,
            "id",
            9,
        )
        .unwrap();

        assert_eq!(update.sql, "UPDATE users SET full_name = ?, salary = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Hina Raza".into()),
                SqlValue::F64(120000.5),
                SqlValue::U64(9),
            ]
        );
    }

    #[test]
    fn refuses_columns_outside_the_list() {
        assert_eq!(reject(json!({"role_id": 1})), "Field 'role_id' cannot be updated");
    }

    #[test]
    fn refuses_empty_and_non_object_bodies() {
        assert!(build_update_sql("users", &json!({}), FIELDS, "id", 1).is_err());
        assert!(build_update_sql("users", &json!([1, 2]), FIELDS, "id", 1).is_err());
        assert!(build_update_sql("users", &json!({"salary": [1]}), FIELDS, "id", 1).is_err());
    }

    #[test]
    fn accepts_each_kind_in_its_shape() {
        let update = build_update_sql(
            "users",
            &json!({"email": null, "isActive": false, "roleId": 4, "salary": null}),
            FIELDS,
            "id",
            9,
        )
        .unwrap();

        assert_eq!(
            update.values,
            vec![
                SqlValue::Null,
                SqlValue::Bool(false),
                SqlValue::U64(4),
                SqlValue::Null,
                SqlValue::U64(9),
            ]
        );
    }

    #[test]
    fn wrong_text_values_are_bad_requests() {
        assert_eq!(reject(json!({"fullName": null})), "fullName must be a string");
        assert_eq!(reject(json!({"fullName": 42})), "fullName must be a string");
        assert_eq!(reject(json!({"email": true})), "email must be a string or null");
    }

    #[test]
    fn wrong_money_values_are_bad_requests() {
        assert_eq!(
            reject(json!({"salary": "lots"})),
            "salary must be a non-negative number or null"
        );
        assert_eq!(reject(json!({"salary": -1})), "salary cannot be negative");
    }

    #[test]
    fn wrong_flag_and_id_values_are_bad_requests() {
        assert_eq!(reject(json!({"isActive": "yes"})), "isActive must be true or false");
        assert_eq!(reject(json!({"isActive": 1})), "isActive must be true or false");
        assert_eq!(reject(json!({"roleId": -2})), "roleId must be a positive integer");
        assert_eq!(reject(json!({"roleId": "4"})), "roleId must be a positive integer");
    }

    #[test]
    fn bad_values_map_to_400() {
        use actix_web::{ResponseError, http::StatusCode};

        let err = build_update_sql("users", &json!({"isActive": "yes"}), FIELDS, "id", 9).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
