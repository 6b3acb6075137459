use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::calc::{
    attendance::AttendanceError, calendar::CalendarError, leave::LeaveError,
    salary::SalaryError, time_slots::SlotError,
};

/// Error returned by every protected handler.
///
/// Rendered as `{"message": "..."}` with the matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Maps a MySQL duplicate-key failure (SQLSTATE 23000) to 409, anything else to 500.
    pub fn from_insert(err: sqlx::Error, conflict_msg: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23000") {
                return Self::Conflict(conflict_msg.to_string());
            }
        }
        Self::Database(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // never leak driver messages
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(json!({ "message": message }))
    }
}

macro_rules! bad_request_from {
    ($($err:ty),* $(,)?) => {
        $(
            impl From<$err> for ApiError {
                fn from(e: $err) -> Self {
                    ApiError::BadRequest(e.to_string())
                }
            }
        )*
    };
}

bad_request_from!(
    AttendanceError,
    CalendarError,
    LeaveError,
    SalaryError,
    SlotError
);

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(
            ApiError::bad_request("Pick a date").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("Missing token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::forbidden("Admin only").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("Leave not found").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Conflict("Salary sheet already exists".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn non_database_insert_errors_stay_internal() {
        let err = ApiError::from_insert(sqlx::Error::PoolTimedOut, "duplicate");
        assert!(matches!(err, ApiError::Database(_)));
    }

    #[test]
    fn slot_errors_become_bad_requests() {
        let err: ApiError = SlotError::EndBeforeStart.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Each slot must end after it starts");
    }

    #[actix_web::test]
    async fn renders_message_body() {
        let resp = ApiError::bad_request("Pick a date").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Pick a date");
    }

    #[actix_web::test]
    async fn hides_database_details() {
        let resp = ApiError::Database(sqlx::Error::PoolClosed).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Internal Server Error");
    }
}
