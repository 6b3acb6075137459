use crate::config::Config;
use crate::error::ApiError;
use crate::{
    auth::jwt::verify_token,
    model::role::Role,
    models::{Claims, TokenType},
};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Builds the caller from verified claims. Refresh tokens are not accepted here.
    pub fn from_claims(claims: Claims) -> Result<Self, ApiError> {
        if claims.token_type != TokenType::Access {
            return Err(ApiError::Unauthorized("Access token required".into()));
        }

        let role =
            Role::from_id(claims.role).ok_or_else(|| ApiError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
        })
    }

    fn from_header(req: &HttpRequest) -> Result<Self, ApiError> {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;

        let config = req
            .app_data::<Data<Config>>()
            .ok_or_else(|| ApiError::Internal("Config missing".into()))?;

        let claims = verify_token(token, &config.jwt_secret)
            .map_err(|_| ApiError::Unauthorized("Invalid token".into()))?;

        Self::from_claims(claims)
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        ready(Self::from_header(req))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), ApiError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(ApiError::forbidden("HR/Admin only"))
        }
    }

    pub fn require_instructor(&self) -> Result<(), ApiError> {
        if self.role == Role::Instructor {
            Ok(())
        } else {
            Err(ApiError::forbidden("Instructors only"))
        }
    }

    /// Staff may act on anyone; everybody else only on themselves.
    pub fn require_self_or_staff(&self, user_id: u64) -> Result<(), ApiError> {
        if self.role.is_staff() || self.user_id == user_id {
            Ok(())
        } else {
            Err(ApiError::forbidden("Not allowed to access another user's records"))
        }
    }

    /// User filter for list endpoints: staff see what they ask for, others only themselves.
    pub fn scope_user_filter(&self, requested: Option<u64>) -> Option<u64> {
        if self.role.is_staff() {
            requested
        } else {
            Some(self.user_id)
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use actix_web::{ResponseError, http::StatusCode, test::TestRequest};

    fn config() -> Config {
        Config::for_tests()
    }

    fn user(role: Role, user_id: u64) -> AuthUser {
        AuthUser {
            user_id,
            username: "someone".into(),
            role,
        }
    }

    #[actix_web::test]
    async fn extracts_user_from_bearer_token() {
        let cfg = config();
        let token = generate_access_token(12, "instructor1".into(), 4, &cfg.jwt_secret, 60).unwrap();

        let req = TestRequest::default()
            .app_data(Data::new(cfg))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_request();

        let auth = AuthUser::extract(&req).await.unwrap();
        assert_eq!(auth.user_id, 12);
        assert_eq!(auth.role, Role::Instructor);
    }

    #[actix_web::test]
    async fn refuses_refresh_tokens_and_missing_headers() {
        let cfg = config();
        let (refresh, _) = generate_refresh_token(1, "admin".into(), 1, &cfg.jwt_secret, 60).unwrap();

        let req = TestRequest::default()
            .app_data(Data::new(cfg))
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_http_request();
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let req = TestRequest::default().app_data(Data::new(config())).to_http_request();
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn role_guards() {
        assert!(user(Role::Admin, 1).require_admin().is_ok());
        assert!(user(Role::Hr, 1).require_admin().is_err());
        assert!(user(Role::Hr, 1).require_hr_or_admin().is_ok());
        assert!(user(Role::Employee, 1).require_hr_or_admin().is_err());
        assert!(user(Role::Instructor, 1).require_instructor().is_ok());
        assert!(user(Role::Employee, 5).require_self_or_staff(5).is_ok());
        assert!(user(Role::Employee, 5).require_self_or_staff(6).is_err());
        assert!(user(Role::Hr, 5).require_self_or_staff(6).is_ok());
    }

    #[test]
    fn list_filters_are_pinned_for_non_staff() {
        assert_eq!(user(Role::Employee, 5).scope_user_filter(Some(9)), Some(5));
        assert_eq!(user(Role::Employee, 5).scope_user_filter(None), Some(5));
        assert_eq!(user(Role::Admin, 1).scope_user_filter(Some(9)), Some(9));
        assert_eq!(user(Role::Admin, 1).scope_user_filter(None), None);
    }
}
