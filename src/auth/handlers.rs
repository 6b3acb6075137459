use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, ApiResult},
    model::role::Role,
    models::{Claims, LoginReqDto, TokenType, UserReq, UserSql},
    utils::usernames,
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, error, info, instrument, warn};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn token_error(e: jsonwebtoken::errors::Error) -> ApiError {
    ApiError::Internal(format!("Failed to sign token: {e}"))
}

/// Signs a fresh access/refresh pair and stores the refresh jti.
async fn issue_tokens(
    conn: &mut MySqlConnection,
    config: &Config,
    user_id: u64,
    username: &str,
    role_id: u8,
) -> ApiResult<TokenPair> {
    let access_token = generate_access_token(
        user_id,
        username.to_string(),
        role_id,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        username.to_string(),
        role_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(&mut *conn)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> ApiResult<Claims> {
    let token = bearer(req).ok_or_else(|| ApiError::Unauthorized("Missing refresh token".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid refresh token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Refresh token required".into()));
    }
    Ok(claims)
}

/// Self-registration always yields an employee or instructor account.
fn registration_role(requested: Option<&str>) -> ApiResult<Role> {
    let role = match requested {
        None => Role::Employee,
        Some(name) => name
            .trim()
            .parse::<Role>()
            .map_err(|_| ApiError::bad_request("Unknown role"))?,
    };
    if role.is_staff() {
        return Err(ApiError::forbidden("Staff accounts are created by an admin"));
    }
    Ok(role)
}

/// User registration handler
#[instrument(name = "auth_register", skip(user, pool), fields(username = %user.username))]
pub async fn register(user: web::Json<UserReq>, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let username = usernames::normalize(&user.username);
    let full_name = user.full_name.trim();

    if username.is_empty() || user.password.is_empty() || full_name.is_empty() {
        return Err(ApiError::bad_request(
            "Username, password and full name must not be empty",
        ));
    }

    let role = registration_role(user.role.as_deref())?;

    if !usernames::is_available(&username, pool.get_ref()).await? {
        info!("Username already taken");
        return Err(ApiError::Conflict("Username already taken".into()));
    }

    let hashed = hash_password(&user.password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password, role_id, full_name, email)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&username)
    .bind(&hashed)
    .bind(role.id())
    .bind(full_name)
    .bind(user.email.as_deref())
    .execute(pool.get_ref())
    .await
    // lost a race with another registration
    .map_err(|e| ApiError::from_insert(e, "Username already exists"))?;

    usernames::remember(&username).await;

    info!(user_id = result.last_insert_id(), role = %role, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully"
    })))
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(ApiError::bad_request("Username or password required"));
    }

    debug!("Fetching user from database");

    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(usernames::normalize(&user.username))
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        ApiError::Unauthorized("Invalid credentials".into())
    })?;

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    if !db_user.is_active {
        warn!(user_id = db_user.id, "Login refused for inactive user");
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    debug!("Password verified");

    let mut conn = pool.acquire().await?;
    let tokens = issue_tokens(
        &mut conn,
        &config,
        db_user.id,
        &db_user.username,
        db_user.role_id,
    )
    .await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not worth failing the login over
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(tokens))
}

/// Rotates a refresh token: the presented one is revoked and a new pair issued.
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let claims = refresh_claims(&req, &config)?;

    let mut tx = pool.begin().await?;

    let record = sqlx::query_as::<_, (u64, bool)>(
        r#"
        SELECT id, revoked
        FROM refresh_tokens
        WHERE jti = ?
        FOR UPDATE
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?;

    let record_id = match record {
        Some((id, false)) => id,
        Some((_, true)) => {
            warn!(user_id = claims.user_id, "Revoked refresh token presented");
            return Err(ApiError::Unauthorized("Refresh token revoked".into()));
        }
        None => return Err(ApiError::Unauthorized("Unknown refresh token".into())),
    };

    // role or status may have changed since the token was issued
    let user = sqlx::query_as::<_, UserSql>(
        "SELECT id, username, password, role_id, is_active FROM users WHERE id = ?",
    )
    .bind(claims.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .filter(|u| u.is_active)
    .ok_or_else(|| ApiError::Unauthorized("Account unavailable".into()))?;

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record_id)
        .execute(&mut *tx)
        .await?;

    let tokens = issue_tokens(&mut tx, &config, user.id, &user.username, user.role_id).await?;
    tx.commit().await?;

    debug!(user_id = user.id, "Refresh token rotated");

    Ok(HttpResponse::Ok().json(tokens))
}

/// Revokes the presented refresh token. Always 204 so callers can't probe tokens.
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let claims = match refresh_claims(&req, &config) {
        Ok(c) => c,
        Err(_) => return Ok(HttpResponse::NoContent().finish()),
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await?;

    info!(user_id = claims.user_id, "Logged out");

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn registration_defaults_to_employee_and_refuses_staff() {
        assert_eq!(registration_role(None).unwrap(), Role::Employee);
        assert_eq!(registration_role(Some("Instructor")).unwrap(), Role::Instructor);
        assert!(matches!(registration_role(Some("admin")), Err(ApiError::Forbidden(_))));
        assert!(matches!(registration_role(Some("pilot")), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn refresh_requires_a_refresh_token() {
        let config = Config::for_tests();
        let access = generate_access_token(3, "sana".into(), 3, &config.jwt_secret, 60).unwrap();
        let (refresh, issued) =
            generate_refresh_token(3, "sana".into(), 3, &config.jwt_secret, 60).unwrap();

        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_http_request();
        assert!(matches!(refresh_claims(&req, &config), Err(ApiError::Unauthorized(_))));

        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_http_request();
        assert_eq!(refresh_claims(&req, &config).unwrap().jti, issued.jti);

        let req = TestRequest::default().to_http_request();
        assert!(refresh_claims(&req, &config).is_err());
    }

    #[test]
    fn token_pair_is_camel_case() {
        let json = serde_json::to_value(TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        })
        .unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
    }
}
