use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReq {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: Option<String>,
    /// `admin`, `hr`, `employee` or `instructor`; defaults to `employee`
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginReqDto {
    pub username: String,
    pub password: String,
}

#[derive(FromRow)]
pub struct UserSql {
    pub id: u64, // BIGINT UNSIGNED
    pub username: String,
    pub password: String,
    pub role_id: u8,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
