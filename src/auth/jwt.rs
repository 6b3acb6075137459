use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize
}

fn claims(user_id: u64, username: String, role: u8, ttl: usize, token_type: TokenType) -> Claims {
    Claims {
        user_id,
        sub: username,
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    }
}

fn sign(claims: &Claims, secret: &str) -> Result<String, Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_access_token(
    user_id: u64,
    username: String,
    role: u8,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    sign(&claims(user_id, username, role, ttl, TokenType::Access), secret)
}

pub fn generate_refresh_token(
    user_id: u64,
    username: String,
    role: u8,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = claims(user_id, username, role, ttl, TokenType::Refresh);
    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
