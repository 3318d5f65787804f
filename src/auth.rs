use std::env;

use anyhow::anyhow;
use argon2::password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, PasswordHash};
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::AppState;
use crate::models::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

pub struct AuthKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires: TimeDelta,
}

impl AuthKeys {
    pub fn new(secret: &str, access_token_expires: TimeDelta) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            access_token_expires,
        }
    }

    pub fn from_env() -> Self {
        let secret_key = env::var("SECRET_KEY").expect("SECRET_KEY must be set");
        Self::new(&secret_key, TimeDelta::hours(8))
    }

    pub fn issue_token(&self, user_id: i32, role: Role) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp() as usize,
            exp: (now + self.access_token_expires).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| AppError::Internal(anyhow!("failed to sign token: {err}")))
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::InvalidToken)
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Internal(anyhow!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Authenticated caller identity, resolved from the bearer token.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

impl AuthUser {
    /// Role gate applied by the handler layer; the order service itself only
    /// scopes queries by waiter id.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AppError::MissingToken)?
            .to_str()
            .map_err(|_| AppError::InvalidToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::InvalidToken)?;

        let claims = state.auth.decode_token(token)?;
        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let keys = AuthKeys::new("test-secret", TimeDelta::hours(1));
        let token = keys.issue_token(42, Role::Waiter).unwrap();
        let claims = keys.decode_token(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Waiter);
    }

    #[test]
    fn expired_token_is_rejected() {
        // jsonwebtoken applies 60s of leeway by default
        let keys = AuthKeys::new("test-secret", TimeDelta::seconds(-120));
        let token = keys.issue_token(42, Role::Admin).unwrap();
        assert!(matches!(
            keys.decode_token(&token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let keys = AuthKeys::new("test-secret", TimeDelta::hours(1));
        let other = AuthKeys::new("other-secret", TimeDelta::hours(1));
        let token = other.issue_token(42, Role::Cook).unwrap();
        assert!(matches!(
            keys.decode_token(&token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("s3cret").unwrap();
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not-a-phc-string"));
    }
}
