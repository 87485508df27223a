use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use planboard_shared::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;

/// Session token payload. Carries enough of the user to build an
/// [`AuthUser`](super::AuthUser) without touching the store.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    fn for_user(user: &User, lifetime_secs: i64) -> Self {
        let issued = Utc::now();
        Self {
            sub: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            iat: issued.timestamp(),
            exp: (issued + Duration::seconds(lifetime_secs)).timestamp(),
        }
    }
}

pub fn create_session_token(user: &User, config: &Config) -> Result<String, AppError> {
    let claims = Claims::for_user(user, config.session_expires_in);
    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign session: {}", e)))
}

pub fn verify_session_token(token: &str, config: &Config) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

    match decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256)) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            tracing::debug!("Rejected session token: {}", e);
            Err(AppError::Unauthorized)
        }
    }
}
