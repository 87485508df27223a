use serde::{Deserialize, Serialize};

use super::{validate_name, ValidationError};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 256;

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Returns the request with a trimmed name and a normalized email.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = validate_name("name", &self.name)?;
        let email = normalize_email(&self.email)?;
        let len = self.password.chars().count();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Err(ValidationError::new(
                "password",
                format!(
                    "Must be between {} and {} characters",
                    MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
                ),
            ));
        }
        Ok(Self {
            name,
            email,
            password: self.password,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ValidationError::new("email", "Invalid email")),
    }
}
