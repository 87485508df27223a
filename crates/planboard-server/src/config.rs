use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without one the server keeps everything in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub session_expires_in: i64,
    pub auth_cookie: String,
    pub image_bucket: String,
    pub max_image_bytes: usize,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            session_expires_in: env::var("SESSION_EXPIRES_IN")
                .unwrap_or_else(|_| "2592000".to_string()) // 30 days
                .parse()
                .context("SESSION_EXPIRES_IN must be a number of seconds")?,
            auth_cookie: env::var("AUTH_COOKIE")
                .unwrap_or_else(|_| "planboard-session".to_string()),
            image_bucket: env::var("IMAGE_BUCKET_ID").unwrap_or_else(|_| "images".to_string()),
            max_image_bytes: env::var("MAX_IMAGE_BYTES")
                .unwrap_or_else(|_| "1048576".to_string()) // 1 MiB
                .parse()
                .context("MAX_IMAGE_BYTES must be a number")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid port number")?,
        })
    }

    /// Config for tests and local experiments: in-memory storage, fixed secret.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: None,
            jwt_secret: jwt_secret.into(),
            session_expires_in: 3600,
            auth_cookie: "planboard-session".to_string(),
            image_bucket: "images".to_string(),
            max_image_bytes: 1024 * 1024,
            port: 0,
        }
    }
}
