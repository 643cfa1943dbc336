use std::env;

use crate::error::AppError;

/// URI that selects the in-process backends instead of MongoDB.
pub const MEMORY_URI: &str = "memory://";

/// Upper bound for `TOKEN_TTL_HOURS`: one year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 8760;

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub kv_collection: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub frontend_origin: String,
    pub bind_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        let token_ttl_hours = parse_token_ttl(env::var("TOKEN_TTL_HOURS").ok())?;

        Ok(Self {
            mongo_uri: required("MONGO_URI")?,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "task_board".to_string()),
            kv_collection: env::var("KV_COLLECTION").unwrap_or_else(|_| "kv_store".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            token_ttl_hours,
            frontend_origin: env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }

    pub fn uses_memory_backend(&self) -> bool {
        self.mongo_uri == MEMORY_URI
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Config(format!("{} must be set", key)))
}

fn parse_token_ttl(raw: Option<String>) -> Result<i64, AppError> {
    let Some(raw) = raw else {
        return Ok(24);
    };
    match raw.trim().parse::<i64>() {
        Ok(hours) if (1..=MAX_TOKEN_TTL_HOURS).contains(&hours) => Ok(hours),
        _ => Err(AppError::Config(format!(
            "TOKEN_TTL_HOURS must be an integer between 1 and {}, got {:?}",
            MAX_TOKEN_TTL_HOURS, raw
        ))),
    }
}
