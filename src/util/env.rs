//! Process configuration, sourced from the environment (and a `.env` file in
//! development via [`dotenvy`]).
//!
//! Loaded once into a static on first access; missing optional vars select
//! fallback implementations at startup rather than failing the process.

use std::sync::LazyLock;

use crate::constants::{SERVER_PORT, TOKEN_EXPIRY_HOURS};

const DEFAULT_JWT_SECRET: &str = "super-secret-key";

static ENV: LazyLock<Env> = LazyLock::new(Env::load);

pub fn env() -> &'static Env {
    &ENV
}

#[derive(Debug, Clone)]
pub struct Env {
    /// Postgres connection string. Unset selects the in-memory store.
    pub database_url: Option<String>,
    /// Shared cache address. Unset selects the in-memory leaderboard.
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub server_api_port: u16,
    pub token_expiry_hours: i64,
}

impl Env {
    fn load() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = optional("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set, using the built-in development secret");
            DEFAULT_JWT_SECRET.to_string()
        });

        Self {
            database_url: optional("DATABASE_URL"),
            redis_url: optional("REDIS_URL"),
            jwt_secret,
            server_api_port: parsed("SERVER_API_PORT", SERVER_PORT),
            token_expiry_hours: parsed("TOKEN_EXPIRY_HOURS", TOKEN_EXPIRY_HOURS),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    match optional(key) {
        Some(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, raw, "unparseable env var, using default");
                fallback
            }
        },
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_on_garbage() {
        unsafe { std::env::set_var("WAYPOST_TEST_PORT", "not-a-port") };
        assert_eq!(parsed("WAYPOST_TEST_PORT", 8080u16), 8080);

        unsafe { std::env::set_var("WAYPOST_TEST_PORT", "9001") };
        assert_eq!(parsed("WAYPOST_TEST_PORT", 8080u16), 9001);
    }

    #[test]
    fn optional_treats_empty_as_unset() {
        unsafe { std::env::set_var("WAYPOST_TEST_EMPTY", "") };
        assert_eq!(optional("WAYPOST_TEST_EMPTY"), None);
    }
}
