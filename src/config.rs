use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub bind_addr: String,
    pub port: u16,
    pub db_pool_size: u32,
    pub page_size: i64,
}

impl Config {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            redis_url: var("REDIS_URL"),
            bind_addr: try_load("BIND_ADDR", "127.0.0.1".to_string()),
            port: try_load("PORT", 8080),
            db_pool_size: try_load("DB_POOL_SIZE", 10),
            page_size: try_load("PAGE_SIZE", 6),
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|err| {
            log::warn!("invalid {} value {:?} ({}), using default: {}", key, raw, err, default);
            default
        }),
        None => {
            log::info!("{} not set, using default: {}", key, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_value_falls_back_to_default() {
        env::set_var("FOODGRAM_TEST_PORT", "eighty");
        assert_eq!(try_load::<u16>("FOODGRAM_TEST_PORT", 8080), 8080);
        env::set_var("FOODGRAM_TEST_PORT", " 9000 ");
        assert_eq!(try_load::<u16>("FOODGRAM_TEST_PORT", 8080), 9000);
        env::remove_var("FOODGRAM_TEST_PORT");
        assert_eq!(try_load::<u16>("FOODGRAM_TEST_PORT", 8080), 8080);
    }

    #[test]
    fn blank_variable_counts_as_unset() {
        env::set_var("FOODGRAM_TEST_BLANK", "  ");
        assert_eq!(var("FOODGRAM_TEST_BLANK"), None);
        env::remove_var("FOODGRAM_TEST_BLANK");
    }
}
