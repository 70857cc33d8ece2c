use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

use crate::domain::value_objects::{OrderNumberFormat, OrderNumberGenerator, DEFAULT_TIMEZONE};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub order_timezone: String,
    pub order_number_format: OrderNumberFormat,
    pub currency: String,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            port: try_load(&lookup, "PORT", "8083")?,
            database_url: optional(&lookup, "DATABASE_URL"),
            database_max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "10")?,
            nats_url: optional(&lookup, "NATS_URL"),
            order_timezone: try_load(&lookup, "ORDER_TIMEZONE", DEFAULT_TIMEZONE)?,
            order_number_format: try_load(&lookup, "ORDER_NUMBER_FORMAT", "legacy")?,
            currency: try_load::<String>(&lookup, "STORE_CURRENCY", "USD")?.to_uppercase(),
        };
        // an unusable timezone must stop start-up, not the first checkout
        config.order_numbers()?;
        Ok(config)
    }

    pub fn order_numbers(&self) -> Result<OrderNumberGenerator> {
        OrderNumberGenerator::new(&self.order_timezone, self.order_number_format)
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    let value = lookup(key).filter(|v| !v.trim().is_empty());
    if value.is_none() {
        warn!("Environment variable {key} not found");
    }
    value
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| EcommerceError::Configuration(format!("Invalid {key} value: {e}")))
}
