//! Environment configuration

use chrono::{FixedOffset, Weekday};
use std::env;
use std::str::FromStr;

use crate::analytics::Calendar;
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// sqlite URL of the persistent store. `None` keeps everything in memory.
    pub store_url: Option<String>,
    pub max_connections: u32,
    pub port: u16,
    pub log_level: String,
    pub utc_offset_minutes: i32,
    pub week_start: Weekday,
}

impl Default for Config {
    fn default() -> Self {
        Self { store_url: None, max_connections: 5, port: 8083, log_level: "info".into(), utc_offset_minutes: 0, week_start: Weekday::Mon }
    }
}

impl Config {
    /// Loads `.env` when present, then reads `STOREFRONT_*` and `PORT`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Self {
            store_url: value("STOREFRONT_STORE_URL"),
            max_connections: parse(value("STOREFRONT_MAX_CONNECTIONS"), "STOREFRONT_MAX_CONNECTIONS", defaults.max_connections)?,
            port: parse(value("PORT"), "PORT", defaults.port)?,
            log_level: value("STOREFRONT_LOG_LEVEL").unwrap_or(defaults.log_level),
            utc_offset_minutes: parse(value("STOREFRONT_UTC_OFFSET_MINUTES"), "STOREFRONT_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes)?,
            week_start: parse(value("STOREFRONT_WEEK_START"), "STOREFRONT_WEEK_START", defaults.week_start)?,
        })
    }

    pub fn calendar(&self) -> Result<Calendar> {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or_else(|| StorefrontError::Config(format!("UTC offset of {} minutes is out of range", self.utc_offset_minutes)))?;
        Ok(Calendar::new(offset, self.week_start))
    }
}

fn parse<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| StorefrontError::Config(format!("{key} has an invalid value {raw:?}"))),
    }
}
