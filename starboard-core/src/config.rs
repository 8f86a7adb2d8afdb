//! Environment lookups shared by the per-crate config loaders

use std::env;
use std::str::FromStr;

use crate::error::{StarboardError, StarboardResult};

/// Read a variable that must be present and non-empty
pub fn required_env(key: &str) -> StarboardResult<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Ok(_) => Err(StarboardError::configuration(key, "is empty")),
        Err(_) => Err(StarboardError::configuration(key, "not set")),
    }
}

/// Read an optional variable, treating an empty value as unset
pub fn optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse an optional variable, falling back to `default`
pub fn parse_env_or<T>(key: &str, default: T) -> StarboardResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

/// Parse a raw value, naming `key` in the error
pub fn parse_value<T>(key: &str, raw: &str) -> StarboardResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| StarboardError::configuration(key, format!("invalid value {:?}: {}", raw, e)))
}

/// Parse a Discord snowflake, which is never zero
pub fn parse_snowflake(key: &str, raw: &str) -> StarboardResult<u64> {
    match parse_value::<u64>(key, raw)? {
        0 => Err(StarboardError::configuration(key, "id must be non-zero")),
        id => Ok(id),
    }
}
