//! Domain records returned by the CRM service.
//!
//! The service serializes numbers as strings ("125.50") and booleans as
//! "Y"/"N"; the helpers here accept both the lenient and the literal JSON
//! forms so decoding survives either representation.

mod company;
mod invoice;

pub use company::Company;
pub use invoice::{Invoice, LineItem};

use chrono::NaiveDate;
use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;
use serde_json::Value;

pub(crate) fn de_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| DeError::custom("expected unsigned integer")),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| DeError::custom(format!("invalid integer: {:?}", text))),
        other => Err(DeError::custom(format!(
            "expected number or numeric string, got {}",
            other
        ))),
    }
}

pub(crate) fn de_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(text) if text.trim().is_empty() || text.trim() == "0" => Ok(None),
        Value::Number(number) => Ok(number.as_u64().filter(|id| *id != 0)),
        Value::String(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DeError::custom(format!("invalid integer: {:?}", text))),
        other => Err(DeError::custom(format!(
            "expected number, numeric string or null, got {}",
            other
        ))),
    }
}

pub(crate) fn de_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| DeError::custom("expected float")),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| DeError::custom(format!("invalid number: {:?}", text))),
        other => Err(DeError::custom(format!(
            "expected number or numeric string, got {}",
            other
        ))),
    }
}

pub(crate) fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::Number(number) => Ok(number.as_f64()),
        Value::String(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DeError::custom(format!("invalid number: {:?}", text))),
        other => Err(DeError::custom(format!(
            "expected number, numeric string or null, got {}",
            other
        ))),
    }
}

/// Dates arrive either bare ("2024-03-15") or with a time and offset
/// ("2024-03-15T10:30:00+03:00"); only the date part matters here.
pub(crate) fn de_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let date_part = text.get(..10).unwrap_or(&text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| DeError::custom(format!("invalid date: {:?}", text)))
}

/// "Y"/"N" flags, tolerating real booleans.
pub(crate) fn de_yn<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Ok(flag),
        Value::String(text) => Ok(text.eq_ignore_ascii_case("y")),
        Value::Null => Ok(false),
        other => Err(DeError::custom(format!(
            "expected Y/N flag, got {}",
            other
        ))),
    }
}

pub(crate) fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        other => Ok(Some(other.to_string())),
    }
}
