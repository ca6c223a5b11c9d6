//! Checked conversions from JSON values into typed fields.
//!
//! A missing key reads as `null`.  The `*_or` variants return their default
//! for `null` and only for `null`: a present value of the wrong type is an
//! error, never silently coerced.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde_json::Value;

use crate::address::Address;
use crate::error::{CodecError, ConversionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowEmpty {
    Yes,
    No,
}

pub fn to_bool(value: &Value) -> Result<bool, ConversionError> {
    value.as_bool().ok_or(ConversionError::WrongType("bool"))
}

pub fn to_bool_or(value: &Value, default: bool) -> Result<bool, ConversionError> {
    if value.is_null() {
        return Ok(default);
    }
    to_bool(value)
}

pub fn to_u32(value: &Value) -> Result<u32, ConversionError> {
    let wide = value.as_u64().ok_or(ConversionError::WrongType("unsigned integer"))?;
    u32::try_from(wide).map_err(|_| ConversionError::OutOfRange("u32"))
}

pub fn to_u32_or(value: &Value, default: u32) -> Result<u32, ConversionError> {
    if value.is_null() {
        return Ok(default);
    }
    to_u32(value)
}

pub fn to_string(value: &Value, allow_empty: AllowEmpty) -> Result<String, ConversionError> {
    let s = value.as_str().ok_or(ConversionError::WrongType("string"))?;
    if allow_empty == AllowEmpty::No && s.is_empty() {
        return Err(ConversionError::EmptyString);
    }
    Ok(s.to_owned())
}

/// Empty strings are accepted only when the default itself is empty.
pub fn to_string_or(value: &Value, default: &str) -> Result<String, ConversionError> {
    if value.is_null() {
        return Ok(default.to_owned());
    }
    let allow_empty = if default.is_empty() { AllowEmpty::Yes } else { AllowEmpty::No };
    to_string(value, allow_empty)
}

pub fn to_hex_string(value: &Value, allow_empty: AllowEmpty) -> Result<String, ConversionError> {
    let s = to_string(value, allow_empty)?;
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ConversionError::InvalidHex);
    }
    Ok(s)
}

pub fn to_base64_bytes(value: &Value, allow_empty: AllowEmpty) -> Result<Vec<u8>, ConversionError> {
    let encoded = to_string(value, allow_empty)?;
    STANDARD
        .decode(encoded)
        .map_err(|_| ConversionError::InvalidBase64)
}

pub fn to_date_time(value: &Value) -> Result<DateTime<FixedOffset>, ConversionError> {
    let s = to_string(value, AllowEmpty::No)?;
    DateTime::parse_from_rfc3339(&s).map_err(|_| ConversionError::InvalidDateTime(s))
}

pub fn to_address(value: &Value) -> Result<Address, ConversionError> {
    let s = to_string(value, AllowEmpty::No)?;
    Address::parse(&s)
}

/// RFC 3339 with `Z` for UTC and fractional seconds only when present.
pub fn date_time_to_string(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Wrap a conversion failure as `InvalidContentFormat("<field> invalid")`.
pub trait FieldExt<T> {
    fn field(self, name: &str) -> Result<T>;
}

impl<T> FieldExt<T> for Result<T, ConversionError> {
    fn field(self, name: &str) -> Result<T> {
        self.map_err(|e| CodecError::invalid_with(format!("{name} invalid"), e))
    }
}
