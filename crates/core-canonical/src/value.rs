//! Payload construction helpers
//!
//! A payload is a flat-or-nested map of field names to JSON values. The
//! helpers here exist so callers cannot smuggle non-representable values
//! (NaN, infinities) into a payload, and so monetary amounts are carried
//! with a fixed decimal rendering instead of whatever a float prints as.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A structured field map, canonicalized before digesting.
///
/// Absent optional fields must be inserted as explicit `Value::Null`
/// rather than omitted; omission would silently change what the digest
/// covers between two versions of the same record.
pub type Payload = Map<String, Value>;

/// Convert an `f64` into a JSON number, rejecting NaN and infinities.
///
/// The `field` name is only used for error attribution.
pub fn number_from_f64(field: &str, value: f64) -> Result<Value> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| Error::non_finite(field))
}

/// Render a monetary amount in minor units as a fixed-point decimal string.
///
/// `fixed_amount(10001, 2)` yields `"100.01"`. A string representation
/// sidesteps float formatting entirely, so `100.00` and `100.0` are
/// distinct payload values with distinct digests.
pub fn fixed_amount(minor_units: i64, scale: u32) -> Value {
    if scale == 0 {
        return Value::String(minor_units.to_string());
    }
    let divisor = 10i64.pow(scale);
    let sign = if minor_units < 0 { "-" } else { "" };
    let magnitude = minor_units.unsigned_abs();
    let divisor = divisor as u64;
    Value::String(format!(
        "{}{}.{:0width$}",
        sign,
        magnitude / divisor,
        magnitude % divisor,
        width = scale as usize
    ))
}

/// Build a payload from an iterator of `(key, value)` pairs.
pub fn payload_from<I, K>(fields: I) -> Payload
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v))
        .collect()
}
