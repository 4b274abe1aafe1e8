//! Field decoders for the typed views.
//!
//! Schemas are the only gate on stored content, so the typed views read
//! whatever shape a schema let through: a value of an unexpected JSON type
//! reads as absent instead of failing the decode.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::experience::{OutcomeMetrics, ShareLevel};

pub(crate) fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Value::deserialize(d)?.as_str().map(str::to_string))
}

pub(crate) fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Value::deserialize(d)?.as_f64().unwrap_or(0.0))
}

/// Numeric items of an array; other items are dropped.
pub(crate) fn numbers<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items.iter().filter_map(Value::as_f64).collect(),
        _ => Vec::new(),
    })
}

pub(crate) fn share_level<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ShareLevel>, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(d)?).ok())
}

/// Present unless explicitly `null`.
pub(crate) fn metrics<'de, D: Deserializer<'de>>(d: D) -> Result<Option<OutcomeMetrics>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok((!value.is_null()).then(|| OutcomeMetrics::from_json(&value)))
}

/// A whole, non-negative count. `3.0` reads as `3`.
pub(crate) fn count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
            .map(|n| n as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_accept_integral_floats() {
        assert_eq!(count(&json!(3)), Some(3));
        assert_eq!(count(&json!(3.0)), Some(3));
        assert_eq!(count(&json!(3.5)), None);
        assert_eq!(count(&json!(-1)), None);
        assert_eq!(count(&json!("3")), None);
    }
}
