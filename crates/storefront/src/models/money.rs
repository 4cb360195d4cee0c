//! Money amounts as stored on documents.
//!
//! Prices are written as plain numbers (integers when whole), but older
//! documents carry them as strings, so reads accept either.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Convert an amount to its stored JSON form.
#[must_use]
pub fn to_value(amount: Decimal) -> Value {
    let normalized = amount.normalize();
    if normalized.is_integer()
        && let Some(whole) = normalized.to_i64()
    {
        return Value::from(whole);
    }
    normalized
        .to_f64()
        .map_or_else(|| Value::String(normalized.to_string()), Value::from)
}

/// Read an amount from a stored JSON value (number or numeric string).
#[must_use]
pub fn from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                n.as_f64().and_then(|f| Decimal::try_from(f).ok())
            }
        }
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('₦')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

/// `#[serde(with = "...")]` adapter for a required amount.
pub mod amount {
    use super::{Decimal, Deserialize, Deserializer, Serializer, Value};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&super::to_value(*amount), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let value = Value::deserialize(deserializer)?;
        super::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {value}")))
    }
}

/// `#[serde(with = "...")]` adapter for an optional amount. Unparseable values read as `None`.
pub mod optional_amount {
    use super::{Decimal, Deserialize, Deserializer, Serializer, Value};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        amount: &Option<Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match amount {
            Some(amount) => serde::Serialize::serialize(&super::to_value(*amount), serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Decimal>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(super::from_value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_whole_amounts_are_integers() {
        assert_eq!(to_value(dec("2500.00")), json!(2500));
        assert_eq!(to_value(dec("1250.5")), json!(1250.5));
    }

    #[test]
    fn test_reads_numbers_and_strings() {
        assert_eq!(from_value(&json!(1500)), Some(dec("1500")));
        assert_eq!(from_value(&json!(1500.5)), Some(dec("1500.5")));
        assert_eq!(from_value(&json!("3000")), Some(dec("3000")));
        assert_eq!(from_value(&json!("₦2,500")), Some(dec("2500")));
        assert_eq!(from_value(&json!(null)), None);
        assert_eq!(from_value(&json!("two thousand")), None);
    }
}
