use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

/// Normalize an amount stored either as a JSON number or as text.
///
/// Strings may use a decimal comma and whitespace as a thousands separator
/// (`"1 234,50"`). Anything that cannot be read as a number is treated as 0.
pub fn parse_amount(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => parse_amount_str(&n.to_string()),
        Value::String(s) => parse_amount_str(s),
        _ => Decimal::ZERO,
    }
}

pub fn parse_amount_str(raw: &str) -> Decimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .unwrap_or(Decimal::ZERO)
}

/// serde helper for amount fields that may be numbers, strings or null
pub fn lenient<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_amount(&value))
}

/// Like [`lenient`], but keeps a missing or null field as `None`
pub fn lenient_option<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| !v.is_null())
        .map(|v| parse_amount(&v)))
}
