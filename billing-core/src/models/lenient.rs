//! Deserializers for the loosely typed numbers the remote services return.
//!
//! The billing and catalog APIs encode money and quantities either as JSON
//! numbers or as strings (`"10.50"`, `" 3 "`), sometimes both within the same
//! payload. These helpers accept either form.

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Number(serde_json::Number),
    Text(String),
}

fn parse_decimal<E: de::Error>(raw: Raw) -> Result<Decimal, E> {
    let text = match raw {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s.trim().to_string(),
    };
    if text.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| E::custom(format!("invalid decimal value: {}", text)))
}

/// Decimal from a JSON number or numeric string. Empty strings decode as zero.
pub mod decimal {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        parse_decimal(Raw::deserialize(deserializer)?)
    }
}

/// Like [`decimal`] but tolerates `null` and missing fields.
pub mod optional_decimal {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Raw>::deserialize(deserializer)? {
            Some(raw) => parse_decimal(raw).map(Some),
            None => Ok(None),
        }
    }
}

/// Integer from a JSON number or numeric string; fractional parts are truncated.
pub mod integer {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = parse_decimal::<D::Error>(Raw::deserialize(deserializer)?)?;
        value
            .trunc()
            .to_i64()
            .ok_or_else(|| de::Error::custom(format!("integer out of range: {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(with = "decimal")]
        amount: Decimal,
        #[serde(default, with = "optional_decimal")]
        cost: Option<Decimal>,
        #[serde(with = "integer")]
        stock: i64,
    }

    #[test]
    fn test_accepts_strings_and_numbers() {
        let a: Sample =
            serde_json::from_str(r#"{"amount": "10.50", "cost": 4.25, "stock": "7"}"#).unwrap();
        assert_eq!(a.amount, Decimal::new(1050, 2));
        assert_eq!(a.cost, Some(Decimal::new(425, 2)));
        assert_eq!(a.stock, 7);

        let b: Sample = serde_json::from_str(r#"{"amount": 3, "stock": 12.0}"#).unwrap();
        assert_eq!(b.amount, Decimal::from(3));
        assert_eq!(b.cost, None);
        assert_eq!(b.stock, 12);
    }

    #[test]
    fn test_rejects_garbage() {
        let result = serde_json::from_str::<Sample>(r#"{"amount": "ten", "stock": 1}"#);
        assert!(result.is_err());
    }
}
