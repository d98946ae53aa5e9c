//! Serde adapters for the loosely typed JSON exports the snapshot files come from.
//!
//! Exported rows encode integers either as JSON numbers or as numeric strings,
//! so the numeric fields of [`crate::models::BidRecord`] accept both and always
//! serialize back to the canonical form (decimal strings for uint256 values,
//! numbers for block-scoped integers).

use alloy_primitives::U256;
use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

/// uint256 <-> decimal string
pub mod u256_decimal {
    use super::*;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(U256::from(n)),
            NumberOrString::String(s) => parse_u256(&s).map_err(de::Error::custom),
        }
    }
}

/// u64 that may arrive as a number or a numeric string
pub mod flex_u64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|e| de::Error::custom(format!("invalid integer {s:?}: {e}"))),
        }
    }
}

pub mod flex_u64_opt {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        match Option::<NumberOrString>::deserialize(deserializer)? {
            None => Ok(None),
            Some(NumberOrString::Number(n)) => Ok(Some(n)),
            Some(NumberOrString::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|e| de::Error::custom(format!("invalid integer {s:?}: {e}"))),
        }
    }
}

pub mod flex_u8 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let wide = super::flex_u64::deserialize(deserializer)?;
        u8::try_from(wide).map_err(|_| de::Error::custom(format!("{wide} does not fit in a u8")))
    }
}

/// Only plain base-10 digits are accepted; amounts are never hex in the exports.
pub fn parse_u256(input: &str) -> Result<U256, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid uint256 {input:?}"));
    }
    U256::from_str_radix(trimmed, 10).map_err(|e| format!("invalid uint256 {input:?}: {e}"))
}
