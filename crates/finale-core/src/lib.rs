pub mod error;
pub mod models;
pub mod serde_utils;
pub mod snapshot;

use std::sync::LazyLock;

use alloy_primitives::Address;
use regex::Regex;

use crate::error::*;

static ADDRESS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("static regex is valid"));

/// Strict address parsing used at external boundaries (HTTP paths, CLI flags).
/// Checksums are not enforced, any casing is accepted.
pub fn parse_address(input: &str) -> Result<Address> {
    if !ADDRESS_PATTERN.is_match(input) {
        return InvalidAddress {
            input: input.to_string(),
        }
        .fail();
    }
    let bytes = alloy_primitives::hex::decode(&input[2..]).map_err(|_| {
        InvalidAddress {
            input: input.to_string(),
        }
        .build()
    })?;
    Ok(Address::from_slice(&bytes))
}
