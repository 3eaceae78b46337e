//! Address parsing and rendering
//!
//! Addresses are rendered in EIP-55 mixed-case checksum form. Input in a
//! single case is accepted as-is; mixed-case input must carry a valid
//! checksum so that a mistyped character is caught before funds move.

use alloy_primitives::Address;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address: {0}")]
    Invalid(String),

    #[error("Address checksum mismatch: {0}")]
    BadChecksum(String),
}

/// Parse a user-supplied address.
pub fn parse_address(input: &str) -> Result<Address, AddressError> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressError::Invalid(input.to_string()));
    }

    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());

    if has_upper && has_lower {
        let prefixed = format!("0x{}", digits);
        return Address::parse_checksummed(&prefixed, None)
            .map_err(|_| AddressError::BadChecksum(input.to_string()));
    }

    Address::from_str(digits).map_err(|_| AddressError::Invalid(input.to_string()))
}

/// Checksummed `0x`-prefixed form.
pub fn to_checksum(address: &Address) -> String {
    address.to_checksum(None)
}
