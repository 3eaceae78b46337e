//! Native-currency unit conversion
//!
//! Display amounts ("1.5") and smallest-unit integers (wei) are converted
//! with exact integer arithmetic. Floating point is never involved, so
//! large or long fractional amounts convert without drift.

use alloy_primitives::U256;
use num_bigint::BigUint;
use thiserror::Error;

/// Decimal places between the display unit and the smallest unit.
pub const NATIVE_DECIMALS: u32 = 18;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("Amount too large: {0}")]
    Overflow(String),
}

/// An amount of the native currency, held in its smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct NativeAmount(U256);

impl NativeAmount {
    pub fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    /// Parse a non-negative decimal in display units. Digits beyond the
    /// 18th fractional place are truncated.
    pub fn from_display(input: &str) -> Result<Self, UnitsError> {
        let wei = display_to_wei(input)?;
        Ok(Self(wei))
    }

    pub fn wei(&self) -> U256 {
        self.0
    }
}

impl std::fmt::Display for NativeAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", wei_to_display(self.0))
    }
}

fn scale() -> BigUint {
    BigUint::from(10u32).pow(NATIVE_DECIMALS)
}

/// Convert a display-unit decimal string to wei.
pub fn display_to_wei(input: &str) -> Result<U256, UnitsError> {
    let trimmed = input.trim();
    let invalid = || UnitsError::InvalidAmount(input.to_string());

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(invalid());
    }

    let whole_value = if whole.is_empty() {
        BigUint::default()
    } else {
        BigUint::parse_bytes(whole.as_bytes(), 10).ok_or_else(invalid)?
    };

    // Keep at most 18 fractional digits, right-padded with zeros
    let mut fraction_digits: String = fraction.chars().take(NATIVE_DECIMALS as usize).collect();
    while fraction_digits.len() < NATIVE_DECIMALS as usize {
        fraction_digits.push('0');
    }
    let fraction_value =
        BigUint::parse_bytes(fraction_digits.as_bytes(), 10).ok_or_else(invalid)?;

    let wei = whole_value * scale() + fraction_value;
    biguint_to_u256(&wei)
}

/// Render wei as a display-unit decimal with at least one fractional digit.
pub fn wei_to_display(wei: U256) -> String {
    let value = BigUint::from_bytes_be(&wei.to_be_bytes::<32>());
    let scale = scale();
    let whole = &value / &scale;
    let fraction = &value % &scale;

    let mut fraction_digits = format!("{:0>width$}", fraction.to_str_radix(10), width = NATIVE_DECIMALS as usize);
    while fraction_digits.len() > 1 && fraction_digits.ends_with('0') {
        fraction_digits.pop();
    }

    format!("{}.{}", whole.to_str_radix(10), fraction_digits)
}

fn biguint_to_u256(value: &BigUint) -> Result<U256, UnitsError> {
    let bytes = value.to_bytes_be();
    U256::try_from_be_slice(&bytes).ok_or_else(|| UnitsError::Overflow(value.to_str_radix(10)))
}
