use ethers::types::U256;
use rust_decimal::Decimal;

/// Largest power of ten that still fits in a `U256`.
pub const MAX_DECIMALS: u8 = 77;

/// Fixed-point integer to decimal string, using integer arithmetic only.
///
/// Trailing fractional zeros are trimmed and whole numbers carry no fractional
/// part: `to_decimal(2_500_000_000_000_000_000, 18) == "2.5"`,
/// `to_decimal(1000, 3) == "1"`.
pub fn to_decimal(raw: U256, decimals: u8) -> Result<String, ConversionError> {
    if decimals > MAX_DECIMALS {
        return Err(ConversionError::DecimalsOutOfRange(decimals));
    }
    if decimals == 0 {
        return Ok(raw.to_string());
    }

    let (whole, fraction) = raw.div_mod(U256::exp10(decimals as usize));
    if fraction.is_zero() {
        return Ok(whole.to_string());
    }

    let padded = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    Ok(format!("{}.{}", whole, padded.trim_end_matches('0')))
}

/// Decimal string back to its fixed-point integer.
///
/// Fails instead of rounding when `value` has more significant fractional
/// digits than `decimals`.
pub fn to_raw(value: &str, decimals: u8) -> Result<U256, ConversionError> {
    if decimals > MAX_DECIMALS {
        return Err(ConversionError::DecimalsOutOfRange(decimals));
    }

    let trimmed = value.trim();
    if trimmed.starts_with('-') {
        return Err(ConversionError::Negative(trimmed.to_string()));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(ConversionError::InvalidDecimal(trimmed.to_string()));
    }

    let significant = fraction.trim_end_matches('0');
    if significant.len() > decimals as usize {
        return Err(ConversionError::PrecisionLoss {
            value: trimmed.to_string(),
            decimals,
        });
    }

    let digits = format!("{}{:0<width$}", whole, significant, width = decimals as usize);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|_| ConversionError::Overflow)
}

/// Pool time stretch is a 3-decimal fixed point value stored as a plain
/// integer; it is scaled with `Decimal` rather than through [`to_decimal`].
pub fn time_stretch_to_decimal(raw: u64) -> String {
    (Decimal::from(raw) / Decimal::from(1000u32)).normalize().to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),
    #[error("Negative amount: {0}")]
    Negative(String),
    #[error("{value} has more than {decimals} fractional digits")]
    PrecisionLoss { value: String, decimals: u8 },
    #[error("Decimals out of range: {0}")]
    DecimalsOutOfRange(u8),
    #[error("Overflow in conversion")]
    Overflow,
    #[error("Unknown ballot: {0}")]
    UnknownBallot(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn mu_and_time_stretch_scales() {
        let mu = U256::from_dec_str("2500000000000000000").unwrap();
        assert_eq!(to_decimal(mu, 18).unwrap(), "2.5");
        assert_eq!(to_decimal(U256::from(1500u64), 3).unwrap(), "1.5");
        assert_eq!(time_stretch_to_decimal(1500), "1.5");
        assert_eq!(time_stretch_to_decimal(22186), "22.186");
    }

    #[test]
    fn whole_and_zero_values() {
        assert_eq!(to_decimal(U256::zero(), 18).unwrap(), "0");
        assert_eq!(to_decimal(U256::exp10(18), 18).unwrap(), "1");
        assert_eq!(to_decimal(U256::from(7u64), 0).unwrap(), "7");
        assert_eq!(to_decimal(U256::from(5u64), 18).unwrap(), "0.000000000000000005");
        assert_eq!(time_stretch_to_decimal(0), "0");
    }

    #[test]
    fn round_trip_is_exact() {
        let mut rng = rand::thread_rng();
        for decimals in [3u8, 18] {
            for _ in 0..200 {
                let raw = U256::from(rng.gen::<u128>()) * U256::from(rng.gen::<u64>());
                let text = to_decimal(raw, decimals).unwrap();
                assert_eq!(to_raw(&text, decimals).unwrap(), raw, "{} @ {}", text, decimals);
            }
        }
        assert_eq!(to_raw("2.5", 18).unwrap(), U256::from_dec_str("2500000000000000000").unwrap());
        assert_eq!(to_raw("1.5", 3).unwrap(), U256::from(1500u64));
    }

    #[test]
    fn rejects_lossy_and_malformed_input() {
        assert!(matches!(to_raw("1.2345", 3), Err(ConversionError::PrecisionLoss { .. })));
        assert_eq!(to_raw("1.2340000", 3).unwrap(), U256::from(1234u64));
        assert!(matches!(to_raw("-1", 18), Err(ConversionError::Negative(_))));
        assert!(matches!(to_raw("1e18", 18), Err(ConversionError::InvalidDecimal(_))));
        assert!(matches!(to_raw(".", 18), Err(ConversionError::InvalidDecimal(_))));
        assert_eq!(to_raw(".5", 1).unwrap(), U256::from(5u64));
        assert!(matches!(to_decimal(U256::one(), 78), Err(ConversionError::DecimalsOutOfRange(78))));
    }
}
