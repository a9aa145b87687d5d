//! Small parsing and numeric helpers.

use alloy_primitives::{Address, B256};

use crate::foundation::error::{Result, WardenError};

/// Parses a 32-byte hex value, with or without a `0x` prefix.
pub fn parse_hex_32(input: &str) -> Result<B256> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(stripped)?;
    if bytes.len() != 32 {
        return Err(WardenError::EncodingError(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

/// Parses a 20-byte hex address, with or without a `0x` prefix.
pub fn parse_address(input: &str) -> Result<Address> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(stripped)?;
    if bytes.len() != 20 {
        return Err(WardenError::EncodingError(format!(
            "expected 20-byte address, got {} bytes",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// Parses arbitrary-length hex bytes, with or without a `0x` prefix.
pub fn parse_hex_bytes(input: &str) -> Result<Vec<u8>> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    Ok(hex::decode(stripped)?)
}

/// Linear-interpolation percentile over unsorted samples.
///
/// `pct` is in `[0, 100]`. Returns `None` on an empty slice.
pub fn percentile(samples: &[u128], pct: f64) -> Option<u128> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let rank = pct.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = rank - lo as f64;
    let lo_v = sorted[lo] as f64;
    let hi_v = sorted[hi] as f64;
    Some((lo_v + (hi_v - lo_v) * frac).round() as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_32_accepts_both_prefixes() {
        let with = parse_hex_32(&format!("0x{}", "11".repeat(32))).unwrap();
        let without = parse_hex_32(&"11".repeat(32)).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn parse_hex_32_rejects_wrong_length() {
        assert!(parse_hex_32("0xdead").is_err());
    }

    #[test]
    fn percentile_interpolates() {
        let samples = vec![10u128, 20, 30, 40];
        assert_eq!(percentile(&samples, 0.0), Some(10));
        assert_eq!(percentile(&samples, 100.0), Some(40));
        assert_eq!(percentile(&samples, 50.0), Some(25));
        assert_eq!(percentile(&samples, 25.0), Some(18));
    }

    #[test]
    fn percentile_empty_is_none() {
        assert_eq!(percentile(&[], 50.0), None);
    }
}
