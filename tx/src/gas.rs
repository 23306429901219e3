//! Gas estimation and fee calculation.

use crate::Error;

/// Estimate gas for a payload of `size` encoded bytes: `base + per_byte * size`.
pub fn estimate(size: i64, per_byte: u64, base: u64) -> Result<u64, Error> {
    let size = u64::try_from(size)
        .map_err(|_| Error::Validation(format!("negative payload size: {size}")))?;
    per_byte
        .checked_mul(size)
        .and_then(|gas| gas.checked_add(base))
        .ok_or_else(|| Error::Validation(format!("gas estimate overflows for size {size}")))
}

/// Scale `gas` by `adjustment`, saturating at [u64::MAX].
///
/// Non-positive or non-finite adjustments leave `gas` unchanged.
pub fn adjust(gas: u64, adjustment: f64) -> u64 {
    if !adjustment.is_finite() || adjustment <= 0.0 {
        return gas;
    }
    let scaled = gas as f64 * adjustment;
    if scaled >= u64::MAX as f64 {
        return u64::MAX;
    }
    scaled as u64
}

/// Fee for `gas` at `price`, rounded to the nearest integer amount.
pub fn fee(gas: u64, price: f64) -> Result<u64, Error> {
    if gas == 0 {
        return Err(Error::Validation("gas must be positive".into()));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::Validation(format!("invalid gas price: {price}")));
    }
    let fee = (gas as f64 * price).round();
    if fee >= u64::MAX as f64 {
        return Err(Error::Validation(format!(
            "fee overflows for gas {gas} at price {price}"
        )));
    }
    Ok(fee as u64)
}
