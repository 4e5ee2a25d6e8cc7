//! Overflow-aware fixed-point helpers for price and collateral arithmetic.

/// One whole in basis points.
pub const BIPS: u128 = 10_000;

/// Ratio reported when nothing is backed: no liquidation risk.
pub const MAX_RATIO_BIPS: u128 = 10_000_000_000;

/// `a * b / c`, rounded down, with a 256-bit intermediate product.
///
/// Returns `None` when `c` is zero or the quotient does not fit in u128.
pub fn mul_div(a: u128, b: u128, c: u128) -> Option<u128> {
    if c == 0 {
        return None;
    }
    let (hi, lo) = widening_mul(a, b);
    if hi == 0 {
        return Some(lo / c);
    }
    if hi >= c {
        return None;
    }
    // Restoring long division of (hi, lo) by c; rem < c holds throughout.
    let mut rem = hi;
    let mut quot: u128 = 0;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        quot <<= 1;
        if carry == 1 || rem >= c {
            rem = rem.wrapping_sub(c);
            quot |= 1;
        }
    }
    Some(quot)
}

fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    let mask = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & mask);
    let (b_hi, b_lo) = (b >> 64, b & mask);
    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;
    let mid = (ll >> 64) + (lh & mask) + (hl & mask);
    let lo = (ll & mask) | ((mid & mask) << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// `10^exp`, or `None` past u128.
pub fn pow10(exp: u32) -> Option<u128> {
    10u128.checked_pow(exp)
}

/// Scale `value` by `10^exp` where `exp` may be negative.
pub fn scale_pow10(value: u128, exp: i64) -> Option<u128> {
    if exp >= 0 {
        value.checked_mul(pow10(u32::try_from(exp).ok()?)?)
    } else {
        let divisor = pow10(u32::try_from(-exp).ok()?)?;
        Some(value / divisor)
    }
}
