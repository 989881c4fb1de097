//! Integer helpers for product-preserving swap math and price encoding.
//!
//! All amount arithmetic widens to [`U512`] so that `reserve * reserve`
//! scale products never wrap. Division is truncating; callers apply the
//! one-unit nudges that keep rounding in the pool's favor.

use alloy_primitives::{U256, U512};

/// Decimal places carried by [`Price`].
pub const PRICE_DECIMALS: usize = 18;

const PRICE_SCALE_U64: u64 = 1_000_000_000_000_000_000;

/// 10^18 as the price fixed-point scale.
pub fn price_scale() -> U512 {
    U512::from(PRICE_SCALE_U64)
}

/// Widens a `U256` into a `U512`.
#[inline]
pub fn widen(value: U256) -> U512 {
    U512::from(value)
}

/// Narrows a `U512` back to `U256`, or `None` when it does not fit.
pub fn narrow(value: U512) -> Option<U256> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|limb| *limb != 0) {
        return None;
    }
    Some(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// `a * b / den`, truncating. `None` when `den` is zero or the quotient
/// does not fit a `U256`.
pub fn mul_div(a: U256, b: U256, den: U256) -> Option<U256> {
    if den.is_zero() {
        return None;
    }
    narrow(widen(a) * widen(b) / widen(den))
}

/// `a * b / den`, rounding up.
pub fn mul_div_ceil(a: U256, b: U256, den: U256) -> Option<U256> {
    if den.is_zero() {
        return None;
    }
    let num = widen(a) * widen(b);
    let den = widen(den);
    let mut quo = num / den;
    if num % den != U512::ZERO {
        quo += U512::from(1u64);
    }
    narrow(quo)
}

/// Integer square root by Newton iteration.
pub fn isqrt(x: U512) -> U512 {
    if x.is_zero() {
        return U512::ZERO;
    }
    let one = U512::from(1u64);
    let mut z = (x + one) >> 1;
    let mut y = x;
    while z < y {
        y = z;
        z = (x / z + z) >> 1;
    }
    y
}

/// A non-negative rational captured as a fixed-point decimal with 18
/// fractional digits. Used for marginal prices and order sort prices; the
/// on-disk order index encodes exactly this value, so comparisons on
/// `Price` agree with the lexicographic order of the encoded keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(U512);

impl Price {
    pub const ZERO: Price = Price(U512::ZERO);

    /// `num / den` truncated to 18 decimals. `None` when `den` is zero.
    pub fn from_ratio(num: U256, den: U256) -> Option<Price> {
        if den.is_zero() {
            return None;
        }
        Some(Price(widen(num) * price_scale() / widen(den)))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Raw fixed-point value, scaled by 10^18.
    pub fn raw(&self) -> U512 {
        self.0
    }

    /// Lexicographically sortable byte form: one byte holding the decimal
    /// exponent biased by 128, then the decimal rendering with exactly 18
    /// fractional digits. Within one exponent the integer part has a fixed
    /// digit count, so byte order equals numeric order.
    pub fn to_sort_bytes(&self) -> Vec<u8> {
        let scale = price_scale();
        let int_part = self.0 / scale;
        let frac_part = (self.0 % scale).as_limbs()[0];

        let int_str = int_part.to_string();
        let frac_str = format!("{frac_part:018}");

        let exponent: i32 = if !int_part.is_zero() {
            int_str.len() as i32 - 1
        } else {
            match frac_str.bytes().position(|b| b != b'0') {
                Some(i) => -(i as i32 + 1),
                // zero price; still renders deterministically
                None => -(PRICE_DECIMALS as i32 + 1),
            }
        };

        let mut out = Vec::with_capacity(1 + int_str.len() + 1 + PRICE_DECIMALS);
        out.push((exponent + 128) as u8);
        out.extend_from_slice(int_str.as_bytes());
        out.push(b'.');
        out.extend_from_slice(frac_str.as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(num: u64, den: u64) -> Price {
        Price::from_ratio(U256::from(num), U256::from(den)).unwrap()
    }

    #[test]
    fn narrow_rejects_wide_values() {
        assert_eq!(narrow(widen(U256::MAX)), Some(U256::MAX));
        assert_eq!(narrow(widen(U256::MAX) + U512::from(1u64)), None);
    }

    #[test]
    fn mul_div_truncates_and_ceils() {
        let a = U256::from(7u64);
        let b = U256::from(3u64);
        let den = U256::from(2u64);
        assert_eq!(mul_div(a, b, den), Some(U256::from(10u64)));
        assert_eq!(mul_div_ceil(a, b, den), Some(U256::from(11u64)));
        assert_eq!(mul_div(a, b, U256::ZERO), None);
    }

    #[test]
    fn isqrt_matches_known_roots() {
        assert_eq!(isqrt(U512::ZERO), U512::ZERO);
        assert_eq!(isqrt(U512::from(1u64)), U512::from(1u64));
        assert_eq!(isqrt(U512::from(400_000_000u64)), U512::from(20_000u64));
        assert_eq!(isqrt(U512::from(999_999u64)), U512::from(999u64));
        let big = widen(U256::from(u128::MAX));
        let root = isqrt(big * big);
        assert_eq!(root, big);
    }

    #[test]
    fn price_ordering_matches_byte_ordering() {
        let samples = [
            price(1, 1000),
            price(9, 10),
            price(95, 100),
            price(1, 1),
            price(3, 2),
            price(12, 1),
            price(95, 1),
            price(1234567, 1),
        ];
        for window in samples.windows(2) {
            assert!(window[0] < window[1]);
            assert!(
                window[0].to_sort_bytes() < window[1].to_sort_bytes(),
                "byte order disagrees for {:?} vs {:?}",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn price_encoding_shape() {
        let bytes = price(9, 10).to_sort_bytes();
        // 0.9 has decimal exponent -1
        assert_eq!(bytes[0], 127);
        assert_eq!(&bytes[1..], b"0.900000000000000000");

        let bytes = price(1, 1).to_sort_bytes();
        assert_eq!(bytes[0], 128);
        assert_eq!(&bytes[1..], b"1.000000000000000000");

        let bytes = price(250, 10).to_sort_bytes();
        assert_eq!(bytes[0], 129);
        assert_eq!(&bytes[1..], b"25.000000000000000000");
    }

    #[test]
    fn reciprocal_prices_multiply_to_one() {
        let ab = Price::from_ratio(U256::from(40_000u64), U256::from(10_000u64)).unwrap();
        let ba = Price::from_ratio(U256::from(10_000u64), U256::from(40_000u64)).unwrap();
        let product = ab.raw() * ba.raw() / price_scale();
        assert_eq!(product, price_scale());
    }
}
