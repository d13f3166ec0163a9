// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exact signed fractions used for every timestamp in the engine.
//!
//! A [`Rational`] is always stored in lowest terms with a positive
//! denominator, so the derived `Eq` and `Hash` are exact. Two sentinels,
//! [`Rational::MIN`] and [`Rational::MAX`], stand in for unbounded range
//! endpoints and absorb finite operands in arithmetic.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Errors produced by rational construction and arithmetic
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RationalError {
    /// A fraction was built with a zero denominator
    #[error("Denominator must not be zero")]
    ZeroDenominator,

    /// Division by a zero rational
    #[error("Division by zero")]
    DivisionByZero,

    /// Text could not be parsed as `num/den` or `num`
    #[error("Invalid rational: {0}")]
    Parse(String),
}

/// Exact fraction of two integers
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(i64, i64)", into = "(i64, i64)")]
pub struct Rational {
    num: i64,
    den: i64,
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Rational {
    /// Zero
    pub const ZERO: Rational = Rational { num: 0, den: 1 };

    /// One
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Lower sentinel, used as the start of an unbounded range
    pub const MIN: Rational = Rational { num: -i64::MAX, den: 1 };

    /// Upper sentinel, used as the end of an unbounded range
    pub const MAX: Rational = Rational { num: i64::MAX, den: 1 };

    /// Create a fraction, reducing it to lowest terms
    pub fn new(num: i64, den: i64) -> Result<Self, RationalError> {
        if den == 0 {
            return Err(RationalError::ZeroDenominator);
        }
        Ok(Self::reduce(i128::from(num), i128::from(den)))
    }

    /// Create a whole-number rational, saturating `i64::MIN` to [`Rational::MIN`]
    pub const fn from_integer(value: i64) -> Self {
        if value == i64::MIN {
            Self::MIN
        } else {
            Self { num: value, den: 1 }
        }
    }

    /// Reduce an i128 fraction, saturating to the sentinels if it no longer fits
    fn reduce(num: i128, den: i128) -> Self {
        debug_assert!(den != 0);
        let (mut num, mut den) = if den < 0 { (-num, -den) } else { (num, den) };
        let g = gcd(num, den);
        if g > 1 {
            num /= g;
            den /= g;
        }

        match (i64::try_from(num), i64::try_from(den)) {
            (Ok(n), Ok(d)) if n > Self::MIN.num && n < Self::MAX.num => Self { num: n, den: d },
            _ => {
                if num >= 0 {
                    Self::MAX
                } else {
                    Self::MIN
                }
            }
        }
    }

    /// Numerator in lowest terms
    pub const fn numerator(&self) -> i64 {
        self.num
    }

    /// Denominator in lowest terms, always positive
    pub const fn denominator(&self) -> i64 {
        self.den
    }

    /// Whether this is zero
    pub const fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// Whether this is one of the unbounded sentinels
    pub fn is_infinite(&self) -> bool {
        *self == Self::MIN || *self == Self::MAX
    }

    /// Whether this is strictly negative
    pub const fn is_negative(&self) -> bool {
        self.num < 0
    }

    /// Absolute value
    pub fn abs(self) -> Self {
        if self.is_negative() {
            -self
        } else {
            self
        }
    }

    /// Reciprocal, failing for zero
    pub fn flipped(self) -> Result<Self, RationalError> {
        Self::ONE.checked_div(self)
    }

    /// Lossy conversion for display and interpolation
    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Division that reports a zero divisor instead of panicking
    pub fn checked_div(self, rhs: Rational) -> Result<Self, RationalError> {
        if rhs.is_zero() {
            return Err(RationalError::DivisionByZero);
        }

        match (self.is_infinite(), rhs.is_infinite()) {
            (false, false) => Ok(Self::reduce(
                i128::from(self.num) * i128::from(rhs.den),
                i128::from(self.den) * i128::from(rhs.num),
            )),
            (false, true) => Ok(Self::ZERO),
            (true, _) => Ok(Self::infinity_with_sign(self.signum() * rhs.signum())),
        }
    }

    /// Convert to an integer timestamp in units of `timebase`, rounding down
    pub fn to_timestamp(self, timebase: Rational) -> Result<i64, RationalError> {
        let units = self.checked_div(timebase)?;
        Ok(units.num.div_euclid(units.den))
    }

    /// Convert an integer timestamp in units of `timebase` back to time
    pub fn from_timestamp(timestamp: i64, timebase: Rational) -> Self {
        Self::from_integer(timestamp) * timebase
    }

    fn signum(&self) -> i64 {
        self.num.signum()
    }

    fn infinity_with_sign(sign: i64) -> Self {
        match sign.cmp(&0) {
            Ordering::Less => Self::MIN,
            Ordering::Equal => Self::ZERO,
            Ordering::Greater => Self::MAX,
        }
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}

impl TryFrom<(i64, i64)> for Rational {
    type Error = RationalError;

    fn try_from((num, den): (i64, i64)) -> Result<Self, Self::Error> {
        Self::new(num, den)
    }
}

impl From<Rational> for (i64, i64) {
    fn from(value: Rational) -> Self {
        (value.num, value.den)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = i128::from(self.num) * i128::from(other.den);
        let rhs = i128::from(other.num) * i128::from(self.den);
        lhs.cmp(&rhs)
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational {
            num: -self.num,
            den: self.den,
        }
    }
}

impl Add for Rational {
    type Output = Rational;

    fn add(self, rhs: Rational) -> Rational {
        match (self.is_infinite(), rhs.is_infinite()) {
            (false, false) => Rational::reduce(
                i128::from(self.num) * i128::from(rhs.den) + i128::from(rhs.num) * i128::from(self.den),
                i128::from(self.den) * i128::from(rhs.den),
            ),
            (true, false) => self,
            (false, true) => rhs,
            // MAX + MIN has no meaningful value
            (true, true) if self == rhs => self,
            (true, true) => Rational::ZERO,
        }
    }
}

impl Sub for Rational {
    type Output = Rational;

    fn sub(self, rhs: Rational) -> Rational {
        self + (-rhs)
    }
}

impl Mul for Rational {
    type Output = Rational;

    fn mul(self, rhs: Rational) -> Rational {
        if self.is_infinite() || rhs.is_infinite() {
            return Rational::infinity_with_sign(self.signum() * rhs.signum());
        }

        Rational::reduce(
            i128::from(self.num) * i128::from(rhs.num),
            i128::from(self.den) * i128::from(rhs.den),
        )
    }
}

impl Div for Rational {
    type Output = Rational;

    /// # Panics
    ///
    /// Panics if `rhs` is zero, like integer division. Use
    /// [`Rational::checked_div`] when the divisor is not known to be non-zero.
    fn div(self, rhs: Rational) -> Rational {
        match self.checked_div(rhs) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }
}

impl AddAssign for Rational {
    fn add_assign(&mut self, rhs: Rational) {
        *self = *self + rhs;
    }
}

impl SubAssign for Rational {
    fn sub_assign(&mut self, rhs: Rational) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::MIN {
            f.write_str("Rational::MIN")
        } else if *self == Self::MAX {
            f.write_str("Rational::MAX")
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl FromStr for Rational {
    type Err = RationalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |part: &str| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| RationalError::Parse(s.to_string()))
        };

        match s.split_once('/') {
            Some((num, den)) => Rational::new(parse(num)?, parse(den)?),
            None => Ok(Rational::from_integer(parse(s)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(num: i64, den: i64) -> Rational {
        Rational::new(num, den).unwrap()
    }

    #[test]
    fn test_reduces_to_lowest_terms() {
        let v = r(6, -8);
        assert_eq!(v.numerator(), -3);
        assert_eq!(v.denominator(), 4);
        assert_eq!(r(2, 4), r(1, 2));
    }

    #[test]
    fn test_zero_denominator_rejected() {
        assert_eq!(Rational::new(1, 0), Err(RationalError::ZeroDenominator));
        assert_eq!(r(1, 2).checked_div(Rational::ZERO), Err(RationalError::DivisionByZero));
        assert!(Rational::ZERO.flipped().is_err());
    }

    #[test]
    fn test_arithmetic_is_exact() {
        // 1/3 + 1/6 = 1/2
        assert_eq!(r(1, 3) + r(1, 6), r(1, 2));
        // 1001/30000 frames summed 30000 times is exactly 1001
        let frame = r(1001, 30000);
        let mut t = Rational::ZERO;
        for _ in 0..30000 {
            t += frame;
        }
        assert_eq!(t, Rational::from_integer(1001));
        assert_eq!(r(3, 4) * r(2, 3), r(1, 2));
        assert_eq!(r(3, 4) / r(3, 8), Rational::from_integer(2));
        assert_eq!(r(1, 2) - r(3, 4), r(-1, 4));
    }

    #[test]
    fn test_ordering() {
        assert!(r(1, 3) < r(1, 2));
        assert!(r(-1, 2) < Rational::ZERO);
        assert!(Rational::MIN < r(-1_000_000, 1));
        assert!(Rational::MAX > r(1_000_000, 1));
    }

    #[test]
    fn test_sentinels_absorb_finite_values() {
        assert_eq!(Rational::MAX + r(5, 1), Rational::MAX);
        assert_eq!(r(5, 1) - Rational::MAX, Rational::MIN);
        assert_eq!(Rational::MIN * r(-2, 1), Rational::MAX);
        assert_eq!(Rational::MAX / r(2, 1), Rational::MAX);
        assert_eq!(r(2, 1) / Rational::MAX, Rational::ZERO);
    }

    #[test]
    fn test_smallest_integer_saturates() {
        let min = Rational::from_integer(i64::MIN);
        assert_eq!(min, Rational::MIN);
        assert_eq!(Rational::from(i64::MIN), Rational::MIN);
        assert_eq!(-min, Rational::MAX);
        assert_eq!("-9223372036854775808".parse::<Rational>().unwrap(), Rational::MIN);
    }

    #[test]
    fn test_timestamps() {
        let timebase = r(1, 30);
        assert_eq!(r(1, 2).to_timestamp(timebase).unwrap(), 15);
        // Rounds down, including for negative times
        assert_eq!(r(-1, 45).to_timestamp(timebase).unwrap(), -1);
        assert_eq!(Rational::from_timestamp(15, timebase), r(1, 2));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("30000/1001".parse::<Rational>().unwrap(), r(30000, 1001));
        assert_eq!("-4".parse::<Rational>().unwrap(), Rational::from_integer(-4));
        assert!("1/0".parse::<Rational>().is_err());
        assert!("abc".parse::<Rational>().is_err());
        assert_eq!(r(2, 4).to_string(), "1/2");
        assert_eq!(r(4, 2).to_string(), "2");
    }

    #[test]
    fn test_serialization() {
        let ron_str = ron::to_string(&r(1, 3)).unwrap();
        let loaded: Rational = ron::from_str(&ron_str).unwrap();
        assert_eq!(loaded, r(1, 3));
        assert!(ron::from_str::<Rational>("(1, 0)").is_err());
    }
}
