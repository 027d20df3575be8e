use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

const BASIS_POINTS_PER_UNIT: i128 = 10_000;

/// Monetary amount in minor units (cents). Serialized as a bare integer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Applies a rate, rounding half away from zero to the nearest cent.
    pub fn apply(self, rate: BasisPoints) -> Money {
        let product = self.0 as i128 * rate.0 as i128;
        let mut quotient = product / BASIS_POINTS_PER_UNIT;
        let remainder = product % BASIS_POINTS_PER_UNIT;
        if remainder.abs() * 2 >= BASIS_POINTS_PER_UNIT {
            quotient += product.signum();
        }
        Money(quotient as i64)
    }

    /// Applies a rate and truncates toward zero. Used for milestone splits where the
    /// remainder is carried into the final installment.
    pub fn portion(self, rate: BasisPoints) -> Money {
        let product = self.0 as i128 * rate.0 as i128;
        Money((product / BASIS_POINTS_PER_UNIT) as i64)
    }

    pub fn times(self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(quantity as i64))
    }

    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, value| acc + value)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        let whole = (cents / 100).to_string();

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (index, digit) in whole.chars().enumerate() {
            if index > 0 && (whole.len() - index) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(digit);
        }

        write!(f, "{sign}${grouped}.{:02}", cents % 100)
    }
}

/// Signed rate in hundredths of a percent (1500 = 15%).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisPoints(i32);

impl BasisPoints {
    pub const fn new(bps: i32) -> Self {
        Self(bps)
    }

    pub const fn percent(percent: i32) -> Self {
        Self(percent * 100)
    }

    pub const fn value(self) -> i32 {
        self.0
    }

    pub fn as_fraction(self) -> f64 {
        self.0 as f64 / BASIS_POINTS_PER_UNIT as f64
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let value = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}%", value / 100, value % 100)
    }
}
