//! Type-safe price representation using decimal arithmetic.
//!
//! All amounts are Korean won. The won has no minor unit, so results of
//! percentage arithmetic are truncated to whole won with [`Price::floor`].
//!
//! Arithmetic saturates at the bounds of [`Decimal`] instead of panicking.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount of money in won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero won.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest amount, in won, a stored cart line may carry.
    pub const MAX_WON: i64 = 1_000_000_000_000_000;

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of won.
    #[must_use]
    pub fn won(amount: i64) -> Self {
        Self(Decimal::from(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Truncate to whole won.
    #[must_use]
    pub fn floor(self) -> Self {
        Self(self.0.floor())
    }

    /// Subtract, clamping at zero.
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - rhs.0)
        }
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.checked_add(rhs.0).unwrap_or_else(|| bound(rhs.0)))
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.checked_sub(rhs.0).unwrap_or_else(|| bound(-rhs.0)))
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        Self(self.0.checked_mul(Decimal::from(rhs)).unwrap_or_else(|| bound(self.0)))
    }
}

/// The [`Decimal`] bound an overflow in the direction of `toward` hits.
fn bound(toward: Decimal) -> Decimal {
    if toward.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Formats as `₩12,500` (grouped thousands, fraction kept only if present).
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let normalized = self.0.normalize();
        let text = normalized.abs().to_string();
        let (whole, fraction) = text.split_once('.').map_or((text.as_str(), None), |(w, r)| (w, Some(r)));

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        if normalized.is_sign_negative() && !normalized.is_zero() {
            f.write_str("-")?;
        }
        write!(f, "₩{grouped}")?;
        if let Some(fraction) = fraction {
            write!(f, ".{fraction}")?;
        }
        Ok(())
    }
}
