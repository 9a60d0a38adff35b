//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Prices are stored with exactly two decimals, so every amount is an    │
//! │  integer number of cents:                                               │
//! │    subtotal = quantity × unit_price   (exact)                          │
//! │    total    = Σ subtotal              (exact)                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bodega_core::money::Money;
//!
//! let price = Money::from_cents(1099); // $10.99
//! let subtotal = price.multiply_quantity(3);
//! assert_eq!(subtotal.cents(), 3297);
//! assert_eq!(subtotal.to_string(), "$32.97");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// ## Where Money Is Used
/// ```text
/// Product.price ──► SaleLine.unit_price ──► SaleLine.subtotal
///                                                 │
///                                                 ▼
///                                  Sale.total = Σ subtotal ──► reports
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-currency part (truncated toward zero).
    #[inline]
    pub const fn whole(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the fractional part in cents (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity, saturating at the i64 bounds.
    ///
    /// Use [`Money::checked_multiply_quantity`] where an out-of-range
    /// amount must be rejected rather than clamped.
    ///
    /// ## Example
    /// ```rust
    /// use bodega_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Multiplies money by a quantity. `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use bodega_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(250).checked_multiply_quantity(4), Some(Money::from_cents(1000)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_multiply_quantity(2), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts. `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Parses a decimal amount as typed into a form ("12", "12.5", "1,250.00").
    ///
    /// ## Rules
    /// - Thousands separators (`,`) and a leading `$` are ignored
    /// - At most two fractional digits
    /// - Negative amounts are rejected
    ///
    /// ## Example
    /// ```rust
    /// use bodega_core::money::Money;
    ///
    /// assert_eq!(Money::parse("12.5").unwrap().cents(), 1250);
    /// assert!(Money::parse("12.345").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Money, ValidationError> {
        let cleaned: String = input
            .trim()
            .trim_start_matches('$')
            .chars()
            .filter(|c| *c != ',')
            .collect();

        if cleaned.is_empty() {
            return Err(ValidationError::required("price"));
        }

        let (whole, fraction) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };

        let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction) {
            return Err(ValidationError::invalid_format("price", "not a decimal amount"));
        }
        if fraction.len() > 2 {
            return Err(ValidationError::invalid_format(
                "price",
                "at most 2 decimal places",
            ));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| ValidationError::invalid_format("price", "amount too large"))?
        };
        let fraction: i64 = format!("{:0<2}", fraction)
            .parse()
            .map_err(|_| ValidationError::invalid_format("price", "not a decimal amount"))?;

        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .map(Money)
            .ok_or_else(|| ValidationError::invalid_format("price", "amount too large"))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display follows the receipt/report convention: thousands separators,
/// decimals only when the amount is not whole (`$1,234` / `$1,234.50`).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let whole = group_thousands(self.whole().unsigned_abs());
        if self.cents_part() == 0 {
            write!(f, "{}${}", sign, whole)
        } else {
            write!(f, "{}${}.{:02}", sign, whole, self.cents_part())
        }
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
