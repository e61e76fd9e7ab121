//! # Money Module
//!
//! Provides the `Amount` type for handling monetary values and quantities
//! exactly.
//!
//! ## Why Decimal, Not Cents?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Feeds arrive from many POS providers in many currencies. Minor-unit   │
//! │  scale differs (PKR 2, JPY 0, KWD 3), so a fixed "cents" integer       │
//! │  cannot hold every feed losslessly.                                    │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal::Decimal (96-bit mantissa + scale)         │
//! │    "2400.00" stays "2400.00" from JSON → SQLite TEXT → JSON            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Storage
//! With the `sqlx` feature, `Amount` binds and decodes as SQLite `TEXT`
//! holding the canonical decimal string. `NUMERIC` affinity is never used:
//! SQLite would coerce "2400.00" to the integer 2400 and drop the scale.
//!
//! ## Usage
//! ```rust
//! use opsledger_core::money::Amount;
//!
//! let gross: Amount = "2500.00".parse().unwrap();
//! let discount = Amount::new(10000, 2);
//! assert_eq!(gross - discount, Amount::new(240000, 2));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

// =============================================================================
// Amount Type
// =============================================================================

/// An exact decimal value: a ticket total, a payment, a payout, or a quantity.
///
/// Serializes as a JSON string (`"2400.00"`) and accepts either strings or
/// numbers on input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

/// Line-item quantities share the exact representation of amounts.
pub type Quantity = Amount;

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Creates an amount from a mantissa and a scale.
    ///
    /// ## Example
    /// ```rust
    /// use opsledger_core::money::Amount;
    ///
    /// assert_eq!(Amount::new(240000, 2).to_string(), "2400.00");
    /// ```
    #[inline]
    pub fn new(mantissa: i64, scale: u32) -> Self {
        Amount(Decimal::new(mantissa, scale))
    }

    /// Wraps an existing decimal.
    #[inline]
    pub const fn from_decimal(value: Decimal) -> Self {
        Amount(value)
    }

    /// Returns the underlying decimal.
    #[inline]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns true if the value is exactly zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is below zero.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Amount)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount(value)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount(Decimal::from(value))
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

impl Add for Amount {
    type Output = Amount;

    #[inline]
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    #[inline]
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    #[inline]
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, x| acc + x)
    }
}

// =============================================================================
// Ticket Totals
// =============================================================================

/// The four top-level monetary figures a POS reports for a ticket.
///
/// ## Relationship
/// ```text
///   gross = net + discount + tax
/// ```
/// Ingestion stores the caller's figures as given. [`TicketTotals::reconciles`]
/// exists so callers and tests can check the relationship without the
/// orchestrator enforcing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketTotals {
    pub gross: Amount,
    pub discount: Amount,
    pub tax: Amount,
    pub net: Amount,
}

impl TicketTotals {
    /// Returns true when `gross == net + discount + tax`.
    pub fn reconciles(&self) -> bool {
        self.drift().is_zero()
    }

    /// `gross - (net + discount + tax)`; zero for a consistent ticket.
    pub fn drift(&self) -> Amount {
        self.gross - (self.net + self.discount + self.tax)
    }
}

// =============================================================================
// SQLite Encoding
// =============================================================================

#[cfg(feature = "sqlx")]
mod sqlite {
    use super::Amount;
    use rust_decimal::Decimal;
    use sqlx::encode::IsNull;
    use sqlx::error::BoxDynError;
    use sqlx::sqlite::{Sqlite, SqliteTypeInfo};
    use sqlx::{Database, Decode, Encode, Type};
    use std::str::FromStr;

    impl Type<Sqlite> for Amount {
        fn type_info() -> SqliteTypeInfo {
            <str as Type<Sqlite>>::type_info()
        }

        fn compatible(ty: &SqliteTypeInfo) -> bool {
            <str as Type<Sqlite>>::compatible(ty)
        }
    }

    impl<'q> Encode<'q, Sqlite> for Amount {
        fn encode_by_ref(
            &self,
            buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
        ) -> Result<IsNull, BoxDynError> {
            <String as Encode<'q, Sqlite>>::encode(self.0.to_string(), buf)
        }
    }

    impl<'r> Decode<'r, Sqlite> for Amount {
        fn decode(value: <Sqlite as Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
            let text = <&str as Decode<'r, Sqlite>>::decode(value)?;
            Ok(Amount(Decimal::from_str(text)?))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_is_preserved_through_display() {
        let amount: Amount = "2400.00".parse().unwrap();
        assert_eq!(amount.to_string(), "2400.00");
    }

    #[test]
    fn test_equality_ignores_scale() {
        let a: Amount = "2400.00".parse().unwrap();
        let b: Amount = "2400".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sum_is_exact() {
        let parts: Vec<Amount> = ["0.1", "0.2"].iter().map(|s| s.parse().unwrap()).collect();
        let total: Amount = parts.into_iter().sum();
        assert_eq!(total, Amount::new(3, 1));
    }

    #[test]
    fn test_json_accepts_numbers_and_strings() {
        let from_number: Amount = serde_json::from_str("2400.0").unwrap();
        let from_string: Amount = serde_json::from_str("\"2400.00\"").unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(serde_json::to_string(&from_string).unwrap(), "\"2400.00\"");
    }

    #[test]
    fn test_ticket_totals_reconcile() {
        let totals = TicketTotals {
            gross: Amount::new(250000, 2),
            discount: Amount::new(10000, 2),
            tax: Amount::ZERO,
            net: Amount::new(240000, 2),
        };
        assert!(totals.reconciles());

        let off = TicketTotals {
            net: Amount::new(239999, 2),
            ..totals
        };
        assert!(!off.reconciles());
        assert_eq!(off.drift(), Amount::new(1, 2));
    }

    #[test]
    fn test_negative_detection() {
        assert!(Amount::new(-5, 0).is_negative());
        assert!(!Amount::ZERO.is_negative());
    }
}
