//! # Monetary Amounts
//!
//! Integer-minor-unit money with currency-safe, checked arithmetic.
//!
//! ## Security Invariant
//!
//! There is no `Add`/`Sub` operator impl on `Money`. All combination goes
//! through `checked_add`/`checked_sub`, which refuse cross-currency
//! operands and overflow instead of wrapping. Purchase-price arithmetic in
//! the agreement validator depends on this: `balance = price - deposit`
//! can never silently mix a GBP deposit into a EUR price.
//!
//! Amounts are unsigned minor units (pence, cents). Fractional amounts and
//! floats never appear; float money is rejected by construction because
//! the field is `u64`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Supported settlement currencies (ISO 4217).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Pound sterling.
    Gbp,
    /// US dollar.
    Usd,
    /// Euro.
    Eur,
}

impl Currency {
    /// The ISO 4217 alphabetic code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gbp => "GBP",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monetary amount in integer minor units of one currency.
///
/// Derives full `Ord` (currency first, then amount) so records holding
/// money can live in ordered sets; *meaningful* comparison and arithmetic
/// are only defined within one currency and go through the checked API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (pence/cents).
    pub minor: u64,
    /// The amount's currency.
    pub currency: Currency,
}

impl Money {
    /// An amount of pounds sterling expressed in pence.
    pub fn gbp(minor: u64) -> Self {
        Self { minor, currency: Currency::Gbp }
    }

    /// An amount of US dollars expressed in cents.
    pub fn usd(minor: u64) -> Self {
        Self { minor, currency: Currency::Usd }
    }

    /// An amount of euros expressed in cents.
    pub fn eur(minor: u64) -> Self {
        Self { minor, currency: Currency::Eur }
    }

    /// Checked addition within one currency.
    ///
    /// # Errors
    ///
    /// `CoreError::CurrencyMismatch` if the currencies differ,
    /// `CoreError::AmountOutOfRange` on overflow.
    pub fn checked_add(&self, other: &Money) -> Result<Money, CoreError> {
        self.require_same_currency(other)?;
        let minor = self.minor.checked_add(other.minor).ok_or_else(|| {
            CoreError::AmountOutOfRange(format!("{self} + {other} overflows"))
        })?;
        Ok(Money { minor, currency: self.currency })
    }

    /// Checked subtraction within one currency.
    ///
    /// # Errors
    ///
    /// `CoreError::CurrencyMismatch` if the currencies differ,
    /// `CoreError::AmountOutOfRange` if `other` exceeds `self`.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, CoreError> {
        self.require_same_currency(other)?;
        let minor = self.minor.checked_sub(other.minor).ok_or_else(|| {
            CoreError::AmountOutOfRange(format!("{self} - {other} underflows"))
        })?;
        Ok(Money { minor, currency: self.currency })
    }

    /// Strict less-than within one currency.
    ///
    /// # Errors
    ///
    /// `CoreError::CurrencyMismatch` if the currencies differ.
    pub fn lt(&self, other: &Money) -> Result<bool, CoreError> {
        self.require_same_currency(other)?;
        Ok(self.minor < other.minor)
    }

    /// Whether both amounts share a currency.
    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), CoreError> {
        if self.currency != other.currency {
            return Err(CoreError::CurrencyMismatch {
                left: self.currency.to_string(),
                right: other.currency.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.minor, self.currency)
    }
}
