//! 18-decimal fixed point arithmetic mirroring the on-chain `FixedPoint`
//! library used by the pools this router simulates.
//!
//! Every multiply and divide exists in a round-down and a round-up variant.
//! The invariant callers must uphold: amounts a trader receives are computed
//! with the round-down variants, amounts a trader has to pay with the
//! round-up variants. Picking the wrong variant makes the simulation diverge
//! from settlement by a wei, which is enough to produce unexecutable routes.

pub mod power;

use crate::error::Error;
use anyhow::{Context, Result, anyhow, ensure};
use primitive_types::U256;
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

/// A fixed point number with 18 decimals of precision backed by a `U256`.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bfp(U256);

/// The number of decimals used by [`Bfp`].
const DECIMALS: u8 = 18;

/// Upper bound on the relative error of [`Bfp::pow_up`] and
/// [`Bfp::pow_down`], expressed in wei (10^(-14)).
const MAX_POW_RELATIVE_ERROR: Bfp = Bfp(U256([10_000, 0, 0, 0]));

lazy_static::lazy_static! {
    static ref ONE_18: U256 = U256::exp10(DECIMALS as usize);
}

impl Bfp {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn one() -> Self {
        Self(*ONE_18)
    }

    pub fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    pub fn as_uint256(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn add(self, other: Self) -> Result<Self, Error> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(Error::AddOverflow)
    }

    pub fn sub(self, other: Self) -> Result<Self, Error> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(Error::SubOverflow)
    }

    pub fn mul_down(self, other: Self) -> Result<Self, Error> {
        let product = self.0.checked_mul(other.0).ok_or(Error::MulOverflow)?;
        Ok(Self(product / *ONE_18))
    }

    pub fn mul_up(self, other: Self) -> Result<Self, Error> {
        let product = self.0.checked_mul(other.0).ok_or(Error::MulOverflow)?;
        if product.is_zero() {
            return Ok(Self::zero());
        }
        Ok(Self((product - 1) / *ONE_18 + 1))
    }

    pub fn div_down(self, other: Self) -> Result<Self, Error> {
        if other.0.is_zero() {
            return Err(Error::ZeroDivision);
        }
        let inflated = self.0.checked_mul(*ONE_18).ok_or(Error::MulOverflow)?;
        Ok(Self(inflated / other.0))
    }

    pub fn div_up(self, other: Self) -> Result<Self, Error> {
        if other.0.is_zero() {
            return Err(Error::ZeroDivision);
        }
        if self.0.is_zero() {
            return Ok(Self::zero());
        }
        let inflated = self.0.checked_mul(*ONE_18).ok_or(Error::MulOverflow)?;
        Ok(Self((inflated - 1) / other.0 + 1))
    }

    /// `1 - self`, clamped at zero. Used for fee factors.
    pub fn complement(self) -> Self {
        if self.0 >= *ONE_18 {
            Self::zero()
        } else {
            Self(*ONE_18 - self.0)
        }
    }

    /// `self^exponent` rounded down, accounting for the bounded relative
    /// error of the underlying power function.
    pub fn pow_down(self, exponent: Self) -> Result<Self, Error> {
        let raw = Self(power::pow(self.0, exponent.0)?);
        let max_error = raw.mul_up(MAX_POW_RELATIVE_ERROR)?.add(Self(1.into()))?;
        Ok(raw.sub(max_error).unwrap_or_else(|_| Self::zero()))
    }

    /// `self^exponent` rounded up, accounting for the bounded relative error
    /// of the underlying power function.
    pub fn pow_up(self, exponent: Self) -> Result<Self, Error> {
        let raw = Self(power::pow(self.0, exponent.0)?);
        let max_error = raw.mul_up(MAX_POW_RELATIVE_ERROR)?.add(Self(1.into()))?;
        raw.add(max_error)
    }
}

impl Debug for Bfp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Bfp({self})")
    }
}

impl Display for Bfp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let integer = self.0 / *ONE_18;
        let fraction = self.0 % *ONE_18;
        write!(f, "{integer}.{fraction:0>18}")
    }
}

impl FromStr for Bfp {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let mut parts = value.splitn(2, '.');
        let integer = parts.next().expect("splitn yields at least one item");
        let integer = U256::from_dec_str(integer)
            .with_context(|| format!("invalid integer part {integer:?}"))?;
        let fraction = match parts.next() {
            Some(fraction) => {
                ensure!(
                    !fraction.is_empty() && fraction.len() <= DECIMALS as usize,
                    "fractional part must have between 1 and {DECIMALS} digits",
                );
                let padding = U256::exp10(DECIMALS as usize - fraction.len());
                U256::from_dec_str(fraction)
                    .with_context(|| format!("invalid fractional part {fraction:?}"))?
                    * padding
            }
            None => U256::zero(),
        };
        integer
            .checked_mul(*ONE_18)
            .and_then(|wei| wei.checked_add(fraction))
            .map(Self)
            .ok_or_else(|| anyhow!("fixed point value out of range: {value:?}"))
    }
}

/// Shorthand for a [`Bfp`] from a decimal string literal, used in tests.
#[macro_export]
macro_rules! bfp {
    ($value:expr) => {
        $value.parse::<$crate::fixed_point::Bfp>().unwrap()
    };
}
