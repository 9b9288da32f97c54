//! Swap math for weighted (constant power invariant) pools.

use crate::{error::Error, fixed_point::Bfp};
use lazy_static::lazy_static;

lazy_static! {
    /// A pool refuses trades consuming more than 30% of the relevant balance
    /// in a single swap, keeping the power function inside its accurate
    /// domain.
    pub static ref MAX_IN_RATIO: Bfp = "0.3".parse().unwrap();
    pub static ref MAX_OUT_RATIO: Bfp = "0.3".parse().unwrap();
}

/// Iteration bound for the feedback loop in [`calc_in_given_out`].
const MAX_IN_CORRECTIONS: usize = 64;

/// Amount of the out token received for an exact in amount. Rounds down.
pub fn calc_out_given_in(
    balance_in: Bfp,
    weight_in: Bfp,
    balance_out: Bfp,
    weight_out: Bfp,
    amount_in: Bfp,
) -> Result<Bfp, Error> {
    if amount_in > balance_in.mul_down(*MAX_IN_RATIO)? {
        return Err(Error::MaxInRatio);
    }
    out_given_in(balance_in, weight_in, balance_out, weight_out, amount_in)
}

fn out_given_in(
    balance_in: Bfp,
    weight_in: Bfp,
    balance_out: Bfp,
    weight_out: Bfp,
    amount_in: Bfp,
) -> Result<Bfp, Error> {
    let denominator = balance_in.add(amount_in)?;
    let base = balance_in.div_up(denominator)?;
    let exponent = weight_in.div_down(weight_out)?;
    let power = base.pow_up(exponent)?;

    balance_out.mul_down(power.complement())
}

/// Amount of the in token required for an exact out amount. Rounds up.
///
/// The closed form only bounds the power function's error, so the first
/// estimate can come in a hair short of what actually buys `amount_out`. The
/// estimate is checked against the forward direction and raised until it
/// buys strictly more than the requested output, which puts it above every
/// input [`calc_out_given_in`] maps to `amount_out` or less.
pub fn calc_in_given_out(
    balance_in: Bfp,
    weight_in: Bfp,
    balance_out: Bfp,
    weight_out: Bfp,
    amount_out: Bfp,
) -> Result<Bfp, Error> {
    if amount_out > balance_out.mul_down(*MAX_OUT_RATIO)? {
        return Err(Error::MaxOutRatio);
    }

    let base = balance_out.div_up(balance_out.sub(amount_out)?)?;
    let exponent = weight_out.div_up(weight_in)?;
    let power = base.pow_up(exponent)?;
    let mut amount_in = balance_in.mul_up(power.sub(Bfp::one())?)?;

    for _ in 0..MAX_IN_CORRECTIONS {
        let bought = out_given_in(balance_in, weight_in, balance_out, weight_out, amount_in)?;
        if bought > amount_out {
            return Ok(amount_in);
        }
        amount_in = amount_in.add(super::in_amount_correction(amount_in, bought, amount_out)?)?;
    }
    Err(Error::InvariantDidNotConverge)
}
