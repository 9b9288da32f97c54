//! Swap math for linear pools pairing a main asset with its yield bearing
//! wrapped version, plus the pool's own (phantom) pool token.
//!
//! The main balance is priced through a fee band: balances below the lower
//! target or above the upper target accrue a fee proportional to the distance
//! from the band, balances inside the band pass through unchanged. Fees are
//! always rounded down, in both the real to nominal and the nominal to real
//! direction, so the conversion stays consistent.

use crate::{error::Error, fixed_point::Bfp};

/// Static pricing parameters of a linear pool.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Params {
    /// Fee accrued outside the target band.
    pub fee: Bfp,
    /// Exchange rate between the wrapped and the main asset.
    pub rate: Bfp,
    pub lower_target: Bfp,
    pub upper_target: Bfp,
}

pub fn calc_bpt_out_per_main_in(
    main_in: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount out, so we round down overall.
    if bpt_supply.is_zero() {
        return to_nominal(main_in, params);
    }

    let previous_nominal_main = to_nominal(main_balance, params)?;
    let after_nominal_main = to_nominal(main_balance.add(main_in)?, params)?;
    let delta_nominal_main = after_nominal_main.sub(previous_nominal_main)?;
    let invariant = calc_invariant_up(previous_nominal_main, wrapped_balance, params)?;
    bpt_supply.mul_down(delta_nominal_main)?.div_down(invariant)
}

pub fn calc_bpt_in_per_main_out(
    main_out: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount in, so we round up overall.
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let after_nominal_main = to_nominal(main_balance.sub(main_out)?, params)?;
    let delta_nominal_main = previous_nominal_main.sub(after_nominal_main)?;
    let invariant = calc_invariant_down(previous_nominal_main, wrapped_balance, params)?;
    bpt_supply.mul_up(delta_nominal_main)?.div_up(invariant)
}

pub fn calc_wrapped_out_per_main_in(
    main_in: Bfp,
    main_balance: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount out, so we round down overall.
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let after_nominal_main = to_nominal(main_balance.add(main_in)?, params)?;
    let delta_nominal_main = after_nominal_main.sub(previous_nominal_main)?;
    delta_nominal_main.div_down(params.rate)
}

pub fn calc_wrapped_in_per_main_out(
    main_out: Bfp,
    main_balance: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount in, so we round up overall.
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let after_nominal_main = to_nominal(main_balance.sub(main_out)?, params)?;
    let delta_nominal_main = previous_nominal_main.sub(after_nominal_main)?;
    delta_nominal_main.div_up(params.rate)
}

pub fn calc_main_in_per_bpt_out(
    bpt_out: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount in, so we round up overall.
    if bpt_supply.is_zero() {
        return from_nominal(bpt_out, params);
    }
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let invariant = calc_invariant_up(previous_nominal_main, wrapped_balance, params)?;
    let delta_nominal_main = invariant.mul_up(bpt_out)?.div_up(bpt_supply)?;
    let after_nominal_main = previous_nominal_main.add(delta_nominal_main)?;
    let new_main_balance = from_nominal(after_nominal_main, params)?;
    new_main_balance.sub(main_balance)
}

pub fn calc_main_out_per_bpt_in(
    bpt_in: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount out, so we round down overall.
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let invariant = calc_invariant_down(previous_nominal_main, wrapped_balance, params)?;
    let delta_nominal_main = invariant.mul_down(bpt_in)?.div_down(bpt_supply)?;
    let after_nominal_main = previous_nominal_main.sub(delta_nominal_main)?;
    let new_main_balance = from_nominal(after_nominal_main, params)?;
    main_balance.sub(new_main_balance)
}

pub fn calc_main_out_per_wrapped_in(
    wrapped_in: Bfp,
    main_balance: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount out, so we round down overall.
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let delta_nominal_main = wrapped_in.mul_down(params.rate)?;
    let after_nominal_main = previous_nominal_main.sub(delta_nominal_main)?;
    let new_main_balance = from_nominal(after_nominal_main, params)?;
    main_balance.sub(new_main_balance)
}

pub fn calc_main_in_per_wrapped_out(
    wrapped_out: Bfp,
    main_balance: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount in, so we round up overall.
    let previous_nominal_main = to_nominal(main_balance, params)?;
    let delta_nominal_main = wrapped_out.mul_up(params.rate)?;
    let after_nominal_main = previous_nominal_main.add(delta_nominal_main)?;
    let new_main_balance = from_nominal(after_nominal_main, params)?;
    new_main_balance.sub(main_balance)
}

pub fn calc_bpt_out_per_wrapped_in(
    wrapped_in: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount out, so we round down overall.
    if bpt_supply.is_zero() {
        return wrapped_in.mul_down(params.rate);
    }

    let nominal_main = to_nominal(main_balance, params)?;
    let previous_invariant = calc_invariant_up(nominal_main, wrapped_balance, params)?;
    let new_wrapped_balance = wrapped_balance.add(wrapped_in)?;
    let new_invariant = calc_invariant_down(nominal_main, new_wrapped_balance, params)?;
    let new_bpt_balance = bpt_supply.mul_down(new_invariant)?.div_down(previous_invariant)?;
    new_bpt_balance.sub(bpt_supply)
}

pub fn calc_bpt_in_per_wrapped_out(
    wrapped_out: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount in, so we round up overall.
    let nominal_main = to_nominal(main_balance, params)?;
    let previous_invariant = calc_invariant_up(nominal_main, wrapped_balance, params)?;
    let new_wrapped_balance = wrapped_balance.sub(wrapped_out)?;
    let new_invariant = calc_invariant_down(nominal_main, new_wrapped_balance, params)?;
    let new_bpt_balance = bpt_supply.mul_down(new_invariant)?.div_down(previous_invariant)?;
    bpt_supply.sub(new_bpt_balance)
}

pub fn calc_wrapped_in_per_bpt_out(
    bpt_out: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount in, so we round up overall.
    if bpt_supply.is_zero() {
        return bpt_out.div_up(params.rate);
    }

    let nominal_main = to_nominal(main_balance, params)?;
    let previous_invariant = calc_invariant_up(nominal_main, wrapped_balance, params)?;
    let new_bpt_balance = bpt_supply.add(bpt_out)?;
    let new_wrapped_balance = new_bpt_balance
        .div_up(bpt_supply)?
        .mul_up(previous_invariant)?
        .sub(nominal_main)?
        .div_up(params.rate)?;
    new_wrapped_balance.sub(wrapped_balance)
}

pub fn calc_wrapped_out_per_bpt_in(
    bpt_in: Bfp,
    main_balance: Bfp,
    wrapped_balance: Bfp,
    bpt_supply: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    // Amount out, so we round down overall.
    let nominal_main = to_nominal(main_balance, params)?;
    let previous_invariant = calc_invariant_up(nominal_main, wrapped_balance, params)?;
    let new_bpt_balance = bpt_supply.sub(bpt_in)?;
    let new_wrapped_balance = new_bpt_balance
        .div_up(bpt_supply)?
        .mul_up(previous_invariant)?
        .sub(nominal_main)?
        .div_up(params.rate)?;
    wrapped_balance.sub(new_wrapped_balance)
}

fn calc_invariant_up(
    nominal_main_balance: Bfp,
    wrapped_balance: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    nominal_main_balance.add(wrapped_balance.mul_up(params.rate)?)
}

fn calc_invariant_down(
    nominal_main_balance: Bfp,
    wrapped_balance: Bfp,
    params: &Params,
) -> Result<Bfp, Error> {
    nominal_main_balance.add(wrapped_balance.mul_down(params.rate)?)
}

/// Converts a real main balance to its fee adjusted nominal view.
pub fn to_nominal(real: Bfp, params: &Params) -> Result<Bfp, Error> {
    if real < params.lower_target {
        let fees = params.lower_target.sub(real)?.mul_down(params.fee)?;
        real.sub(fees)
    } else if real <= params.upper_target {
        Ok(real)
    } else {
        let fees = real.sub(params.upper_target)?.mul_down(params.fee)?;
        real.sub(fees)
    }
}

/// Converts a nominal balance back to the real main balance. Since
/// `real = nominal + fees`, rounding fees down is rounding real down.
pub fn from_nominal(nominal: Bfp, params: &Params) -> Result<Bfp, Error> {
    if nominal < params.lower_target {
        nominal
            .add(params.fee.mul_down(params.lower_target)?)?
            .div_down(Bfp::one().add(params.fee)?)
    } else if nominal <= params.upper_target {
        Ok(nominal)
    } else {
        nominal
            .sub(params.fee.mul_down(params.upper_target)?)?
            .div_down(Bfp::one().sub(params.fee)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bfp;

    fn params() -> Params {
        Params {
            fee: bfp!("0.01"),
            rate: bfp!("1.0"),
            lower_target: bfp!("1000"),
            upper_target: bfp!("2000"),
        }
    }

    #[test]
    fn nominal_is_identity_inside_the_band() {
        for balance in ["1000", "1500", "2000"] {
            let balance: Bfp = balance.parse().unwrap();
            assert_eq!(to_nominal(balance, &params()).unwrap(), balance);
            assert_eq!(from_nominal(balance, &params()).unwrap(), balance);
        }
    }

    #[test]
    fn fees_accrue_outside_the_band() {
        let p = params();
        // 500 below the lower target: fee = 500 * 1% = 5.
        assert_eq!(to_nominal(bfp!("500"), &p).unwrap(), bfp!("495"));
        // 1000 above the upper target: fee = 1000 * 1% = 10.
        assert_eq!(to_nominal(bfp!("3000"), &p).unwrap(), bfp!("2990"));
    }

    #[test]
    fn fees_grow_with_distance_and_fee_parameter() {
        let p = params();
        let near = bfp!("900").sub(to_nominal(bfp!("900"), &p).unwrap()).unwrap();
        let far = bfp!("500").sub(to_nominal(bfp!("500"), &p).unwrap()).unwrap();
        assert!(far > near);

        let steep = Params { fee: bfp!("0.02"), ..p };
        let steeper = bfp!("500").sub(to_nominal(bfp!("500"), &steep).unwrap()).unwrap();
        assert!(steeper > far);
    }

    #[test]
    fn nominal_round_trip_is_idempotent_outside_the_band() {
        let p = params();
        for balance in ["250", "500", "2500", "10000"] {
            let balance: Bfp = balance.parse().unwrap();
            let nominal = to_nominal(balance, &p).unwrap();
            assert!(nominal < balance);
            let real = from_nominal(nominal, &p).unwrap();
            // Within a wei of the original; converting again changes nothing
            // beyond that wei.
            let diff = balance.sub(real).unwrap_or_else(|_| real.sub(balance).unwrap());
            assert!(diff <= Bfp::from_wei(1.into()), "{balance} -> {nominal} -> {real}");
            let again = to_nominal(real, &p).unwrap();
            let drift = nominal.sub(again).unwrap_or_else(|_| again.sub(nominal).unwrap());
            assert!(drift <= Bfp::from_wei(1.into()));
        }
    }

    #[test]
    fn bootstrap_deposit_mints_the_nominal_amount() {
        let p = params();
        let minted =
            calc_bpt_out_per_main_in(bfp!("500"), Bfp::zero(), Bfp::zero(), Bfp::zero(), &p)
                .unwrap();
        assert_eq!(minted, to_nominal(bfp!("500"), &p).unwrap());
    }

    #[test]
    fn main_wrapped_round_trip_never_favors_the_trader() {
        let p = Params { rate: bfp!("1.1"), ..params() };
        let main_balance = bfp!("1500");
        for amount in ["1", "50", "700"] {
            let amount: Bfp = amount.parse().unwrap();
            let wrapped = calc_wrapped_out_per_main_in(amount, main_balance, &p).unwrap();
            let required = calc_main_in_per_wrapped_out(wrapped, main_balance, &p).unwrap();
            // The raw math is exact up to a couple of wei; the strict "pay at
            // least as much back" guarantee holds once the pool level fee is
            // applied on top.
            assert!(
                required.add(Bfp::from_wei(2.into())).unwrap() >= amount,
                "{required} < {amount}",
            );
        }
    }

    #[test]
    fn draining_more_main_than_available_is_a_domain_error() {
        let p = params();
        assert!(calc_wrapped_in_per_main_out(bfp!("2000"), bfp!("1500"), &p).is_err());
    }
}
