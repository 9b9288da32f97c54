//! Pool types and the capability contract the routing layers program
//! against.
//!
//! Every supported pool kind answers the same small set of questions: what
//! does a given input buy, what does a given output cost, how much can flow
//! through before the math leaves its domain, what is the instantaneous
//! price after some executed amount, and how deep is the pool for ranking
//! purposes. The path builder, limit estimator and optimizer only ever talk
//! to this interface and never branch on the pool kind themselves.

pub mod linear;
pub mod stable;
pub mod weighted;

use crate::{
    conversions::U256Ext as _,
    error::Error,
    fixed_point::Bfp,
    router::SwapKind,
};
use anyhow::{Context as _, Result, ensure};
use itertools::Itertools as _;
use num::{BigRational, Zero as _};
use primitive_types::{H160, H256, U256};
use std::collections::HashMap;

/// Token amounts are normalized to 18 decimals before any math runs, so a
/// token cannot have more than 18 decimals to begin with.
const MAX_SCALING_EXPONENT: u8 = 18;

/// An immutable, validated collection of pools keyed by id.
///
/// Construction is the only place where configuration problems are fatal;
/// once a snapshot exists, every later failure just narrows the set of
/// usable pools or paths for the request at hand.
pub struct Snapshot {
    pools: HashMap<H256, Pool>,
}

impl Snapshot {
    pub fn try_new(pools: Vec<Pool>) -> Result<Self> {
        let mut map = HashMap::with_capacity(pools.len());
        for pool in pools {
            let id = pool.common.id;
            pool.validate().with_context(|| format!("pool {id:?}"))?;
            ensure!(
                map.insert(id, pool).is_none(),
                "duplicate pool id {id:?}",
            );
        }
        Ok(Self { pools: map })
    }

    pub fn get(&self, id: &H256) -> Option<&Pool> {
        self.pools.get(id)
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }
}

/// A liquidity pool.
#[derive(Clone, Debug)]
pub struct Pool {
    pub common: CommonPoolState,
    pub kind: PoolKind,
}

/// State shared by all pool kinds.
#[derive(Clone, Debug)]
pub struct CommonPoolState {
    pub id: H256,
    pub address: H160,
    pub swap_fee: Bfp,
    pub paused: bool,
    /// The pool's registered tokens, in registration order.
    pub tokens: Vec<TokenState>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TokenState {
    pub token: H160,
    pub balance: U256,
    /// Decimal places to add to bring the token to 18 decimals.
    pub scaling_exponent: u8,
}

/// The supported pool kinds with their kind specific state.
///
/// This is deliberately a closed set: adding a kind means touching the match
/// arms below and nothing else, and the compiler points at every one of
/// them.
#[derive(Clone, Debug)]
pub enum PoolKind {
    Weighted(WeightedState),
    /// Weighted math with shifting weights; only relevant for routing in
    /// that its counter asset can anchor a boosted path.
    LiquidityBootstrapping(WeightedState),
    Stable(StableState),
    /// A stable pool whose own pool token is itself tradable, making it a
    /// hub for boosted routes.
    PhantomStable(PhantomStableState),
    /// A main/wrapped/pool-token pool with fee banded pricing.
    Linear(LinearState),
}

#[derive(Clone, Debug)]
pub struct WeightedState {
    /// Normalized token weights, index aligned with the token list.
    pub weights: Vec<Bfp>,
}

#[derive(Clone, Debug)]
pub struct StableState {
    pub amplification_parameter: AmplificationParameter,
}

#[derive(Clone, Debug)]
pub struct PhantomStableState {
    pub amplification_parameter: AmplificationParameter,
    /// Position of the pool's own token in the token list.
    pub bpt_index: usize,
}

#[derive(Clone, Debug)]
pub struct LinearState {
    pub main_index: usize,
    pub wrapped_index: usize,
    pub bpt_index: usize,
    /// Exchange rate between the wrapped and the main asset.
    pub rate: Bfp,
    pub lower_target: Bfp,
    pub upper_target: Bfp,
}

/// An amplification parameter as reported by a stable pool: a raw factor
/// together with the precision it is scaled by.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AmplificationParameter {
    factor: U256,
    precision: U256,
}

impl AmplificationParameter {
    pub fn try_new(factor: U256, precision: U256) -> Result<Self> {
        ensure!(!precision.is_zero(), "zero amplification parameter precision");
        ensure!(
            factor
                .checked_mul(U256::from(stable::AMP_PRECISION))
                .is_some(),
            "amplification factor out of range",
        );
        Ok(Self { factor, precision })
    }

    /// The format the stable invariant math operates on, scaled by
    /// [`stable::AMP_PRECISION`].
    pub fn scaled(&self) -> U256 {
        // `try_new` bounds the factor so the product fits.
        self.factor * U256::from(stable::AMP_PRECISION) / self.precision
    }

    /// The plain amplification factor as an exact rational.
    pub fn as_big_rational(&self) -> BigRational {
        // `try_new` rejects a zero precision and the field is private.
        debug_assert!(!self.precision.is_zero());
        BigRational::new(self.factor.to_big_int(), self.precision.to_big_int())
    }
}

/// A short lived, normalized view of one ordered token pair of a pool:
/// indices into the token list, upscaled balances, and the data needed to
/// move between token units and the 18 decimal math domain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PairData {
    pub index_in: usize,
    pub index_out: usize,
    pub balance_in: Bfp,
    pub balance_out: Bfp,
    pub scaling_exponent_in: u8,
    pub scaling_exponent_out: u8,
    pub swap_fee: Bfp,
}

/// The pool does not trade the requested token pair.
#[derive(thiserror::Error, Clone, Copy, Debug, Eq, PartialEq)]
#[error("pool does not trade the requested pair")]
pub struct InvalidPair;

impl Pool {
    pub fn id(&self) -> H256 {
        self.common.id
    }

    fn token_index(&self, token: H160) -> Option<usize> {
        self.common
            .tokens
            .iter()
            .position(|state| state.token == token)
    }

    fn validate(&self) -> Result<()> {
        let tokens = &self.common.tokens;
        ensure!(tokens.len() >= 2, "a pool needs at least two tokens");
        ensure!(
            tokens.iter().map(|state| state.token).all_unique(),
            "duplicate token",
        );
        for state in tokens {
            ensure!(
                state.scaling_exponent <= MAX_SCALING_EXPONENT,
                "scaling exponent {} out of range",
                state.scaling_exponent,
            );
        }
        match &self.kind {
            PoolKind::Weighted(state) | PoolKind::LiquidityBootstrapping(state) => {
                ensure!(
                    state.weights.len() == tokens.len(),
                    "weight and token counts differ",
                );
            }
            PoolKind::Stable(_) => {}
            PoolKind::PhantomStable(state) => {
                ensure!(
                    tokens
                        .get(state.bpt_index)
                        .is_some_and(|token| token.token == self.common.address),
                    "pool token index does not point at the pool's own token",
                );
            }
            PoolKind::Linear(state) => {
                ensure!(
                    tokens.len() == 3,
                    "a linear pool holds exactly its main, wrapped and own token",
                );
                ensure!(
                    [state.main_index, state.wrapped_index, state.bpt_index]
                        .iter()
                        .all_unique(),
                    "linear pool token indices overlap",
                );
                ensure!(
                    state.main_index < 3 && state.wrapped_index < 3 && state.bpt_index < 3,
                    "linear pool token index out of range",
                );
                ensure!(
                    tokens[state.bpt_index].token == self.common.address,
                    "pool token index does not point at the pool's own token",
                );
            }
        }
        Ok(())
    }

    /// Resolves an ordered token pair into the normalized view the pricing
    /// operations work on.
    pub fn pair_data(&self, token_in: H160, token_out: H160) -> Result<PairData, InvalidPair> {
        if token_in == token_out {
            return Err(InvalidPair);
        }
        let index_in = self.token_index(token_in).ok_or(InvalidPair)?;
        let index_out = self.token_index(token_out).ok_or(InvalidPair)?;
        let state_in = &self.common.tokens[index_in];
        let state_out = &self.common.tokens[index_out];
        Ok(PairData {
            index_in,
            index_out,
            balance_in: upscale(state_in.balance, state_in.scaling_exponent)
                .map_err(|_| InvalidPair)?,
            balance_out: upscale(state_out.balance, state_out.scaling_exponent)
                .map_err(|_| InvalidPair)?,
            scaling_exponent_in: state_in.scaling_exponent,
            scaling_exponent_out: state_out.scaling_exponent,
            swap_fee: self.common.swap_fee,
        })
    }

    /// The amount of the out token bought by an exact `amount_in`, in token
    /// units. Rounds down; `amount_out(0) == 0`.
    pub fn amount_out(&self, pair: &PairData, amount_in: U256) -> Result<U256, Error> {
        if amount_in.is_zero() {
            return Ok(U256::zero());
        }
        // Linear pools price the fee inside their band math; everything else
        // takes it off the input up front.
        let amount_in = match &self.kind {
            PoolKind::Linear(_) => amount_in,
            _ => subtract_swap_fee(Bfp::from_wei(amount_in), pair.swap_fee)?.as_uint256(),
        };
        let amount_in = upscale(amount_in, pair.scaling_exponent_in)?;
        let amount_out = self.upscaled_amount_out(pair, amount_in)?;
        Ok(downscale_down(amount_out, pair.scaling_exponent_out))
    }

    /// The amount of the in token an exact `amount_out` costs, in token
    /// units. Rounds up.
    pub fn amount_in(&self, pair: &PairData, amount_out: U256) -> Result<U256, Error> {
        if amount_out.is_zero() {
            return Ok(U256::zero());
        }
        let amount_out = upscale(amount_out, pair.scaling_exponent_out)?;
        let amount_in = self.upscaled_amount_in(pair, amount_out)?;
        let amount_in = downscale_up(amount_in, pair.scaling_exponent_in)?;
        match &self.kind {
            PoolKind::Linear(_) => Ok(amount_in),
            _ => Ok(add_swap_fee(Bfp::from_wei(amount_in), pair.swap_fee)?.as_uint256()),
        }
    }

    fn upscaled_amount_out(&self, pair: &PairData, amount_in: Bfp) -> Result<Bfp, Error> {
        match &self.kind {
            PoolKind::Weighted(state) | PoolKind::LiquidityBootstrapping(state) => {
                weighted::calc_out_given_in(
                    pair.balance_in,
                    state.weights[pair.index_in],
                    pair.balance_out,
                    state.weights[pair.index_out],
                    amount_in,
                )
            }
            PoolKind::Stable(state) => stable::calc_out_given_in(
                state.amplification_parameter.scaled(),
                &self.upscaled_balances()?,
                pair.index_in,
                pair.index_out,
                amount_in,
            ),
            PoolKind::PhantomStable(state) => {
                let amp = state.amplification_parameter.scaled();
                let bpt = state.bpt_index;
                let (balances, supply) = self.balances_without(bpt)?;
                if pair.index_in == bpt {
                    stable::calc_token_out_given_bpt_in(
                        amp,
                        &balances,
                        adjusted(pair.index_out, bpt),
                        amount_in,
                        supply,
                    )
                } else if pair.index_out == bpt {
                    stable::calc_bpt_out_given_token_in(
                        amp,
                        &balances,
                        adjusted(pair.index_in, bpt),
                        amount_in,
                        supply,
                    )
                } else {
                    stable::calc_out_given_in(
                        amp,
                        &balances,
                        adjusted(pair.index_in, bpt),
                        adjusted(pair.index_out, bpt),
                        amount_in,
                    )
                }
            }
            PoolKind::Linear(state) => {
                let view = self.linear_view(state)?;
                let (i, o) = (pair.index_in, pair.index_out);
                if i == state.main_index && o == state.wrapped_index {
                    linear::calc_wrapped_out_per_main_in(amount_in, view.main_balance, &view.params)
                } else if i == state.wrapped_index && o == state.main_index {
                    linear::calc_main_out_per_wrapped_in(amount_in, view.main_balance, &view.params)
                } else if i == state.main_index {
                    linear::calc_bpt_out_per_main_in(
                        amount_in,
                        view.main_balance,
                        view.wrapped_balance,
                        view.supply,
                        &view.params,
                    )
                } else if o == state.main_index {
                    linear::calc_main_out_per_bpt_in(
                        amount_in,
                        view.main_balance,
                        view.wrapped_balance,
                        view.supply,
                        &view.params,
                    )
                } else if i == state.wrapped_index {
                    linear::calc_bpt_out_per_wrapped_in(
                        amount_in,
                        view.main_balance,
                        view.wrapped_balance,
                        view.supply,
                        &view.params,
                    )
                } else {
                    linear::calc_wrapped_out_per_bpt_in(
                        amount_in,
                        view.main_balance,
                        view.wrapped_balance,
                        view.supply,
                        &view.params,
                    )
                }
            }
        }
    }

    fn upscaled_amount_in(&self, pair: &PairData, amount_out: Bfp) -> Result<Bfp, Error> {
        match &self.kind {
            PoolKind::Weighted(state) | PoolKind::LiquidityBootstrapping(state) => {
                weighted::calc_in_given_out(
                    pair.balance_in,
                    state.weights[pair.index_in],
                    pair.balance_out,
                    state.weights[pair.index_out],
                    amount_out,
                )
            }
            PoolKind::Stable(state) => stable::calc_in_given_out(
                state.amplification_parameter.scaled(),
                &self.upscaled_balances()?,
                pair.index_in,
                pair.index_out,
                amount_out,
            ),
            PoolKind::PhantomStable(state) => {
                let amp = state.amplification_parameter.scaled();
                let bpt = state.bpt_index;
                let (balances, supply) = self.balances_without(bpt)?;
                if pair.index_out == bpt {
                    stable::calc_token_in_given_bpt_out(
                        amp,
                        &balances,
                        adjusted(pair.index_in, bpt),
                        amount_out,
                        supply,
                    )
                } else if pair.index_in == bpt {
                    stable::calc_bpt_in_given_token_out(
                        amp,
                        &balances,
                        adjusted(pair.index_out, bpt),
                        amount_out,
                        supply,
                    )
                } else {
                    stable::calc_in_given_out(
                        amp,
                        &balances,
                        adjusted(pair.index_in, bpt),
                        adjusted(pair.index_out, bpt),
                        amount_out,
                    )
                }
            }
            PoolKind::Linear(state) => {
                let view = self.linear_view(state)?;
                let (i, o) = (pair.index_in, pair.index_out);
                if i == state.main_index && o == state.wrapped_index {
                    linear::calc_main_in_per_wrapped_out(
                        amount_out,
                        view.main_balance,
                        &view.params,
                    )
                } else if i == state.wrapped_index && o == state.main_index {
                    linear::calc_wrapped_in_per_main_out(
                        amount_out,
                        view.main_balance,
                        &view.params,
                    )
                } else if i == state.main_index {
                    linear::calc_main_in_per_bpt_out(
                        amount_out,
                        view.main_balance,
                        view.wrapped_balance,
                        view.supply,
                        &view.params,
                    )
                } else if o == state.main_index {
                    linear::calc_bpt_in_per_main_out(
                        amount_out,
                        view.main_balance,
                        view.wrapped_balance,
                        view.supply,
                        &view.params,
                    )
                } else if o == state.wrapped_index {
                    linear::calc_bpt_in_per_wrapped_out(
                        amount_out,
                        view.main_balance,
                        view.wrapped_balance,
                        view.supply,
                        &view.params,
                    )
                } else {
                    linear::calc_wrapped_in_per_bpt_out(
                        amount_out,
                        view.main_balance,
                        view.wrapped_balance,
                        view.supply,
                        &view.params,
                    )
                }
            }
        }
    }

    /// The largest amount (in units of the in token for [`SwapKind::GivenIn`],
    /// of the out token for [`SwapKind::GivenOut`]) this pair can absorb while
    /// keeping the pool's math inside its domain.
    pub fn limit_amount(&self, pair: &PairData, kind: SwapKind) -> U256 {
        match &self.kind {
            PoolKind::Weighted(_) | PoolKind::LiquidityBootstrapping(_) => {
                let balance = match kind {
                    SwapKind::GivenIn => self.common.tokens[pair.index_in].balance,
                    SwapKind::GivenOut => self.common.tokens[pair.index_out].balance,
                };
                // The weighted math refuses trades past 30% of the relevant
                // balance.
                balance / 10 * 3
            }
            _ => {
                // Cap how much of the out balance a single swap may drain,
                // then translate to the in token if necessary.
                let cap_out = self.common.tokens[pair.index_out].balance / 100 * 99;
                match kind {
                    SwapKind::GivenOut => cap_out,
                    SwapKind::GivenIn => self.amount_in(pair, cap_out).unwrap_or_default(),
                }
            }
        }
    }

    /// The instantaneous price of the pair after `executed` has already been
    /// traded: out per in for [`SwapKind::GivenIn`], in per out for
    /// [`SwapKind::GivenOut`]. `None` when the pool cannot price the amount.
    pub fn marginal_price(
        &self,
        pair: &PairData,
        executed: U256,
        kind: SwapKind,
    ) -> Option<BigRational> {
        let reference = match kind {
            SwapKind::GivenIn => self.common.tokens[pair.index_in].balance,
            SwapKind::GivenOut => self.common.tokens[pair.index_out].balance,
        };
        // A probe big enough that wei level rounding does not drown the
        // derivative, small enough to stay local.
        let probe = (executed >> 8)
            .max(reference / 10_000)
            .max(U256::one());
        let (before, after) = match kind {
            SwapKind::GivenIn => (
                self.amount_out(pair, executed).ok()?,
                self.amount_out(pair, executed.checked_add(probe)?).ok()?,
            ),
            SwapKind::GivenOut => (
                self.amount_in(pair, executed).ok()?,
                self.amount_in(pair, executed.checked_add(probe)?).ok()?,
            ),
        };
        let difference = after.checked_sub(before)?;
        Some(BigRational::new(
            difference.to_big_int(),
            probe.to_big_int(),
        ))
    }

    /// A unitless depth proxy used only to rank pools against each other
    /// when picking hop pools. Not a price.
    pub fn normalized_liquidity(&self, pair: &PairData) -> BigRational {
        let balance_out = pair.balance_out.as_uint256().to_big_int();
        match &self.kind {
            PoolKind::Weighted(state) | PoolKind::LiquidityBootstrapping(state) => {
                let weight_in = state.weights[pair.index_in].as_uint256().to_big_int();
                let weight_out = state.weights[pair.index_out].as_uint256().to_big_int();
                let total = &weight_in + &weight_out;
                if total.is_zero() {
                    return BigRational::zero();
                }
                BigRational::new(balance_out * weight_in, total)
            }
            PoolKind::Stable(state) => {
                BigRational::from_integer(balance_out)
                    * state.amplification_parameter.as_big_rational()
            }
            PoolKind::PhantomStable(state) => {
                BigRational::from_integer(balance_out)
                    * state.amplification_parameter.as_big_rational()
            }
            PoolKind::Linear(_) => BigRational::from_integer(balance_out),
        }
    }

    fn upscaled_balances(&self) -> Result<Vec<Bfp>, Error> {
        self.common
            .tokens
            .iter()
            .map(|state| upscale(state.balance, state.scaling_exponent))
            .collect()
    }

    /// Upscaled balances with the entry at `index` removed, returned
    /// together with that entry (the circulating supply of the pool's own
    /// token).
    fn balances_without(&self, index: usize) -> Result<(Vec<Bfp>, Bfp), Error> {
        let balances = self.upscaled_balances()?;
        let supply = balances[index];
        let balances = balances
            .into_iter()
            .enumerate()
            .filter_map(|(i, balance)| (i != index).then_some(balance))
            .collect();
        Ok((balances, supply))
    }

    fn linear_view(&self, state: &LinearState) -> Result<LinearView, Error> {
        let balance = |index: usize| {
            let token = &self.common.tokens[index];
            upscale(token.balance, token.scaling_exponent)
        };
        Ok(LinearView {
            main_balance: balance(state.main_index)?,
            wrapped_balance: balance(state.wrapped_index)?,
            supply: balance(state.bpt_index)?,
            params: linear::Params {
                fee: self.common.swap_fee,
                rate: state.rate,
                lower_target: state.lower_target,
                upper_target: state.upper_target,
            },
        })
    }
}

struct LinearView {
    main_balance: Bfp,
    wrapped_balance: Bfp,
    supply: Bfp,
    params: linear::Params,
}

/// Maps an index into the full token list to the corresponding index in a
/// list with the entry at `removed` taken out.
fn adjusted(index: usize, removed: usize) -> usize {
    index - usize::from(index > removed)
}

fn upscale(amount: U256, exponent: u8) -> Result<Bfp, Error> {
    amount
        .checked_mul(U256::exp10(exponent as usize))
        .map(Bfp::from_wei)
        .ok_or(Error::MulOverflow)
}

fn downscale_down(amount: Bfp, exponent: u8) -> U256 {
    amount.as_uint256() / U256::exp10(exponent as usize)
}

fn downscale_up(amount: Bfp, exponent: u8) -> Result<U256, Error> {
    let factor = U256::exp10(exponent as usize);
    let padded = amount
        .as_uint256()
        .checked_add(factor - 1)
        .ok_or(Error::AddOverflow)?;
    Ok(padded / factor)
}

fn add_swap_fee(amount: Bfp, fee: Bfp) -> Result<Bfp, Error> {
    amount.div_up(fee.complement())
}

fn subtract_swap_fee(amount: Bfp, fee: Bfp) -> Result<Bfp, Error> {
    let fee_amount = amount.mul_up(fee)?;
    amount.sub(fee_amount)
}

/// Step to add to an in amount whose verification buy-back `bought` fell
/// short of `wanted`: the deficit scaled by the realized price, or a plain
/// doubling while the estimate buys nothing at all.
pub(crate) fn in_amount_correction(amount_in: Bfp, bought: Bfp, wanted: Bfp) -> Result<Bfp, Error> {
    let minimum = Bfp::from_wei(U256::one());
    if bought.is_zero() {
        return Ok(amount_in.max(minimum));
    }
    let deficit = wanted.sub(bought)?;
    let price = amount_in.div_up(bought)?;
    Ok(deficit.mul_up(price)?.max(minimum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bfp;

    fn token(seed: u64) -> H160 {
        H160::from_low_u64_be(seed)
    }

    fn common(tokens: Vec<TokenState>, swap_fee: Bfp) -> CommonPoolState {
        CommonPoolState {
            id: H256::from_low_u64_be(1),
            address: token(0xf00d),
            swap_fee,
            paused: false,
            tokens,
        }
    }

    fn weighted_pool(
        tokens: Vec<(H160, U256, u8)>,
        weights: Vec<Bfp>,
        swap_fee: Bfp,
    ) -> Pool {
        let tokens = tokens
            .into_iter()
            .map(|(token, balance, scaling_exponent)| TokenState {
                token,
                balance,
                scaling_exponent,
            })
            .collect();
        Pool {
            common: common(tokens, swap_fee),
            kind: PoolKind::Weighted(WeightedState { weights }),
        }
    }

    fn amp(factor: u64) -> AmplificationParameter {
        AmplificationParameter::try_new(factor.into(), 1.into()).unwrap()
    }

    #[test]
    fn weighted_amount_out_matches_settlement() {
        // Reserves, fee and amounts taken from an on-chain 90/10 pool trade.
        let sell = token(0x21);
        let buy = token(0x42);
        let pool = weighted_pool(
            vec![
                (buy, 1_850_304_144_768_426_873_445_489_u128.into(), 0),
                (sell, 95_671_347_892_391_047_965_654_u128.into(), 0),
            ],
            vec![bfp!("0.9"), bfp!("0.1")],
            bfp!("0.002"),
        );
        let pair = pool.pair_data(sell, buy).unwrap();
        assert_eq!(
            pool.amount_out(&pair, 227_937_106_828_652_254_870_u128.into())
                .unwrap(),
            U256::from(488_192_591_864_344_551_330_u128),
        );
    }

    #[test]
    fn weighted_amount_in_matches_settlement() {
        // An on-chain 50/50 pool trade between an 18 and a 6 decimal token.
        let pay = token(0x21);
        let receive = token(0x42);
        let pool = weighted_pool(
            vec![
                (pay, 60_000_000_000_000_000_u128.into(), 0),
                (receive, 250_000_000_u128.into(), 12),
            ],
            vec![bfp!("0.5"), bfp!("0.5")],
            bfp!("0.001"),
        );
        let pair = pool.pair_data(pay, receive).unwrap();
        let quoted = pool.amount_in(&pair, 5_000_000_u128.into()).unwrap();
        // Never quote less than settlement charged; the inverse check may
        // pad a handful of wei on top.
        let settled = U256::from(1_225_715_511_430_411_u128);
        assert!(quoted >= settled, "{quoted} < {settled}");
        assert!(quoted <= settled + U256::from(10_000_u64), "{quoted}");
    }

    #[test]
    fn rejects_unknown_and_degenerate_pairs() {
        let pool = weighted_pool(
            vec![
                (token(1), U256::exp10(20), 0),
                (token(2), U256::exp10(20), 0),
            ],
            vec![bfp!("0.5"), bfp!("0.5")],
            Bfp::zero(),
        );
        assert!(pool.pair_data(token(1), token(2)).is_ok());
        assert_eq!(pool.pair_data(token(1), token(3)), Err(InvalidPair));
        assert_eq!(pool.pair_data(token(1), token(1)), Err(InvalidPair));
    }

    #[test]
    fn zero_amounts_price_to_zero() {
        let pool = weighted_pool(
            vec![
                (token(1), U256::exp10(20), 0),
                (token(2), U256::exp10(20), 0),
            ],
            vec![bfp!("0.5"), bfp!("0.5")],
            bfp!("0.003"),
        );
        let pair = pool.pair_data(token(1), token(2)).unwrap();
        assert_eq!(pool.amount_out(&pair, U256::zero()).unwrap(), U256::zero());
        assert_eq!(pool.amount_in(&pair, U256::zero()).unwrap(), U256::zero());
    }

    #[test]
    fn fee_makes_round_trips_strictly_lossy() {
        let pool = weighted_pool(
            vec![
                (token(1), U256::exp10(22), 0),
                (token(2), U256::exp10(22), 0),
            ],
            vec![bfp!("0.5"), bfp!("0.5")],
            bfp!("0.003"),
        );
        let pair = pool.pair_data(token(1), token(2)).unwrap();
        let amount = U256::exp10(20);
        let out = pool.amount_out(&pair, amount).unwrap();
        let back = pool.amount_in(&pair, out).unwrap();
        assert!(back >= amount, "{back} < {amount}");
    }

    #[test]
    fn amount_out_is_monotone_in_the_input() {
        let weighted = weighted_pool(
            vec![
                (token(1), U256::exp10(22), 0),
                (token(2), U256::exp10(22), 0),
            ],
            vec![bfp!("0.6"), bfp!("0.4")],
            bfp!("0.003"),
        );
        let stable = stable_pool(
            vec![
                (token(1), U256::exp10(22), 0),
                (token(2), U256::exp10(22), 0),
            ],
            200,
        );
        for pool in [weighted, stable] {
            let pair = pool.pair_data(token(1), token(2)).unwrap();
            let mut previous = U256::zero();
            for step in 1..=50_u64 {
                let amount_in = U256::exp10(19) * step;
                let out = pool.amount_out(&pair, amount_in).unwrap();
                assert!(out >= previous, "output shrank at {amount_in}");
                previous = out;
            }
        }
    }

    #[test]
    fn weighted_limit_is_a_share_of_the_balance() {
        let pool = weighted_pool(
            vec![
                (token(1), U256::from(1_000_u64), 0),
                (token(2), U256::from(500_u64), 0),
            ],
            vec![bfp!("0.5"), bfp!("0.5")],
            Bfp::zero(),
        );
        let pair = pool.pair_data(token(1), token(2)).unwrap();
        assert_eq!(
            pool.limit_amount(&pair, SwapKind::GivenIn),
            U256::from(300_u64),
        );
        assert_eq!(
            pool.limit_amount(&pair, SwapKind::GivenOut),
            U256::from(150_u64),
        );
    }

    #[test]
    fn marginal_price_decreases_with_executed_amount() {
        let pool = weighted_pool(
            vec![
                (token(1), U256::exp10(22), 0),
                (token(2), U256::exp10(22), 0),
            ],
            vec![bfp!("0.5"), bfp!("0.5")],
            Bfp::zero(),
        );
        let pair = pool.pair_data(token(1), token(2)).unwrap();
        let fresh = pool
            .marginal_price(&pair, U256::zero(), SwapKind::GivenIn)
            .unwrap();
        let after = pool
            .marginal_price(&pair, U256::exp10(21), SwapKind::GivenIn)
            .unwrap();
        assert!(after < fresh);
        // The inverse direction gets more expensive instead.
        let fresh = pool
            .marginal_price(&pair, U256::zero(), SwapKind::GivenOut)
            .unwrap();
        let after = pool
            .marginal_price(&pair, U256::exp10(21), SwapKind::GivenOut)
            .unwrap();
        assert!(after > fresh);
    }

    fn stable_pool(tokens: Vec<(H160, U256, u8)>, amplification: u64) -> Pool {
        let tokens = tokens
            .into_iter()
            .map(|(token, balance, scaling_exponent)| TokenState {
                token,
                balance,
                scaling_exponent,
            })
            .collect();
        Pool {
            common: common(tokens, bfp!("0.0004")),
            kind: PoolKind::Stable(StableState {
                amplification_parameter: amp(amplification),
            }),
        }
    }

    #[test]
    fn stable_pools_trade_close_to_parity() {
        let pool = stable_pool(
            vec![
                (token(1), U256::exp10(24), 0),
                (token(2), U256::exp10(12), 12),
            ],
            1000,
        );
        let pair = pool.pair_data(token(1), token(2)).unwrap();
        let out = pool.amount_out(&pair, U256::exp10(21)).unwrap();
        // 1000 units of an 18 decimal token buy roughly 1000 units of a 6
        // decimal token, less the fee.
        assert!(out >= U256::from(998_000_000_u64) && out <= U256::from(1_000_000_000_u64));
    }

    #[test]
    fn stable_limits_cap_the_out_balance() {
        let pool = stable_pool(
            vec![
                (token(1), U256::from(1_000_u64), 0),
                (token(2), U256::from(1_000_u64), 0),
            ],
            100,
        );
        let pair = pool.pair_data(token(1), token(2)).unwrap();
        assert_eq!(
            pool.limit_amount(&pair, SwapKind::GivenOut),
            U256::from(990_u64),
        );
    }

    fn phantom_pool(address: H160, tokens: Vec<(H160, U256)>, bpt_index: usize) -> Pool {
        let tokens = tokens
            .into_iter()
            .map(|(token, balance)| TokenState {
                token,
                balance,
                scaling_exponent: 0,
            })
            .collect();
        Pool {
            common: CommonPoolState {
                id: H256::from_low_u64_be(7),
                address,
                swap_fee: Bfp::zero(),
                paused: false,
                tokens,
            },
            kind: PoolKind::PhantomStable(PhantomStableState {
                amplification_parameter: amp(500),
                bpt_index,
            }),
        }
    }

    #[test]
    fn phantom_pool_trades_its_own_token() {
        let bpt = token(0xbb);
        let pool = phantom_pool(
            bpt,
            vec![
                (token(1), U256::exp10(24)),
                (bpt, U256::exp10(24) * 2),
                (token(2), U256::exp10(24)),
            ],
            1,
        );
        let pair = pool.pair_data(token(1), bpt).unwrap();
        let minted = pool.amount_out(&pair, U256::exp10(21)).unwrap();
        assert!(!minted.is_zero());

        // Underlying tokens still trade against each other near parity.
        let pair = pool.pair_data(token(1), token(2)).unwrap();
        let out = pool.amount_out(&pair, U256::exp10(21)).unwrap();
        assert!(out >= U256::exp10(21) / 1000 * 995 && out <= U256::exp10(21));
    }

    fn linear_pool(address: H160, main: H160, wrapped: H160, balances: [U256; 3]) -> Pool {
        Pool {
            common: CommonPoolState {
                id: H256::from_low_u64_be(9),
                address,
                swap_fee: bfp!("0.0001"),
                paused: false,
                tokens: vec![
                    TokenState {
                        token: main,
                        balance: balances[0],
                        scaling_exponent: 0,
                    },
                    TokenState {
                        token: wrapped,
                        balance: balances[1],
                        scaling_exponent: 0,
                    },
                    TokenState {
                        token: address,
                        balance: balances[2],
                        scaling_exponent: 0,
                    },
                ],
            },
            kind: PoolKind::Linear(LinearState {
                main_index: 0,
                wrapped_index: 1,
                bpt_index: 2,
                rate: bfp!("1"),
                lower_target: bfp!("1000"),
                upper_target: bfp!("10000"),
            }),
        }
    }

    #[test]
    fn linear_pool_wraps_without_fee_inside_the_band() {
        let pool = linear_pool(
            token(0xaa),
            token(1),
            token(2),
            [
                bfp!("5000").as_uint256(),
                bfp!("5000").as_uint256(),
                bfp!("10000").as_uint256(),
            ],
        );
        let pair = pool.pair_data(token(1), token(2)).unwrap();
        let amount = bfp!("100").as_uint256();
        // Rate 1 and a main balance inside the target band: wrapping is 1:1.
        assert_eq!(pool.amount_out(&pair, amount).unwrap(), amount);
    }

    #[test]
    fn snapshot_rejects_inconsistent_pools() {
        let ok = weighted_pool(
            vec![
                (token(1), U256::exp10(20), 0),
                (token(2), U256::exp10(20), 0),
            ],
            vec![bfp!("0.5"), bfp!("0.5")],
            Bfp::zero(),
        );
        assert!(Snapshot::try_new(vec![ok.clone()]).is_ok());

        // Duplicate ids.
        assert!(Snapshot::try_new(vec![ok.clone(), ok.clone()]).is_err());

        // Weight count mismatch.
        let mut broken = ok.clone();
        broken.kind = PoolKind::Weighted(WeightedState {
            weights: vec![bfp!("1")],
        });
        assert!(Snapshot::try_new(vec![broken]).is_err());

        // Single token.
        let mut broken = ok.clone();
        broken.common.tokens.truncate(1);
        assert!(Snapshot::try_new(vec![broken]).is_err());

        // Scaling exponent out of range.
        let mut broken = ok.clone();
        broken.common.tokens[0].scaling_exponent = 19;
        assert!(Snapshot::try_new(vec![broken]).is_err());

        // Phantom pool that does not hold its own token.
        let broken = phantom_pool(
            token(0xff),
            vec![
                (token(1), U256::exp10(24)),
                (token(2), U256::exp10(24)),
                (token(3), U256::exp10(24)),
            ],
            1,
        );
        assert!(Snapshot::try_new(vec![broken]).is_err());
    }

    #[test]
    fn amplification_parameter_requires_a_precision() {
        assert!(AmplificationParameter::try_new(2.into(), 0.into()).is_err());
        let amp = AmplificationParameter::try_new(5000.into(), 1000.into()).unwrap();
        assert_eq!(amp.scaled(), U256::from(5000));
        assert_eq!(amp.as_big_rational(), BigRational::new(5.into(), 1.into()));
    }

    #[test]
    fn amplification_factor_that_cannot_be_scaled_is_rejected() {
        assert!(AmplificationParameter::try_new(U256::MAX, 1.into()).is_err());
        let limit = U256::MAX / U256::from(stable::AMP_PRECISION);
        assert!(AmplificationParameter::try_new(limit, 1.into()).is_ok());
        assert!(AmplificationParameter::try_new(limit + U256::one(), 1.into()).is_err());
    }
}
