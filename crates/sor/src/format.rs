//! Reshapes a final allocation into the settlement facing swap layout.
//!
//! This is pure bookkeeping: no pricing decisions are made here. Paths with
//! nothing allocated simply do not appear.

use crate::{
    conversions::U256Ext as _,
    optimizer::{path_marginal, path_output},
    path::Path,
    pool::Snapshot,
    router::SwapKind,
};
use num::{BigRational, Zero as _};
use primitive_types::{H160, H256, U256};

/// One swap through one pool, with token positions referring to the
/// result's token table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SwapStep {
    pub pool: H256,
    pub asset_in_index: usize,
    pub asset_out_index: usize,
    /// The amount for the step, or zero for a step chained to the previous
    /// one, which trades whatever that step produced.
    pub amount: U256,
}

/// The routed trade in settlement layout.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SwapResult {
    /// Every token touched by the trade, in first appearance order.
    pub tokens: Vec<H160>,
    pub swaps: Vec<SwapStep>,
    /// Bought amount for exact in trades, sold amount for exact out trades.
    pub total_return: U256,
    /// The return adjusted for per path execution costs: reduced (saturating
    /// at zero) when the return is bought, increased when it is sold.
    pub return_net_of_costs: U256,
    /// The overall marginal price at the final allocation, allocation
    /// weighted across the used paths.
    pub marginal_price: Option<BigRational>,
}

impl SwapResult {
    /// The canonical empty result: nothing to trade, nothing traded.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Formats the allocation over the given paths. `allocation` is index
/// aligned with `paths`; zero entries are omitted from the output.
pub fn format_swaps(
    snapshot: &Snapshot,
    paths: &[(Path, U256)],
    allocation: &[U256],
    kind: SwapKind,
    cost_per_path: U256,
) -> SwapResult {
    let mut tokens: Vec<H160> = Vec::new();
    let token_index = |token: H160, tokens: &mut Vec<H160>| match tokens
        .iter()
        .position(|&known| known == token)
    {
        Some(index) => index,
        None => {
            tokens.push(token);
            tokens.len() - 1
        }
    };

    let mut swaps = Vec::new();
    let mut total_return = U256::zero();
    let mut active = 0_u64;
    let mut weighted_price = BigRational::zero();
    let mut priced_amount = BigRational::zero();

    for ((path, _), &amount) in paths.iter().zip(allocation) {
        if amount.is_zero() {
            continue;
        }
        let Some(value) = path_output(snapshot, path, amount, kind) else {
            continue;
        };
        total_return = total_return.saturating_add(value);
        active += 1;

        // Exact out paths are executed back to front: the last hop trades
        // the exact amount and each earlier hop is chained onto it.
        let hops: Vec<_> = match kind {
            SwapKind::GivenIn => path.hops().iter().collect(),
            SwapKind::GivenOut => path.hops().iter().rev().collect(),
        };
        for (position, hop) in hops.iter().enumerate() {
            let asset_in_index = token_index(hop.token_in, &mut tokens);
            let asset_out_index = token_index(hop.token_out, &mut tokens);
            swaps.push(SwapStep {
                pool: hop.pool,
                asset_in_index,
                asset_out_index,
                amount: if position == 0 { amount } else { U256::zero() },
            });
        }

        if let Some(price) = path_marginal(snapshot, path, amount, kind) {
            let weight = BigRational::from_integer(amount.to_big_int());
            weighted_price += price * &weight;
            priced_amount += weight;
        }
    }

    let costs = cost_per_path.saturating_mul(active.into());
    let return_net_of_costs = match kind {
        SwapKind::GivenIn => total_return.saturating_sub(costs),
        SwapKind::GivenOut => total_return.saturating_add(costs),
    };
    let marginal_price = if priced_amount.is_zero() {
        None
    } else {
        Some(weighted_price / priced_amount)
    };

    SwapResult {
        tokens,
        swaps,
        total_return,
        return_net_of_costs,
        marginal_price,
    }
}
