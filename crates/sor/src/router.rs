//! The routing entry point tying the stages together.

use crate::{
    format::{self, SwapResult},
    graph::{self, RouterConfig},
    limits, optimizer,
    pool::Snapshot,
};
use primitive_types::{H160, U256};

/// Which side of a trade is fixed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SwapKind {
    /// The sold amount is fixed; the router maximizes what it buys.
    GivenIn,
    /// The bought amount is fixed; the router minimizes what it costs.
    GivenOut,
}

/// One routing request.
#[derive(Clone, Debug)]
pub struct SwapRequest {
    pub token_in: H160,
    pub token_out: H160,
    pub kind: SwapKind,
    /// The fixed amount, in units of the fixed side's token.
    pub amount: U256,
    /// Upper bound on the number of pools used across all paths.
    pub max_pools: usize,
    /// Fixed execution cost charged per used path, denominated in the
    /// return token.
    pub cost_per_path: U256,
}

/// Finds the best route for the request over the snapshot.
///
/// Synchronous and free of interior mutability: any number of requests can
/// run against the same snapshot concurrently. A request that cannot be
/// served (no paths, or more than the available liquidity) comes back as
/// the canonical empty result, never an error.
pub fn best_swap(snapshot: &Snapshot, config: &RouterConfig, request: &SwapRequest) -> SwapResult {
    if request.amount.is_zero() || request.token_in == request.token_out {
        return SwapResult::empty();
    }

    let candidates = graph::candidate_paths(
        snapshot,
        config,
        request.token_in,
        request.token_out,
        request.max_pools,
    );
    if candidates.is_empty() {
        return SwapResult::empty();
    }

    let sorted = limits::sorted_limits(snapshot, candidates, request.kind);
    let allocation = optimizer::optimize_allocation(
        snapshot,
        &sorted,
        request.amount,
        request.kind,
        request.cost_per_path,
        request.max_pools,
        &config.optimizer,
    );
    if allocation.is_empty() {
        tracing::debug!(
            amount = %request.amount,
            "not enough liquidity for the requested amount",
        );
        return SwapResult::empty();
    }

    format::format_swaps(
        snapshot,
        &sorted,
        &allocation,
        request.kind,
        request.cost_per_path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bfp,
        pool::{CommonPoolState, Pool, PoolKind, TokenState, WeightedState},
    };
    use primitive_types::H256;

    fn token(seed: u64) -> H160 {
        H160::from_low_u64_be(seed)
    }

    fn pool(id: u64, reserves: Vec<(H160, u128)>) -> Pool {
        let count = reserves.len();
        let tokens = reserves
            .into_iter()
            .map(|(token, balance)| TokenState {
                token,
                balance: balance.into(),
                scaling_exponent: 0,
            })
            .collect();
        Pool {
            common: CommonPoolState {
                id: H256::from_low_u64_be(id),
                address: token(0x1000 + id),
                swap_fee: bfp!("0.003"),
                paused: false,
                tokens,
            },
            kind: PoolKind::Weighted(WeightedState {
                weights: vec![bfp!("0.5"); count],
            }),
        }
    }

    const ONE: u128 = 1_000_000_000_000_000_000;

    fn request(token_in: H160, token_out: H160, kind: SwapKind, amount: U256) -> SwapRequest {
        SwapRequest {
            token_in,
            token_out,
            kind,
            amount,
            max_pools: 4,
            cost_per_path: U256::zero(),
        }
    }

    #[test]
    fn routes_through_an_intermediate_token() {
        let (x, y, z) = (token(1), token(2), token(3));
        let snapshot = Snapshot::try_new(vec![
            pool(1, vec![(x, 1_000 * ONE), (y, 1_000 * ONE)]),
            pool(2, vec![(y, 1_000 * ONE), (z, 1_000 * ONE)]),
        ])
        .unwrap();
        let config = RouterConfig::default();
        let result = best_swap(
            &snapshot,
            &config,
            &request(x, z, SwapKind::GivenIn, U256::from(10 * ONE)),
        );

        assert_eq!(result.tokens, vec![x, y, z]);
        assert_eq!(result.swaps.len(), 2);
        assert_eq!(result.swaps[0].amount, U256::from(10 * ONE));
        assert_eq!(result.swaps[1].amount, U256::zero());
        // Two near balanced hops cost two swap fees plus slippage.
        assert!(result.total_return > U256::from(9 * ONE));
        assert!(result.total_return < U256::from(10 * ONE));
    }

    #[test]
    fn splits_between_equally_deep_direct_pools() {
        let (x, y) = (token(1), token(2));
        let snapshot = Snapshot::try_new(vec![
            pool(1, vec![(x, 1_000 * ONE), (y, 1_000 * ONE)]),
            pool(2, vec![(x, 1_000 * ONE), (y, 1_000 * ONE)]),
        ])
        .unwrap();
        let config = RouterConfig::default();
        let result = best_swap(
            &snapshot,
            &config,
            &request(x, y, SwapKind::GivenIn, U256::from(100 * ONE)),
        );

        assert_eq!(result.swaps.len(), 2);
        let allocated: U256 = result.swaps.iter().fold(U256::zero(), |s, swap| s + swap.amount);
        assert_eq!(allocated, U256::from(100 * ONE));
        // Both legs carry a meaningful share.
        for swap in &result.swaps {
            assert!(swap.amount > U256::from(30 * ONE));
        }
    }

    #[test]
    fn execution_costs_collapse_the_split() {
        let (x, y) = (token(1), token(2));
        let snapshot = Snapshot::try_new(vec![
            pool(1, vec![(x, 1_000 * ONE), (y, 1_000 * ONE)]),
            pool(2, vec![(x, 1_000 * ONE), (y, 1_000 * ONE)]),
        ])
        .unwrap();
        let config = RouterConfig::default();
        let mut request = request(x, y, SwapKind::GivenIn, U256::from(ONE));
        request.cost_per_path = U256::from(ONE / 10);
        let result = best_swap(&snapshot, &config, &request);

        assert_eq!(result.swaps.len(), 1);
        assert_eq!(result.swaps[0].amount, U256::from(ONE));
    }

    #[test]
    fn more_than_the_liquidity_is_the_empty_result() {
        let (x, y) = (token(1), token(2));
        let snapshot =
            Snapshot::try_new(vec![pool(1, vec![(x, 1_000 * ONE), (y, 1_000 * ONE)])]).unwrap();
        let config = RouterConfig::default();
        for kind in [SwapKind::GivenIn, SwapKind::GivenOut] {
            let result = best_swap(
                &snapshot,
                &config,
                &request(x, y, kind, U256::from(100_000 * ONE)),
            );
            assert_eq!(result, SwapResult::empty());
        }
    }

    #[test]
    fn degenerate_requests_short_circuit() {
        let (x, y) = (token(1), token(2));
        let snapshot =
            Snapshot::try_new(vec![pool(1, vec![(x, 1_000 * ONE), (y, 1_000 * ONE)])]).unwrap();
        let config = RouterConfig::default();
        assert_eq!(
            best_swap(&snapshot, &config, &request(x, y, SwapKind::GivenIn, U256::zero())),
            SwapResult::empty(),
        );
        assert_eq!(
            best_swap(
                &snapshot,
                &config,
                &request(x, x, SwapKind::GivenIn, U256::from(ONE)),
            ),
            SwapResult::empty(),
        );
    }

    #[test]
    fn exact_out_reports_the_amount_to_pay() {
        let (x, y) = (token(1), token(2));
        let snapshot =
            Snapshot::try_new(vec![pool(1, vec![(x, 1_000 * ONE), (y, 1_000 * ONE)])]).unwrap();
        let config = RouterConfig::default();
        let result = best_swap(
            &snapshot,
            &config,
            &request(x, y, SwapKind::GivenOut, U256::from(10 * ONE)),
        );

        assert_eq!(result.swaps.len(), 1);
        assert_eq!(result.swaps[0].amount, U256::from(10 * ONE));
        // Paying in more than comes out: fee plus slippage.
        assert!(result.total_return > U256::from(10 * ONE));
        assert!(result.total_return < U256::from(11 * ONE));
    }
}
