//! Per path liquidity limits and the seed allocation derived from them.
//!
//! A path can only carry as much flow as its tightest hop allows. Every
//! hop's own domain limit is translated into the unit the optimizer
//! allocates in (the first hop's in token for exact in trades, the last
//! hop's out token for exact out trades) and the minimum wins. A path whose
//! limit cannot be computed gets a limit of zero, which excludes it without
//! failing the request.

use crate::{path::Path, pool::Snapshot, router::SwapKind};
use primitive_types::U256;

/// The largest amount the path can absorb, in the unit of the trade's fixed
/// side. Zero when any hop cannot be priced.
pub fn path_limit(snapshot: &Snapshot, path: &Path, kind: SwapKind) -> U256 {
    let hops = path.hops();
    let mut limit = U256::MAX;
    for (position, hop) in hops.iter().enumerate() {
        let Some((pool, pair)) = snapshot
            .get(&hop.pool)
            .and_then(|pool| Some((pool, pool.pair_data(hop.token_in, hop.token_out).ok()?)))
        else {
            return U256::zero();
        };
        let mut amount = pool.limit_amount(&pair, kind);
        let converted = match kind {
            // Walk the hop's in-token limit back to the path's input.
            SwapKind::GivenIn => hops[..position].iter().rev().try_fold(amount, |amount, hop| {
                let pool = snapshot.get(&hop.pool)?;
                let pair = pool.pair_data(hop.token_in, hop.token_out).ok()?;
                pool.amount_in(&pair, amount).ok()
            }),
            // Walk the hop's out-token limit forward to the path's output.
            SwapKind::GivenOut => hops[position + 1..].iter().try_fold(amount, |amount, hop| {
                let pool = snapshot.get(&hop.pool)?;
                let pair = pool.pair_data(hop.token_in, hop.token_out).ok()?;
                pool.amount_out(&pair, amount).ok()
            }),
        };
        match converted {
            Some(converted) => amount = converted,
            None => return U256::zero(),
        }
        limit = limit.min(amount);
    }
    limit
}

/// Paths with their limits, ordered from the most to the least capacious.
pub fn sorted_limits(
    snapshot: &Snapshot,
    paths: Vec<Path>,
    kind: SwapKind,
) -> Vec<(Path, U256)> {
    let mut limited = paths
        .into_iter()
        .map(|path| {
            let limit = path_limit(snapshot, &path, kind);
            (path, limit)
        })
        .collect::<Vec<_>>();
    limited.sort_by(|(_, a), (_, b)| b.cmp(a));
    limited
}

/// Seeds the optimizer: the smallest prefix of paths whose limits cover the
/// total, each filled to its own limit, the last one trimmed so the sum is
/// exactly the total. `None` when even all paths together cannot carry the
/// amount.
pub fn seed_allocation(sorted: &[(Path, U256)], total: U256) -> Option<Vec<U256>> {
    let mut allocation = vec![U256::zero(); sorted.len()];
    let mut remaining = total;
    for (slot, (_, limit)) in allocation.iter_mut().zip(sorted) {
        if remaining.is_zero() {
            break;
        }
        let fill = remaining.min(*limit);
        *slot = fill;
        remaining -= fill;
    }
    if remaining.is_zero() {
        Some(allocation)
    } else {
        None
    }
}
